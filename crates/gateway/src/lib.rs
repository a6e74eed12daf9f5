//! HTTP API gateway for Ragline.
//!
//! Exposes the query pipeline over REST:
//!
//! - `GET /health`: liveness and version
//! - `POST /v1/chat`: `{query, history}` → `{answer, sources}`
//! - `POST /chat/?query=...`: single-turn form → `{response}`
//!
//! Every request is independent. The caller sends its own history with each
//! call and the gateway keeps no session state.
//!
//! Built on Axum for high performance async HTTP.

use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{Instrument, info, info_span, warn};

use ragline_config::{AppConfig, GatewayConfig};
use ragline_core::Error;
use ragline_core::message::ConversationTurn;
use ragline_pipeline::{PipelineSettings, QueryOrchestrator};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Arc<QueryOrchestrator>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - Request body size limit (`gateway.max_body_bytes`, 1 MB by default)
/// - CORS for the configured origins (any origin when none are listed)
/// - HTTP trace logging
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/chat", post(chat_handler))
        .route("/chat", post(legacy_chat_handler))
        .route("/chat/", post(legacy_chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(&config.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Build the providers, the index and the orchestrator described by `config`.
pub async fn build_orchestrator(
    config: &AppConfig,
) -> Result<QueryOrchestrator, Box<dyn std::error::Error>> {
    let providers = ragline_providers::build_from_config(config);
    let handle = providers
        .default()
        .ok_or("No default provider configured")?;
    let index = ragline_index::build_from_config(config).await?;

    let orchestrator = QueryOrchestrator::new(
        handle.embedding,
        handle.completion,
        index,
        PipelineSettings::from_config(config),
    )?;
    info!(
        provider = %providers.default_name(),
        index = %orchestrator.settings().index_name,
        "Pipeline ready"
    );
    Ok(orchestrator)
}

/// Start the gateway HTTP server.
///
/// The orchestrator is built once; all requests share it.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let orchestrator = build_orchestrator(&config).await?;

    let state = Arc::new(GatewayState {
        orchestrator: Arc::new(orchestrator),
    });
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Error mapping ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub stage: String,
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// 400 for caller mistakes, 500 for misconfiguration, 504 when a provider
/// missed its deadline, 502 for every other upstream failure.
fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        Error::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        e if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn api_error(error: Error) -> ApiError {
    let status = status_for(&error);
    if status == StatusCode::BAD_REQUEST {
        info!(error = %error, "Rejected query");
    } else {
        warn!(error = %error, status = status.as_u16(), "Query failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody {
                kind: error.kind().as_str().into(),
                stage: error.stage().as_str().into(),
                message: error.to_string(),
            },
        }),
    )
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<String>,
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("chat", %request_id);

    let answer = state
        .orchestrator
        .process_query(&payload.query, &payload.history)
        .instrument(span)
        .await
        .map_err(api_error)?;

    Ok(Json(ChatResponse {
        answer: answer.text,
        sources: answer.sources.into_iter().collect(),
    }))
}

#[derive(Debug, Deserialize)]
struct LegacyChatQuery {
    #[serde(default)]
    query: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LegacyChatResponse {
    response: String,
}

async fn legacy_chat_handler(
    State(state): State<SharedState>,
    Query(params): Query<LegacyChatQuery>,
) -> Result<Json<LegacyChatResponse>, ApiError> {
    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("legacy_chat", %request_id);

    let answer = state
        .orchestrator
        .process_query(&params.query, &[])
        .instrument(span)
        .await
        .map_err(api_error)?;

    Ok(Json(LegacyChatResponse {
        response: answer.text,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use ragline_core::error::ProviderError;
    use ragline_core::message::Role;
    use ragline_core::provider::{
        CompletionProvider, CompletionRequest, CompletionResponse, EmbeddingProvider,
    };
    use ragline_index::{InMemoryIndex, IndexedPassage};
    use std::time::Duration;
    use tower::ServiceExt;

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![1.0, 0.0])
        }
    }

    enum Behavior {
        Echo,
        Fail,
        Stall,
    }

    struct TestCompleter(Behavior);

    #[async_trait]
    impl CompletionProvider for TestCompleter {
        fn name(&self) -> &str {
            "test"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            match self.0 {
                Behavior::Echo => Ok(CompletionResponse {
                    text: request
                        .messages
                        .iter()
                        .rev()
                        .find(|m| m.role == Role::User)
                        .map(|m| m.content.clone())
                        .unwrap_or_default(),
                    usage: None,
                    model: request.model,
                }),
                Behavior::Fail => Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "model overloaded".into(),
                }),
                Behavior::Stall => {
                    tokio::time::sleep(Duration::from_secs(600)).await;
                    Err(ProviderError::Network("unreachable".into()))
                }
            }
        }
    }

    async fn test_app(behavior: Behavior, index_name: &str) -> Router {
        let index = InMemoryIndex::new();
        for (text, source) in [("Rust has no GC.", "faq.md"), ("Cargo builds crates.", "cargo.md")] {
            index
                .insert(
                    "docs",
                    IndexedPassage {
                        text: text.into(),
                        source: Some(source.into()),
                        embedding: vec![1.0, 0.0],
                    },
                )
                .await
                .unwrap();
        }

        let mut config = AppConfig::default();
        config.retrieval.index_name = Some(index_name.into());
        config.generation.refine_query = false;
        config.generation.request_timeout_secs = 5;

        let orchestrator = QueryOrchestrator::new(
            Arc::new(FixedEmbedder),
            Arc::new(TestCompleter(behavior)),
            Arc::new(index),
            PipelineSettings::from_config(&config),
        )
        .unwrap();

        build_router(
            Arc::new(GatewayState {
                orchestrator: Arc::new(orchestrator),
            }),
            &config.gateway,
        )
    }

    fn chat_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = test_app(Behavior::Echo, "docs").await;

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn chat_returns_answer_and_sources() {
        let app = test_app(Behavior::Echo, "docs").await;
        let req = chat_request(serde_json::json!({
            "query": "Does Rust have a GC?",
            "history": [{"role": "user", "content": "hello"}, {"role": "assistant", "content": "hi"}]
        }));

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: ChatResponse = body_json(response).await;
        assert!(json.answer.contains("Rust has no GC."));
        assert!(json.answer.contains("user: hello\nassistant: hi"));
        assert!(json.answer.contains("Question: Does Rust have a GC?"));
        assert_eq!(json.sources, vec!["cargo.md", "faq.md"]);
    }

    #[tokio::test]
    async fn chat_history_is_optional() {
        let app = test_app(Behavior::Echo, "docs").await;
        let response = app
            .oneshot(chat_request(serde_json::json!({"query": "What is Cargo?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_query_is_bad_request() {
        let app = test_app(Behavior::Echo, "docs").await;
        let response = app
            .oneshot(chat_request(serde_json::json!({"query": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json: ErrorResponse = body_json(response).await;
        assert_eq!(json.error.kind, "invalid_query");
        assert_eq!(json.error.stage, "received");
    }

    #[tokio::test]
    async fn completion_failure_is_bad_gateway() {
        let app = test_app(Behavior::Fail, "docs").await;
        let response = app
            .oneshot(chat_request(serde_json::json!({"query": "q"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let json: ErrorResponse = body_json(response).await;
        assert_eq!(json.error.kind, "completion_failure");
        assert_eq!(json.error.stage, "generating");
        assert!(json.error.message.contains("model overloaded"));
    }

    #[tokio::test]
    async fn unknown_index_is_bad_gateway() {
        let app = test_app(Behavior::Echo, "missing").await;
        let response = app
            .oneshot(chat_request(serde_json::json!({"query": "q"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let json: ErrorResponse = body_json(response).await;
        assert_eq!(json.error.kind, "index_failure");
        assert!(json.error.message.contains("missing"));
    }

    #[tokio::test(start_paused = true)]
    async fn provider_timeout_is_gateway_timeout() {
        let app = test_app(Behavior::Stall, "docs").await;
        let response = app
            .oneshot(chat_request(serde_json::json!({"query": "q"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn legacy_chat_returns_response() {
        let app = test_app(Behavior::Echo, "docs").await;
        let req = Request::builder()
            .method("POST")
            .uri("/chat/?query=What%20is%20Cargo%3F")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: LegacyChatResponse = body_json(response).await;
        assert!(json.response.contains("Question: What is Cargo?"));
    }

    #[tokio::test]
    async fn legacy_chat_without_query_is_bad_request() {
        let app = test_app(Behavior::Echo, "docs").await;
        let req = Request::builder()
            .method("POST")
            .uri("/chat/")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = test_app(Behavior::Echo, "docs").await;
        let big = "x".repeat(2 * 1024 * 1024);
        let response = app
            .oneshot(chat_request(serde_json::json!({"query": big})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn status_mapping() {
        use ragline_core::error::{IndexError, RetrievalError};

        assert_eq!(status_for(&Error::config("x")), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status_for(&Error::Generation(ProviderError::Timeout("30s".into()))),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&RetrievalError::from(IndexError::Network("down".into())).into()),
            StatusCode::BAD_GATEWAY
        );
    }
}
