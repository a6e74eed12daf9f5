//! Pinecone index client.
//!
//! Queries a hosted Pinecone index over its data-plane REST API. The host is
//! a template such as `https://{index}-abc123.svc.us-east1-gcp.pinecone.io`;
//! `{index}` is replaced with the index name given to each search.

use async_trait::async_trait;
use ragline_core::error::IndexError;
use ragline_core::index::{ScoredPassage, VectorIndex};
use serde::Deserialize;
use tracing::{debug, warn};

pub struct PineconeIndex {
    host_template: String,
    api_key: String,
    client: reqwest::Client,
}

impl PineconeIndex {
    pub fn new(host_template: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            host_template: host_template.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    fn query_url(&self, index_name: &str) -> String {
        format!("{}/query", self.host_template.replace("{index}", index_name))
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        index_name: &str,
    ) -> Result<Vec<ScoredPassage>, IndexError> {
        let url = self.query_url(index_name);
        let body = serde_json::json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
        });

        debug!(index = index_name, top_k, "Querying Pinecone");

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IndexError::Timeout(e.to_string())
                } else {
                    IndexError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 404 {
            return Err(IndexError::UnknownIndex(index_name.to_string()));
        }
        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(index = index_name, status, body = %error_body, "Pinecone returned error");
            return Err(IndexError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let parsed: QueryResponse = response.json().await.map_err(|e| IndexError::ApiError {
            status_code: status,
            message: format!("Failed to parse query response: {e}"),
        })?;

        Ok(parsed
            .matches
            .into_iter()
            .map(|m| {
                let metadata = m.metadata.unwrap_or_default();
                ScoredPassage {
                    text: metadata.text.unwrap_or_default(),
                    source: metadata.source,
                    score: m.score,
                }
            })
            .collect())
    }
}

// --- Pinecone API types (internal) ---

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<MatchMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchMetadata {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    source: Option<String>,
}
