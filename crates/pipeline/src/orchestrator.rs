//! Query orchestration: refinement, retrieval, assembly, generation.
//!
//! # Flow
//!
//! 1. **Received**: reject empty or blank queries
//! 2. **Refining** (optional): rewrite a follow-up into a standalone question
//! 3. **Retrieving**: embed the retrieval query and search the index
//! 4. **Assembling**: fit passages and history into their budgets
//! 5. **Generating**: answer the original query from the assembled prompt
//!
//! Every provider call gets its own deadline. Nothing is retried, and a
//! failure at any stage ends the query with a stage-tagged error.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ragline_config::{AppConfig, RefinementFailurePolicy};
use ragline_core::error::{Error, IndexError, ProviderError, Result, RetrievalError, Stage};
use ragline_core::index::{RetrievedPassage, VectorIndex};
use ragline_core::message::ConversationTurn;
use ragline_core::provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, EmbeddingProvider,
    GenerationParams, Usage,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::{AssembledPrompt, AssemblyMetadata, ContextAssembler, TokenBudget};
use crate::prompt;

/// The grounded answer to one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Generated text, trimmed.
    pub text: String,
    /// Distinct sources of every retrieved passage.
    pub sources: BTreeSet<String>,
}

/// Everything a single pipeline run produced.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub answer: Answer,
    /// The prompt sent for generation.
    pub prompt: AssembledPrompt,
    /// The query that was embedded (refined or original).
    pub retrieval_query: String,
    /// Token usage of the generation call, when the provider reports it.
    pub usage: Option<Usage>,
    pub metadata: AssemblyMetadata,
}

/// Immutable settings for a [`QueryOrchestrator`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub index_name: String,
    pub top_k: usize,
    pub completion_model: String,
    pub temperature: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub top_p: f32,
    pub budget: TokenBudget,
    pub system_prompt_refine: String,
    pub system_prompt_answer: String,
    pub refine_query: bool,
    pub refinement_failure: RefinementFailurePolicy,
    /// Deadline for each individual provider call.
    pub request_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            index_name: config.retrieval.index_name.clone().unwrap_or_default(),
            top_k: config.retrieval.top_k,
            completion_model: config.generation.completion_model_id.clone(),
            temperature: config.generation.temperature,
            frequency_penalty: config.generation.frequency_penalty,
            presence_penalty: config.generation.presence_penalty,
            top_p: config.generation.top_p,
            budget: TokenBudget::from(&config.budget),
            system_prompt_refine: config.prompts.system_prompt_refine.clone(),
            system_prompt_answer: config.prompts.system_prompt_answer.clone(),
            refine_query: config.generation.refine_query,
            refinement_failure: config.generation.refinement_failure,
            request_timeout: Duration::from_secs(config.generation.request_timeout_secs),
        }
    }

    /// Check everything that would otherwise fail mid-query.
    pub fn validate(&self) -> Result<()> {
        if self.index_name.trim().is_empty() {
            return Err(Error::config("index name is not set"));
        }
        if self.top_k == 0 {
            return Err(Error::config("top_k must be at least 1"));
        }
        if self.completion_model.trim().is_empty() {
            return Err(Error::config("completion model is not set"));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::config("request timeout must be greater than zero"));
        }
        self.budget.validate()
    }

    fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_tokens: self.budget.max_response_tokens,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            top_p: self.top_p,
        }
    }
}

/// Sequences one query through the pipeline.
///
/// Holds only immutable settings and shared provider handles, so one
/// orchestrator can serve any number of concurrent queries.
pub struct QueryOrchestrator {
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionProvider>,
    index: Arc<dyn VectorIndex>,
    settings: PipelineSettings,
    assembler: ContextAssembler,
}

impl QueryOrchestrator {
    /// Create an orchestrator. Invalid settings fail here, before any provider call.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
        index: Arc<dyn VectorIndex>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let assembler = ContextAssembler::from_budget(&settings.budget);
        Ok(Self {
            embedder,
            completer,
            index,
            settings,
            assembler,
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Answer `query` given the caller's history (oldest first).
    pub async fn process_query(&self, query: &str, history: &[ConversationTurn]) -> Result<Answer> {
        self.run(query, history).await.map(|outcome| outcome.answer)
    }

    /// Like [`process_query`](Self::process_query), returning the full outcome.
    pub async fn run(&self, query: &str, history: &[ConversationTurn]) -> Result<QueryOutcome> {
        info!(
            stage = %Stage::Received,
            query_chars = query.chars().count(),
            history_turns = history.len(),
            "Query received"
        );

        let result = self.run_stages(query, history).await;
        match &result {
            Ok(outcome) => info!(
                stage = %Stage::Done,
                sources = outcome.answer.sources.len(),
                answer_chars = outcome.answer.text.chars().count(),
                "Query answered"
            ),
            Err(e) => info!(
                stage = %Stage::Failed,
                failed_at = %e.stage(),
                kind = %e.kind(),
                "Query failed"
            ),
        }
        result
    }

    async fn run_stages(&self, query: &str, history: &[ConversationTurn]) -> Result<QueryOutcome> {
        if query.trim().is_empty() {
            return Err(Error::InvalidQuery("query must not be empty".into()));
        }

        let retrieval_query = if self.settings.refine_query && !history.is_empty() {
            self.refine(query, history).await?
        } else {
            query.to_string()
        };

        let passages = self.retrieve(&retrieval_query).await?;

        info!(stage = %Stage::Assembling, passages = passages.len(), "Assembling prompt");
        let assembled = self.assembler.assemble(query, &passages, history);
        debug!(report = ?assembled.metadata, "Assembly report");

        let response = self.generate(&assembled.prompt).await?;

        Ok(QueryOutcome {
            answer: Answer {
                text: response.text.trim().to_string(),
                sources: assembled.sources,
            },
            prompt: assembled.prompt,
            retrieval_query,
            usage: response.usage,
            metadata: assembled.metadata,
        })
    }

    /// Rewrite `query` into a standalone question, honoring the failure policy.
    async fn refine(&self, query: &str, history: &[ConversationTurn]) -> Result<String> {
        info!(stage = %Stage::Refining, "Refining query");

        let history_log = self.assembler.truncate_history(history);
        let request = CompletionRequest {
            model: self.settings.completion_model.clone(),
            messages: prompt::refine_messages(&self.settings.system_prompt_refine, &history_log, query),
            params: self.settings.generation_params(),
        };

        let rewrite = self
            .with_deadline(self.completer.complete(request), ProviderError::Timeout)
            .await
            .and_then(|response| {
                let text = response.text.trim().to_string();
                if text.is_empty() {
                    Err(ProviderError::InvalidResponse("refinement returned an empty query".into()))
                } else {
                    Ok(text)
                }
            });

        match (rewrite, self.settings.refinement_failure) {
            (Ok(refined), _) => {
                debug!(refined = %refined, "Query refined");
                Ok(refined)
            }
            (Err(e), RefinementFailurePolicy::Fallback) => {
                warn!(error = %e, "Query refinement failed, retrieving with the original query");
                Ok(query.to_string())
            }
            (Err(e), RefinementFailurePolicy::FailFast) => Err(Error::Refinement(e)),
        }
    }

    async fn retrieve(&self, retrieval_query: &str) -> Result<Vec<RetrievedPassage>> {
        info!(stage = %Stage::Retrieving, top_k = self.settings.top_k, "Retrieving passages");

        let vector = self
            .with_deadline(self.embedder.embed(retrieval_query), ProviderError::Timeout)
            .await
            .map_err(RetrievalError::Embedding)?;

        let matches = self
            .with_deadline(
                self.index
                    .search(&vector, self.settings.top_k, &self.settings.index_name),
                IndexError::Timeout,
            )
            .await
            .map_err(RetrievalError::Index)?;

        debug!(
            index = %self.settings.index_name,
            matches = matches.len(),
            "Index search complete"
        );
        if matches.len() > self.settings.top_k {
            warn!(
                returned = matches.len(),
                top_k = self.settings.top_k,
                "Index returned more matches than requested; keeping the first top_k"
            );
        }
        Ok(matches
            .into_iter()
            .take(self.settings.top_k)
            .map(RetrievedPassage::from)
            .collect())
    }

    async fn generate(&self, prompt: &AssembledPrompt) -> Result<CompletionResponse> {
        info!(
            stage = %Stage::Generating,
            model = %self.settings.completion_model,
            "Generating answer"
        );

        let request = CompletionRequest {
            model: self.settings.completion_model.clone(),
            messages: prompt::answer_messages(&self.settings.system_prompt_answer, prompt),
            params: self.settings.generation_params(),
        };

        self.with_deadline(self.completer.complete(request), ProviderError::Timeout)
            .await
            .map_err(Error::Generation)
    }

    /// Run `call` under the per-call deadline, mapping expiry with `on_timeout`.
    async fn with_deadline<T, E>(
        &self,
        call: impl Future<Output = std::result::Result<T, E>>,
        on_timeout: impl FnOnce(String) -> E,
    ) -> std::result::Result<T, E> {
        let deadline = self.settings.request_timeout;
        match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(format!(
                "no response within {}s",
                deadline.as_secs_f64()
            ))),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
