//! Shared test doubles for pipeline tests.

use async_trait::async_trait;
use ragline_core::error::{IndexError, ProviderError};
use ragline_core::index::{ScoredPassage, VectorIndex};
use ragline_core::message::Role;
use ragline_core::provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, EmbeddingProvider, Usage,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

fn response(text: impl Into<String>, model: &str) -> CompletionResponse {
    CompletionResponse {
        text: text.into(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: model.into(),
    }
}

/// A completion provider that returns a sequence of scripted results.
///
/// Panics if more calls are made than results provided.
pub struct ScriptedCompleter {
    results: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompleter {
    pub fn new(results: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompleter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let model = request.model.clone();
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let next = self
            .results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedCompleter: no result for call #{call}"));
        next.map(|text| response(text, &model))
    }
}

/// Echoes the last user message back as the completion.
pub struct EchoCompleter;

#[async_trait]
impl CompletionProvider for EchoCompleter {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let text = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(response(text, &request.model))
    }
}

/// Sleeps before answering, for deadline tests.
pub struct SlowCompleter {
    delay: Duration,
}

impl SlowCompleter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl CompletionProvider for SlowCompleter {
    fn name(&self) -> &str {
        "slow"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Ok(response("too late", &request.model))
    }
}

/// An embedder returning a fixed vector (or a fixed error), recording inputs.
pub struct StubEmbedder {
    result: Result<Vec<f32>, ProviderError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl StubEmbedder {
    pub fn ok() -> Self {
        Self {
            result: Ok(vec![1.0, 0.0, 0.0]),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            result: Err(error),
            ..Self::ok()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn name(&self) -> &str {
        "stub"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

/// An index returning fixed passages (or a fixed error), recording calls.
pub struct StubIndex {
    result: Result<Vec<ScoredPassage>, IndexError>,
    calls: Mutex<Vec<(usize, String)>>,
}

impl StubIndex {
    pub fn with_passages(passages: Vec<ScoredPassage>) -> Self {
        Self {
            result: Ok(passages),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: IndexError) -> Self {
        Self {
            result: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<(usize, String)> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl VectorIndex for StubIndex {
    fn name(&self) -> &str {
        "stub"
    }

    async fn search(
        &self,
        _vector: &[f32],
        top_k: usize,
        index_name: &str,
    ) -> Result<Vec<ScoredPassage>, IndexError> {
        self.calls
            .lock()
            .unwrap()
            .push((top_k, index_name.to_string()));
        self.result.clone()
    }
}

/// Create a scored passage.
pub fn scored(text: &str, source: Option<&str>) -> ScoredPassage {
    ScoredPassage {
        text: text.into(),
        source: source.map(String::from),
        score: 0.9,
    }
}
