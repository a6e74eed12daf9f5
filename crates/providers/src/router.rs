//! Provider router: selects the embedding and completion backends from config.
//!
//! Each registered backend is stored once per capability so a single
//! OpenAI-compatible client can serve both.

use crate::openai_compat::OpenAiCompatProvider;
use ragline_core::provider::{CompletionProvider, EmbeddingProvider};
use std::collections::HashMap;
use std::sync::Arc;

/// A backend registered under one name.
#[derive(Clone)]
pub struct ProviderHandle {
    pub completion: Arc<dyn CompletionProvider>,
    pub embedding: Arc<dyn EmbeddingProvider>,
}

/// Routes embedding and completion calls to the configured backend.
pub struct ProviderRouter {
    providers: HashMap<String, ProviderHandle>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a backend that serves both capabilities.
    pub fn register<P>(&mut self, name: impl Into<String>, provider: Arc<P>)
    where
        P: CompletionProvider + EmbeddingProvider + 'static,
    {
        let handle = ProviderHandle {
            completion: provider.clone(),
            embedding: provider,
        };
        self.providers.insert(name.into(), handle);
    }

    /// Get the default backend.
    pub fn default(&self) -> Option<ProviderHandle> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific backend by name.
    pub fn get(&self, name: &str) -> Option<ProviderHandle> {
        self.providers.get(name).cloned()
    }

    pub fn default_name(&self) -> &str {
        &self.default_provider
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build providers from configuration.
///
/// Every backend gets the configured embedding model; the completion model
/// travels with each request instead.
pub fn build_from_config(config: &ragline_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);
    let embedding_model = &config.retrieval.embedding_model_id;

    for (name, provider_config) in &config.providers {
        let api_key = config.provider_api_key(name).unwrap_or_default();
        let base_url = provider_config
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));

        let provider = OpenAiCompatProvider::new(name, &base_url, &api_key)
            .with_embedding_model(embedding_model);
        router.register(name.clone(), Arc::new(provider));
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let base_url = default_base_url(&config.default_provider);
        let provider = OpenAiCompatProvider::new(&config.default_provider, &base_url, &api_key)
            .with_embedding_model(embedding_model);
        router.register(config.default_provider.clone(), Arc::new(provider));
    }

    router
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
