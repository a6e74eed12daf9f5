//! Configuration loading, validation, and management for Ragline.
//!
//! Loads configuration from `~/.ragline/config.toml` (or an explicit path)
//! with environment variable overrides. Budget fractions and generation
//! parameters are validated at load time so a bad value never reaches a
//! provider call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ragline/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion and embedding backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider used for both completions and embeddings
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Provider-specific overrides (base URL, key)
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Vector index and embedding settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Completion model and sampling settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Context-window budget
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Fixed system instructions
    #[serde(default)]
    pub prompts: PromptConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("providers", &self.providers)
            .field("retrieval", &self.retrieval)
            .field("generation", &self.generation)
            .field("budget", &self.budget)
            .field("prompts", &self.prompts)
            .field("gateway", &self.gateway)
            .field("logging", &self.logging)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Which vector index implementation to query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    /// In-process cosine index loaded from a JSON Lines snapshot
    #[default]
    Memory,
    /// Pinecone over HTTP
    Pinecone,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Name of the index (collection) to search. Required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    /// Passages requested per query. Not caller-controllable.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_embedding_model")]
    pub embedding_model_id: String,

    #[serde(default)]
    pub backend: IndexBackend,

    /// JSON Lines snapshot for the memory backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,

    /// Pinecone index host; `{index}` is replaced with the index name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinecone_host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinecone_api_key: Option<String>,
}

fn default_top_k() -> usize {
    3
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_name: None,
            top_k: default_top_k(),
            embedding_model_id: default_embedding_model(),
            backend: IndexBackend::default(),
            snapshot_path: None,
            pinecone_host: None,
            pinecone_api_key: None,
        }
    }
}

impl std::fmt::Debug for RetrievalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalConfig")
            .field("index_name", &self.index_name)
            .field("top_k", &self.top_k)
            .field("embedding_model_id", &self.embedding_model_id)
            .field("backend", &self.backend)
            .field("snapshot_path", &self.snapshot_path)
            .field("pinecone_host", &self.pinecone_host)
            .field("pinecone_api_key", &redact(&self.pinecone_api_key))
            .finish()
    }
}

/// What to do when query refinement fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementFailurePolicy {
    /// Fail the whole query
    #[default]
    FailFast,
    /// Log a warning and retrieve with the unrefined query
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_completion_model")]
    pub completion_model_id: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default)]
    pub frequency_penalty: f32,

    #[serde(default)]
    pub presence_penalty: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Rewrite follow-up questions into standalone queries before retrieval
    #[serde(default = "default_true")]
    pub refine_query: bool,

    #[serde(default)]
    pub refinement_failure: RefinementFailurePolicy,

    /// Deadline for each provider call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_completion_model() -> String {
    "gpt-4o-mini".into()
}
fn default_top_p() -> f32 {
    1.0
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            completion_model_id: default_completion_model(),
            temperature: 0.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            top_p: default_top_p(),
            refine_query: true,
            refinement_failure: RefinementFailurePolicy::default(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Context-window budget, in model tokens and fractions thereof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_max_total_tokens")]
    pub max_total_tokens: u32,

    #[serde(default = "default_max_response_tokens")]
    pub max_response_tokens: u32,

    /// Share of the query budget reserved for retrieved passages
    #[serde(default = "default_context_fraction")]
    pub context_fraction: f32,

    /// Share of the query budget reserved for conversation history
    #[serde(default = "default_history_fraction")]
    pub history_fraction: f32,

    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f32,
}

fn default_max_total_tokens() -> u32 {
    4096
}
fn default_max_response_tokens() -> u32 {
    400
}
fn default_context_fraction() -> f32 {
    0.25
}
fn default_history_fraction() -> f32 {
    0.25
}
fn default_chars_per_token() -> f32 {
    4.0
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_total_tokens: default_max_total_tokens(),
            max_response_tokens: default_max_response_tokens(),
            context_fraction: default_context_fraction(),
            history_fraction: default_history_fraction(),
            chars_per_token: default_chars_per_token(),
        }
    }
}

impl BudgetConfig {
    /// Check the budget rules, returning the first violation.
    ///
    /// This is the only place the rules live; the pipeline's token budget
    /// delegates here.
    pub fn check(&self) -> Result<(), String> {
        if self.max_response_tokens >= self.max_total_tokens {
            return Err(format!(
                "max_response_tokens ({}) must be less than max_total_tokens ({})",
                self.max_response_tokens, self.max_total_tokens
            ));
        }
        for (name, value) in [
            ("context_fraction", self.context_fraction),
            ("history_fraction", self.history_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} must be between 0.0 and 1.0, got {value}"));
            }
        }
        if self.context_fraction + self.history_fraction > 1.0 {
            return Err("context_fraction + history_fraction must not exceed 1.0".into());
        }
        // Also rejects NaN.
        if !(self.chars_per_token > 0.0) {
            return Err("chars_per_token must be greater than 0".into());
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.check()
            .map_err(|reason| ConfigError::ValidationError(format!("budget.{reason}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Instruction for rewriting a follow-up into a standalone question
    #[serde(default = "default_system_prompt_refine")]
    pub system_prompt_refine: String,

    /// Instruction for answering from the retrieved context
    #[serde(default = "default_system_prompt_answer")]
    pub system_prompt_answer: String,
}

fn default_system_prompt_refine() -> String {
    "Given the conversation history and a follow-up question, rewrite the follow-up \
     question as a standalone question that can be understood without the history. \
     Reply with the rewritten question only."
        .into()
}
fn default_system_prompt_answer() -> String {
    "Answer the question based on the context below and the conversation so far. \
     If the answer is not contained in them, say that you don't know."
        .into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt_refine: default_system_prompt_refine(),
            system_prompt_answer: default_system_prompt_answer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// CORS origins. Empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: vec![],
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

impl AppConfig {
    /// Load configuration from the default path (~/.ragline/config.toml).
    ///
    /// Environment variables override the file:
    /// - `RAGLINE_API_KEY`, then `OPENAI_API_KEY`
    /// - `RAGLINE_PROVIDER`
    /// - `RAGLINE_COMPLETION_MODEL`
    /// - `RAGLINE_INDEX_NAME`
    /// - `PINECONE_API_KEY`, `PINECONE_HOST`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Load from an explicit path if given, otherwise the default path.
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_path);
        let mut config = Self::read_file(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides through `lookup` (usually `std::env::var`).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("RAGLINE_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(provider) = lookup("RAGLINE_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("RAGLINE_COMPLETION_MODEL") {
            self.generation.completion_model_id = model;
        }
        if let Some(index) = lookup("RAGLINE_INDEX_NAME") {
            self.retrieval.index_name = Some(index);
        }
        if self.retrieval.pinecone_api_key.is_none() {
            self.retrieval.pinecone_api_key = lookup("PINECONE_API_KEY");
        }
        if let Some(host) = lookup("PINECONE_HOST") {
            self.retrieval.pinecone_host = Some(host);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ragline")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    ///
    /// A missing `retrieval.index_name` is not an error here: it may still
    /// arrive from the environment. The pipeline rejects it before serving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.temperature < 0.0 || self.generation.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }
        if self.generation.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self
            .retrieval
            .index_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "retrieval.index_name must not be blank".into(),
            ));
        }
        self.budget.validate()
    }

    /// Resolve the API key for a provider: per-provider key first, then the global one.
    pub fn provider_api_key(&self, name: &str) -> Option<String> {
        self.providers
            .get(name)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            providers: HashMap::new(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            budget: BudgetConfig::default(),
            prompts: PromptConfig::default(),
            gateway: GatewayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
