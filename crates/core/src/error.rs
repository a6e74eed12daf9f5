//! Error types for the Ragline domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external collaborator has its own error enum; the top-level
//! [`Error`] tags a failure with the pipeline stage it happened in.

use thiserror::Error;

/// The top-level error type returned by the query pipeline.
#[derive(Debug, Error)]
pub enum Error {
    // --- Caller errors ---
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Stage failures ---
    #[error("Query refinement failed: {0}")]
    Refinement(ProviderError),

    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Generation failed: {0}")]
    Generation(ProviderError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// The taxonomy tag for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidQuery(_) => ErrorKind::InvalidQuery,
            Error::Config { .. } => ErrorKind::ConfigurationError,
            Error::Refinement(_) | Error::Generation(_) => ErrorKind::CompletionFailure,
            Error::Retrieval(RetrievalError::Embedding(_)) => ErrorKind::EmbeddingFailure,
            Error::Retrieval(RetrievalError::Index(_)) => ErrorKind::IndexFailure,
        }
    }

    /// The pipeline stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            Error::InvalidQuery(_) | Error::Config { .. } => Stage::Received,
            Error::Refinement(_) => Stage::Refining,
            Error::Retrieval(_) => Stage::Retrieving,
            Error::Generation(_) => Stage::Generating,
        }
    }

    /// Whether the failure was a provider call exceeding its deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Refinement(e)
            | Error::Generation(e)
            | Error::Retrieval(RetrievalError::Embedding(e)) => {
                matches!(e, ProviderError::Timeout(_))
            }
            Error::Retrieval(RetrievalError::Index(e)) => matches!(e, IndexError::Timeout(_)),
            Error::InvalidQuery(_) | Error::Config { .. } => false,
        }
    }
}

/// Failure taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Empty or blank input. User error, never retried.
    InvalidQuery,
    EmbeddingFailure,
    IndexFailure,
    CompletionFailure,
    /// Detected before any provider call.
    ConfigurationError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidQuery => "invalid_query",
            ErrorKind::EmbeddingFailure => "embedding_failure",
            ErrorKind::IndexFailure => "index_failure",
            ErrorKind::CompletionFailure => "completion_failure",
            ErrorKind::ConfigurationError => "configuration_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States of the query pipeline.
///
/// `Received → [Refining] → Retrieving → Assembling → Generating → Done`,
/// with `Failed` reachable from any step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Received,
    Refining,
    Retrieving,
    Assembling,
    Generating,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Refining => "refining",
            Stage::Retrieving => "retrieving",
            Stage::Assembling => "assembling",
            Stage::Generating => "generating",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Bounded context errors ---

/// Errors from an embedding or completion backend.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors from a vector index.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    #[error("Vector dimension mismatch: index has {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index query failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Failed to load index snapshot: {0}")]
    Snapshot(String),

    #[error("Index not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// The two ways the retrieval stage can fail.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Embedding failed: {0}")]
    Embedding(ProviderError),

    #[error("Index search failed: {0}")]
    Index(#[from] IndexError),
}
