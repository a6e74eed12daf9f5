//! # Ragline Core
//!
//! Domain types, capability traits, and error definitions for the Ragline
//! retrieval-augmented chat orchestrator. This crate has **no HTTP or runtime
//! dependencies**: it defines the contracts every other crate implements
//! against.
//!
//! ## Design Philosophy
//!
//! Each external collaborator (embedding model, vector index, completion
//! model) is a trait here. Implementations live in their own crates. This
//! enables:
//! - Injecting real clients or stubs at orchestrator construction time
//! - Testing the pipeline without a network
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod index;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ErrorKind, IndexError, ProviderError, Result, RetrievalError, Stage};
pub use index::{RetrievedPassage, ScoredPassage, VectorIndex};
pub use message::{ConversationTurn, Message, Role};
pub use provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, EmbeddingProvider,
    GenerationParams, Usage,
};
