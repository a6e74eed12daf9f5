//! Vector index trait: nearest-neighbour search over stored passages.
//!
//! The index is provisioned and populated elsewhere; the core only queries
//! it. Results come back ordered most-similar-first and that order is
//! preserved all the way into the assembled prompt.

use crate::error::IndexError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A passage returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPassage {
    /// The passage text
    pub text: String,

    /// Source identifier (file name, URL, document id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Similarity score reported by the index
    #[serde(default)]
    pub score: f32,
}

/// A passage as consumed by the context assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl From<ScoredPassage> for RetrievedPassage {
    fn from(p: ScoredPassage) -> Self {
        Self {
            text: p.text,
            source: p.source,
        }
    }
}

/// The core VectorIndex trait.
///
/// Implementations: in-memory (snapshot-loaded), Pinecone.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The backend name (e.g., "memory", "pinecone").
    fn name(&self) -> &str;

    /// Return the `top_k` passages nearest to `vector` in `index_name`,
    /// most similar first.
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        index_name: &str,
    ) -> std::result::Result<Vec<ScoredPassage>, IndexError>;
}
