//! In-memory vector index: named collections searched by cosine similarity.
//!
//! Collections are filled programmatically or loaded from a JSON Lines
//! snapshot, one passage per line:
//!
//! ```text
//! {"text": "Rust has no GC.", "source": "faq.md", "embedding": [0.1, 0.2]}
//! ```
//!
//! Useful for tests, demos, and small corpora that fit in RAM.

use crate::vector;
use async_trait::async_trait;
use ragline_core::error::IndexError;
use ragline_core::index::{ScoredPassage, VectorIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A stored passage with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPassage {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    pub embedding: Vec<f32>,
}

/// An in-memory index holding any number of named collections.
#[derive(Clone, Default)]
pub struct InMemoryIndex {
    collections: Arc<RwLock<HashMap<String, Vec<IndexedPassage>>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection. Existing collections are left untouched.
    pub async fn create(&self, index_name: &str) {
        self.collections
            .write()
            .await
            .entry(index_name.to_string())
            .or_default();
    }

    /// Add a passage, creating the collection if needed.
    ///
    /// Every passage in a collection must share the same dimension.
    pub async fn insert(
        &self,
        index_name: &str,
        passage: IndexedPassage,
    ) -> Result<(), IndexError> {
        let mut collections = self.collections.write().await;
        let entries = collections.entry(index_name.to_string()).or_default();
        if let Some(first) = entries.first() {
            if first.embedding.len() != passage.embedding.len() {
                return Err(IndexError::DimensionMismatch {
                    expected: first.embedding.len(),
                    actual: passage.embedding.len(),
                });
            }
        }
        entries.push(passage);
        Ok(())
    }

    /// Load a JSON Lines snapshot into `index_name`.
    ///
    /// Blank lines are ignored. Lines that fail to parse or whose dimension
    /// disagrees with the rest of the collection are skipped with a warning.
    /// Returns the number of passages loaded.
    pub async fn load_snapshot(&self, index_name: &str, path: &Path) -> Result<usize, IndexError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| IndexError::Snapshot(format!("{}: {e}", path.display())))?;

        self.create(index_name).await;
        let mut loaded = 0;
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let passage = match serde_json::from_str::<IndexedPassage>(line) {
                Ok(p) => p,
                Err(e) => {
                    warn!(line = line_no + 1, error = %e, "Skipping unreadable snapshot line");
                    continue;
                }
            };
            match self.insert(index_name, passage).await {
                Ok(()) => loaded += 1,
                Err(e) => warn!(line = line_no + 1, error = %e, "Skipping snapshot line"),
            }
        }

        debug!(index = index_name, path = %path.display(), loaded, "Snapshot loaded");
        Ok(loaded)
    }

    /// Number of passages in a collection, if it exists.
    pub async fn len(&self, index_name: &str) -> Option<usize> {
        self.collections
            .read()
            .await
            .get(index_name)
            .map(|entries| entries.len())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        index_name: &str,
    ) -> Result<Vec<ScoredPassage>, IndexError> {
        let collections = self.collections.read().await;
        let entries = collections
            .get(index_name)
            .ok_or_else(|| IndexError::UnknownIndex(index_name.to_string()))?;

        if let Some(first) = entries.first() {
            if first.embedding.len() != vector.len() {
                return Err(IndexError::DimensionMismatch {
                    expected: first.embedding.len(),
                    actual: vector.len(),
                });
            }
        }

        Ok(vector::top_k(entries, vector, top_k))
    }
}
