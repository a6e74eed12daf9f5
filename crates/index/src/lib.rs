//! Vector index implementations for Ragline.

pub mod in_memory;
pub mod pinecone;
pub mod vector;

pub use in_memory::{InMemoryIndex, IndexedPassage};
pub use pinecone::PineconeIndex;
pub use vector::{cosine_similarity, top_k};

use ragline_config::{AppConfig, IndexBackend};
use ragline_core::error::IndexError;
use ragline_core::index::VectorIndex;
use std::sync::Arc;

/// Build the configured index backend.
///
/// The memory backend loads `retrieval.snapshot_path` into the collection
/// named by `retrieval.index_name`; without a snapshot it starts empty.
pub async fn build_from_config(config: &AppConfig) -> Result<Arc<dyn VectorIndex>, IndexError> {
    let retrieval = &config.retrieval;
    match retrieval.backend {
        IndexBackend::Memory => {
            let index = InMemoryIndex::new();
            if let (Some(path), Some(name)) = (&retrieval.snapshot_path, &retrieval.index_name) {
                let loaded = index.load_snapshot(name, path).await?;
                tracing::info!(index = %name, loaded, "In-memory index ready");
            }
            Ok(Arc::new(index))
        }
        IndexBackend::Pinecone => {
            let host = retrieval.pinecone_host.as_deref().ok_or_else(|| {
                IndexError::NotConfigured("retrieval.pinecone_host is not set".into())
            })?;
            let api_key = retrieval.pinecone_api_key.as_deref().ok_or_else(|| {
                IndexError::NotConfigured("PINECONE_API_KEY is not set".into())
            })?;
            Ok(Arc::new(PineconeIndex::new(host, api_key)))
        }
    }
}
