use std::sync::Arc;

use intellidocs_core::error::AppError;
use tracing::debug;

use crate::embeddings::Embedder;
use crate::index::{Indexer, ScoredChunk};

/// Embeds a question with the index's model and returns the closest chunks.
pub struct Retriever {
    indexer: Arc<Indexer>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(indexer: Arc<Indexer>, embedder: Arc<dyn Embedder>) -> Self {
        Self { indexer, embedder }
    }

    /// At most `k` chunks, most similar first. An empty index yields an empty result without
    /// calling the embedding backend.
    pub fn retrieve(&self, question: &str, k: usize) -> Result<Vec<ScoredChunk>, AppError> {
        let q = question.trim();
        if q.is_empty() {
            return Err(AppError::new(
                "AI_RETRIEVAL_FAILED",
                "Query must not be empty",
            ));
        }

        let snapshot = self.indexer.snapshot();
        if snapshot.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let qv = self.embedder.embed(snapshot.model(), q)?;
        let hits = snapshot.search(&qv, k)?;
        debug!(k, hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}
