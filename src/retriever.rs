use crate::chunking::TextChunk;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::index::{ScoredChunk, VectorIndex};
use log::debug;
use std::sync::Arc;

/// Number of chunks retrieved per question unless configured otherwise
pub const DEFAULT_TOP_K: usize = 3;

/// Finds the chunks most relevant to a question
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Retriever { embedder, index }
    }

    /// Embed the question and return the `k` best chunks with their scores, best first
    pub async fn search(&self, query_text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let query_embedding = self.embedder.embed(query_text).await?;
        let results = self.index.query(&query_embedding, k)?;
        debug!(
            "Retrieved {} chunks for question ({} requested)",
            results.len(),
            k
        );
        Ok(results)
    }

    /// Embed the question and return the `k` best chunks, best first
    pub async fn retrieve(&self, query_text: &str, k: usize) -> Result<Vec<TextChunk>> {
        Ok(self
            .search(query_text, k)
            .await?
            .into_iter()
            .map(|scored| scored.chunk)
            .collect())
    }
}
