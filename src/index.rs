use crate::chunking::TextChunk;
use crate::embeddings::{check_batch, Embedder, Embedding};
use crate::error::{RagError, Result};
use log::{debug, info};
use serde::Serialize;

/// A chunk returned by a similarity search together with its score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    /// Cosine similarity to the query, higher is better
    pub score: f32,
}

/// Nearest-neighbour search over an immutable set of embedded chunks
///
/// Results are ordered best-first by cosine similarity and have length
/// `min(k, len())`. Equal scores keep insertion order. Querying an empty
/// index returns no results rather than an error.
pub trait VectorIndex: Send + Sync {
    /// Find the `k` chunks most similar to `vector`
    fn query(&self, vector: &Embedding, k: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of stored chunks
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension of stored vectors, `None` while empty
    fn dimensions(&self) -> Option<usize>;
}

struct IndexEntry {
    chunk: TextChunk,
    embedding: Embedding,
    norm: f64,
}

/// Exact linear-scan index kept in process memory
pub struct InMemoryIndex {
    entries: Vec<IndexEntry>,
    dimensions: Option<usize>,
}

impl InMemoryIndex {
    /// Embed every chunk in one batch and store the pairs in chunk order
    ///
    /// Any embedding failure aborts the build; no partial index is returned.
    pub async fn build(chunks: Vec<TextChunk>, embedder: &dyn Embedder) -> Result<Self> {
        info!("Generating embeddings for {} chunks...", chunks.len());

        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&texts).await?
        };

        let index = Self::from_embeddings(chunks, embeddings)?;
        info!(
            "Built index with {} entries ({} dimensions)",
            index.len(),
            index.dimensions.unwrap_or(0)
        );

        Ok(index)
    }

    /// Store chunks with precomputed embeddings, one embedding per chunk
    pub fn from_embeddings(chunks: Vec<TextChunk>, embeddings: Vec<Embedding>) -> Result<Self> {
        let dimensions = check_batch(&embeddings, chunks.len())?;

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let norm = l2_norm(&embedding.values);
                IndexEntry {
                    chunk,
                    embedding,
                    norm,
                }
            })
            .collect();

        Ok(InMemoryIndex {
            entries,
            dimensions,
        })
    }

    /// Stored chunks in insertion order
    pub fn chunks(&self) -> impl Iterator<Item = &TextChunk> {
        self.entries.iter().map(|entry| &entry.chunk)
    }
}

impl VectorIndex for InMemoryIndex {
    fn query(&self, vector: &Embedding, k: usize) -> Result<Vec<ScoredChunk>> {
        let Some(dimensions) = self.dimensions else {
            return Ok(Vec::new());
        };
        if vector.dimensions() != dimensions {
            return Err(RagError::DimensionMismatch {
                expected: dimensions,
                actual: vector.dimensions(),
            });
        }
        vector.ensure_finite()?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_norm = l2_norm(&vector.values);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let score = cosine(&entry.embedding.values, entry.norm, &vector.values, query_norm);
                (position, score)
            })
            .collect();

        // Scores are finite, so total_cmp is a plain descending order; the
        // stable sort keeps insertion order for equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        debug!("Index query returned {} of {} entries", scored.len(), self.len());

        Ok(scored
            .into_iter()
            .map(|(position, score)| ScoredChunk {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }
}

/// Cosine similarity of two equal-length vectors; 0.0 when either has zero length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine(a, l2_norm(a), b, l2_norm(b))
}

// Accumulates in f64 so squares of large finite f32 components cannot overflow
fn cosine(a: &[f32], a_norm: f64, b: &[f32], b_norm: f64) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let score = (dot / (a_norm * b_norm)) as f32;
    // Fold -0.0 into 0.0 so it ties with 0.0 under total_cmp
    if score == 0.0 {
        0.0
    } else {
        score
    }
}

fn l2_norm(values: &[f32]) -> f64 {
    values
        .iter()
        .map(|v| f64::from(*v) * f64::from(*v))
        .sum::<f64>()
        .sqrt()
}
