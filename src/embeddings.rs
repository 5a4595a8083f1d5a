use crate::error::{RagError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Embedding { values }
    }

    pub fn dimensions(&self) -> usize {
        self.values.len()
    }

    /// Fail when any component is NaN or infinite
    pub fn ensure_finite(&self) -> Result<()> {
        match self.values.iter().position(|v| !v.is_finite()) {
            Some(position) => Err(RagError::Embedding(format!(
                "embedding component {} is not a finite number",
                position
            ))),
            None => Ok(()),
        }
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Embedding { values }
    }
}

/// Maps text to fixed-length vectors
///
/// `embed_batch` must return one embedding per input, in input order. The
/// default implementation embeds each text in turn; backends with a native
/// batch endpoint should override it.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate the embedding for a single text
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for several texts
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            embeddings.push(self.embed(text).await?);
        }

        Ok(embeddings)
    }
}

/// Check that a batch of embeddings lines up with its inputs and shares one dimension
pub fn check_batch(embeddings: &[Embedding], expected_count: usize) -> Result<Option<usize>> {
    if embeddings.len() != expected_count {
        return Err(RagError::Embedding(format!(
            "expected {} embeddings, got {}",
            expected_count,
            embeddings.len()
        )));
    }

    let Some(first) = embeddings.first() else {
        return Ok(None);
    };
    let dimensions = first.dimensions();
    if dimensions == 0 {
        return Err(RagError::Embedding("embedder returned an empty vector".to_string()));
    }

    for embedding in embeddings {
        embedding.ensure_finite()?;
    }

    if let Some((position, odd)) = embeddings
        .iter()
        .enumerate()
        .find(|(_, e)| e.dimensions() != dimensions)
    {
        return Err(RagError::Embedding(format!(
            "embedding {} has {} dimensions, expected {}",
            position,
            odd.dimensions(),
            dimensions
        )));
    }

    Ok(Some(dimensions))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding> {
            Ok(Embedding::new(vec![text.len() as f32, 1.0]))
        }
    }

    #[tokio::test]
    async fn test_default_batch_keeps_order() {
        let embeddings = LengthEmbedder.embed_batch(&["a", "abc", "ab"]).await.unwrap();
        let firsts: Vec<f32> = embeddings.iter().map(|e| e.values[0]).collect();
        assert_eq!(firsts, vec![1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_check_batch() {
        let good = vec![Embedding::new(vec![1.0, 0.0]), Embedding::new(vec![0.0, 1.0])];
        assert_eq!(check_batch(&good, 2).unwrap(), Some(2));
        assert_eq!(check_batch(&[], 0).unwrap(), None);
        assert!(check_batch(&good, 3).is_err());

        let ragged = vec![Embedding::new(vec![1.0, 0.0]), Embedding::new(vec![1.0])];
        assert!(matches!(check_batch(&ragged, 2), Err(RagError::Embedding(_))));
    }

    #[test]
    fn test_check_batch_rejects_non_finite() {
        let with_nan = vec![Embedding::new(vec![1.0, 0.0]), Embedding::new(vec![f32::NAN, 1.0])];
        assert!(matches!(check_batch(&with_nan, 2), Err(RagError::Embedding(_))));

        let with_inf = vec![Embedding::new(vec![f32::INFINITY, 0.0])];
        assert!(matches!(check_batch(&with_inf, 1), Err(RagError::Embedding(_))));
    }
}
