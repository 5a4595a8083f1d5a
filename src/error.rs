use std::time::Duration;

use thiserror::Error;

/// Errors raised while building the index or answering a question
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid chunking, retrieval or environment settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The input document is missing, unreadable or not text
    #[error("Failed to load document {path}: {message}")]
    DocumentLoad { path: String, message: String },

    /// The embedding collaborator failed, at build or query time
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// A query vector does not match the dimension of the indexed vectors
    #[error("Dimension mismatch: index holds {expected}-dimensional vectors, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The generation collaborator returned an error
    #[error("Generation error: {0}")]
    Generation(String),

    /// The generation collaborator did not answer in time
    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),
}

impl RagError {
    /// Short message suitable for showing to the person who asked the question
    pub fn user_message(&self) -> String {
        match self {
            RagError::GenerationTimeout(_) => {
                "The language model took too long to answer. Please try again.".to_string()
            }
            RagError::Generation(_) => {
                "The language model failed to produce an answer.".to_string()
            }
            RagError::Embedding(_) | RagError::DimensionMismatch { .. } => {
                "Could not search the document for this question.".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
