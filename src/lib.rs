pub mod answer;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod index;
pub mod ollama;
pub mod rag;
pub mod retriever;
