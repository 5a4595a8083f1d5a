use crate::chunking::validate_chunking;
use crate::error::{RagError, Result};
use crate::retriever::DEFAULT_TOP_K;
use clap::ValueEnum;
use serde::Serialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// How an answer is produced from the retrieved chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerMode {
    /// Show the retrieved passages themselves
    #[default]
    RetrievalOnly,
    /// Ask the language model to answer from the retrieved passages
    Generative,
}

impl FromStr for AnswerMode {
    type Err = RagError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "retrieval-only" | "retrieval_only" | "retrieval" => Ok(AnswerMode::RetrievalOnly),
            "generative" | "generate" => Ok(AnswerMode::Generative),
            other => Err(RagError::Configuration(format!(
                "unknown mode '{}', expected 'retrieval-only' or 'generative'",
                other
            ))),
        }
    }
}

/// Chunking, retrieval and answering settings
#[derive(Debug, Clone, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
    /// Chunks retrieved per question
    pub top_k: usize,
    pub mode: AnswerMode,
    /// Longest wait for the language model before giving up
    pub generation_timeout: Duration,
    /// Try the same prompt once more after a generation timeout
    pub retry_on_timeout: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        RagConfig {
            chunk_size: 200,
            chunk_overlap: 20,
            top_k: DEFAULT_TOP_K,
            mode: AnswerMode::RetrievalOnly,
            generation_timeout: Duration::from_secs(120),
            retry_on_timeout: false,
        }
    }
}

impl RagConfig {
    /// Create a configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create a configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RagConfig::default();

        let config = RagConfig {
            chunk_size: parse_var(&lookup, "RAG_CHUNK_SIZE")?.unwrap_or(defaults.chunk_size),
            chunk_overlap: parse_var(&lookup, "RAG_CHUNK_OVERLAP")?
                .unwrap_or(defaults.chunk_overlap),
            top_k: parse_var(&lookup, "RAG_TOP_K")?.unwrap_or(defaults.top_k),
            mode: parse_var(&lookup, "RAG_MODE")?.unwrap_or(defaults.mode),
            generation_timeout: parse_var::<u64, _>(&lookup, "RAG_GENERATION_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.generation_timeout),
            retry_on_timeout: parse_var(&lookup, "RAG_RETRY_ON_TIMEOUT")?
                .unwrap_or(defaults.retry_on_timeout),
        };

        Ok(config)
    }

    /// Check that the settings can be used to build and query an index
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.top_k == 0 {
            return Err(RagError::Configuration(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if self.generation_timeout.is_zero() {
            return Err(RagError::Configuration(
                "generation timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            RagError::Configuration(format!("invalid value '{}' for {}: {}", raw, key, e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RagConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RagConfig::default());
        assert_eq!(config.chunk_size, 200);
        assert_eq!(config.chunk_overlap, 20);
        assert_eq!(config.top_k, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = RagConfig::from_lookup(lookup(&[
            ("RAG_CHUNK_SIZE", "500"),
            ("RAG_TOP_K", " 5 "),
            ("RAG_MODE", "generative"),
            ("RAG_GENERATION_TIMEOUT_SECS", "30"),
            ("RAG_RETRY_ON_TIMEOUT", "true"),
        ]))
        .unwrap();

        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.mode, AnswerMode::Generative);
        assert_eq!(config.generation_timeout, Duration::from_secs(30));
        assert!(config.retry_on_timeout);
    }

    #[test]
    fn test_bad_values() {
        assert!(matches!(
            RagConfig::from_lookup(lookup(&[("RAG_TOP_K", "three")])),
            Err(RagError::Configuration(_))
        ));
        assert!(RagConfig::from_lookup(lookup(&[("RAG_MODE", "chatty")])).is_err());

        let config = RagConfig {
            chunk_overlap: 200,
            ..RagConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RagConfig {
            top_k: 0,
            ..RagConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
