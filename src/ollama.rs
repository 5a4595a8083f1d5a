use crate::embeddings::{Embedder, Embedding};
use crate::error::{RagError, Result};
use crate::generation::Generator;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_URL: &str = "http://localhost:11434";
const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
const DEFAULT_GENERATION_MODEL: &str = "gemma2:2b";

/// Configuration for a local Ollama server
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    pub url: String,
    pub embedding_model: String,
    pub generation_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        OllamaConfig {
            url: DEFAULT_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
        }
    }
}

impl OllamaConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = OllamaConfig::default();
        let var = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());

        OllamaConfig {
            url: var("OLLAMA_URL").unwrap_or(defaults.url),
            embedding_model: var("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            generation_model: var("GENERATION_MODEL").unwrap_or(defaults.generation_model),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.url.trim_end_matches('/'), path)
    }
}

/// Client for the Ollama embedding and generation APIs
#[derive(Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: OllamaConfig) -> Self {
        let client = reqwest::Client::new();
        OllamaClient { config, client }
    }

    /// Get the client configuration
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    async fn request_embeddings(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let request = EmbedRequest {
            model: &self.config.embedding_model,
            input: texts,
        };

        let response = self
            .client
            .post(self.config.endpoint("embed"))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Embedding(format!(
                "API request failed: {} {}",
                status, error_text
            )));
        }

        let response_data: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to parse response: {}", e)))?;

        debug!(
            "Received {} embeddings from {}",
            response_data.embeddings.len(),
            self.config.embedding_model
        );

        Ok(response_data
            .embeddings
            .into_iter()
            .map(Embedding::new)
            .collect())
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.request_embeddings(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_embeddings(texts).await
    }
}

#[async_trait]
impl Generator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.config.generation_model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(self.config.endpoint("generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Generation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Generation(format!(
                "API request failed: {}",
                error_text
            )));
        }

        let response_data: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RagError::Generation(format!("Failed to parse response: {}", e)))?;

        Ok(response_data.response)
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize, Debug)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    response: String,
}
