use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use doc_rag::answer::AnswerComposer;
use doc_rag::config::{AnswerMode, RagConfig};
use doc_rag::ollama::{OllamaClient, OllamaConfig};
use doc_rag::rag::RagEngine;

/// Ask questions about a text document, answered from its most relevant passages
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the plain text document to index
    #[arg(index = 1)]
    file_path: PathBuf,

    /// Maximum chunk length in characters
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Number of passages retrieved per question
    #[arg(long)]
    top_k: Option<usize>,

    /// Show retrieved passages or generate an answer with the language model
    #[arg(long, value_enum)]
    mode: Option<AnswerMode>,

    /// Ollama model used for embeddings
    #[arg(long)]
    embedding_model: Option<String>,

    /// Ollama model used for answers in generative mode
    #[arg(long)]
    generation_model: Option<String>,

    /// Answer a single question and exit instead of starting the interactive loop
    #[arg(long, short)]
    question: Option<String>,

    /// Print answers as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply(&self, config: &mut RagConfig, ollama: &mut OllamaConfig) {
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(chunk_overlap) = self.chunk_overlap {
            config.chunk_overlap = chunk_overlap;
        }
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(model) = &self.embedding_model {
            ollama.embedding_model = model.clone();
        }
        if let Some(model) = &self.generation_model {
            ollama.generation_model = model.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let mut config = RagConfig::from_env().context("Invalid RAG configuration")?;
    let mut ollama_config = OllamaConfig::from_env();
    args.apply(&mut config, &mut ollama_config);

    let ollama = Arc::new(OllamaClient::new(ollama_config));
    let composer = match config.mode {
        AnswerMode::RetrievalOnly => AnswerComposer::retrieval_only(),
        AnswerMode::Generative => AnswerComposer::generative(
            ollama.clone(),
            config.generation_timeout,
            config.retry_on_timeout,
        ),
    };

    let engine = RagEngine::from_path(config, &args.file_path, ollama.clone(), composer)
        .context("Invalid RAG configuration")?;

    info!(
        "Processing file: {} (mode {:?}, chunks of {} chars with {} overlap, top {}, embeddings {} via {})",
        args.file_path.display(),
        engine.config().mode,
        engine.config().chunk_size,
        engine.config().chunk_overlap,
        engine.config().top_k,
        ollama.config().embedding_model,
        ollama.config().url
    );

    // Build the index up front so a bad document or embedder stops startup
    engine
        .index()
        .await
        .context("Failed to build the document index")?;

    match &args.question {
        Some(question) => {
            if !engine.answer_and_print(question, args.json).await? {
                anyhow::bail!("Failed to answer the question");
            }
        }
        None => engine
            .run_query_loop(args.json)
            .await
            .context("Error in query loop")?,
    }

    Ok(())
}
