use crate::answer::{Answer, AnswerComposer};
use crate::chunking::split_into_chunks;
use crate::config::{AnswerMode, RagConfig};
use crate::document::Document;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::index::{InMemoryIndex, VectorIndex};
use crate::retriever::Retriever;
use log::{error, info};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

enum DocumentSource {
    Path(PathBuf),
    Loaded(Document),
}

/// RAG (Retrieval-Augmented Generation) engine over a single document
///
/// The index is built on first use and then shared by every later question.
pub struct RagEngine {
    config: RagConfig,
    source: DocumentSource,
    embedder: Arc<dyn Embedder>,
    composer: AnswerComposer,
    index: OnceCell<Arc<InMemoryIndex>>,
}

impl RagEngine {
    /// Create an engine that loads its document from `path` when the index is first needed
    pub fn from_path(
        config: RagConfig,
        path: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        composer: AnswerComposer,
    ) -> Result<Self> {
        Self::with_source(config, DocumentSource::Path(path.into()), embedder, composer)
    }

    /// Create an engine over a document that is already in memory
    pub fn from_document(
        config: RagConfig,
        document: Document,
        embedder: Arc<dyn Embedder>,
        composer: AnswerComposer,
    ) -> Result<Self> {
        Self::with_source(config, DocumentSource::Loaded(document), embedder, composer)
    }

    fn with_source(
        config: RagConfig,
        source: DocumentSource,
        embedder: Arc<dyn Embedder>,
        composer: AnswerComposer,
    ) -> Result<Self> {
        config.validate()?;
        Ok(RagEngine {
            config,
            source,
            embedder,
            composer,
            index: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The shared index, built on the first call
    ///
    /// Concurrent first callers wait for the same build. A failed build caches
    /// nothing, so a partial index is never served.
    pub async fn index(&self) -> Result<Arc<InMemoryIndex>> {
        let index = self
            .index
            .get_or_try_init(|| async { self.build_index().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(index))
    }

    async fn build_index(&self) -> Result<InMemoryIndex> {
        let document = match &self.source {
            DocumentSource::Path(path) => Document::from_file(path)?,
            DocumentSource::Loaded(document) => document.clone(),
        };
        info!(
            "Loaded document {} ({}, {} bytes)",
            document.document_id,
            document.mime_type,
            document.content.len()
        );

        let chunks = split_into_chunks(
            &document,
            self.config.chunk_size,
            self.config.chunk_overlap,
        )?;
        info!("Split into {} chunks", chunks.len());

        InMemoryIndex::build(chunks, self.embedder.as_ref()).await
    }

    /// Answer one question from the document
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let index: Arc<dyn VectorIndex> = self.index().await?;
        let retriever = Retriever::new(Arc::clone(&self.embedder), index);

        let chunks = retriever.retrieve(question, self.config.top_k).await?;
        self.composer.answer(chunks, question).await
    }

    /// Answer one question and print the result, reporting failures to the user
    ///
    /// Returns whether the question was answered. A failed question leaves the
    /// engine ready for the next one.
    pub async fn answer_and_print(&self, question: &str, json: bool) -> anyhow::Result<bool> {
        if self.composer.mode() == AnswerMode::Generative {
            println!("Thinking...");
        }

        match self.ask(question).await {
            Ok(answer) => {
                println!("\n{}", render_answer(&answer, json)?);
                Ok(true)
            }
            Err(e) => {
                error!("Failed to answer question: {}", e);
                println!("\n{}", e.user_message());
                Ok(false)
            }
        }
    }

    /// Read questions from stdin until `exit` or end of input
    pub async fn run_query_loop(&self, json: bool) -> anyhow::Result<()> {
        let index = self.index().await?;
        info!(
            "Ready to answer questions from {} chunks. Type 'exit' to quit.",
            index.len()
        );

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut buffer = String::new();

        loop {
            print!("\nYour question: ");
            stdout.flush()?;

            buffer.clear();
            if stdin.lock().read_line(&mut buffer)? == 0 {
                break;
            }

            let question = buffer.trim();
            if question.is_empty() {
                continue;
            }
            if question.eq_ignore_ascii_case("exit") {
                println!("Goodbye!");
                break;
            }

            self.answer_and_print(question, json).await?;
        }

        Ok(())
    }
}

/// Render an answer as text, or as pretty JSON when `json` is set
pub fn render_answer(answer: &Answer, json: bool) -> anyhow::Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(answer)?)
    } else {
        Ok(answer.to_string())
    }
}
