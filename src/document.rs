use crate::error::{RagError, Result};
use log::{debug, info};
use mime_guess::from_path;
use std::fs;
use std::path::Path;

/// Represents a loaded document with its content and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// The full text of the document
    pub content: String,
    /// The document's file name (used as document ID)
    pub document_id: String,
    /// The document's guessed MIME type
    pub mime_type: String,
}

impl Document {
    /// Create a document from text already in memory
    pub fn new(document_id: impl Into<String>, content: impl Into<String>) -> Self {
        Document {
            content: content.into(),
            document_id: document_id.into(),
            mime_type: "text/plain".to_string(),
        }
    }

    /// Load a document from a file path
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();
        let load_error = |message: &str| RagError::DocumentLoad {
            path: path.display().to_string(),
            message: message.to_string(),
        };

        let file_name = path
            .file_name()
            .ok_or_else(|| load_error("invalid file name"))?
            .to_str()
            .ok_or_else(|| load_error("invalid file name encoding"))?
            .to_string();

        let mime = from_path(path).first_or_octet_stream();
        let mime_type = mime.to_string();
        debug!("Detected MIME type: {}", mime_type);

        let content = read_document_content(path, &mime_type)?;

        Ok(Document {
            content,
            document_id: file_name,
            mime_type,
        })
    }
}

/// Read a document as UTF-8 text, rejecting formats that are known not to be text
pub fn read_document_content<P: AsRef<Path>>(file_path: P, mime_type: &str) -> Result<String> {
    let path = file_path.as_ref();

    // Files without a recognised extension come back as octet-stream and are
    // treated as plain text.
    if !is_text_mime(mime_type) {
        return Err(RagError::DocumentLoad {
            path: path.display().to_string(),
            message: format!(
                "unsupported document format: {}. Only plain text files are supported.",
                mime_type
            ),
        });
    }

    info!("Processing text document: {}", path.display());
    fs::read_to_string(path).map_err(|e| RagError::DocumentLoad {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn is_text_mime(mime_type: &str) -> bool {
    mime_type.starts_with("text/") || mime_type == "application/octet-stream"
}
