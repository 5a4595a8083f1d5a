use crate::document::Document;
use crate::error::{RagError, Result};
use serde::Serialize;

/// Represents a text chunk with metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextChunk {
    /// Position of this chunk in the document's chunk sequence
    pub index: usize,
    /// The actual text content of this chunk
    pub text: String,
    /// Identifier of the document this chunk belongs to
    pub document_id: String,
    /// Byte offset where this chunk starts in the original document
    pub start_position: usize,
    /// Byte offset one past the end of this chunk in the original document
    pub end_position: usize,
}

/// Check that a chunk size and overlap can produce a forward-moving window
pub fn validate_chunking(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::Configuration(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(RagError::Configuration(format!(
            "chunk_overlap ({}) must be less than chunk_size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

/// Split a document into windows of `chunk_size` characters that overlap by `overlap` characters
///
/// Sizes count `char`s, so a window never cuts a UTF-8 sequence in half; the
/// recorded positions are byte offsets into `document.content`. The last chunk
/// may be shorter than `chunk_size`. An empty document produces no chunks.
pub fn split_into_chunks(
    document: &Document,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<TextChunk>> {
    validate_chunking(chunk_size, overlap)?;

    let text = document.content.as_str();
    // Byte offset of every char plus the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;
    let step = chunk_size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < char_count {
        let end = (start + chunk_size).min(char_count);
        let (start_position, end_position) = (boundaries[start], boundaries[end]);

        chunks.push(TextChunk {
            index: chunks.len(),
            text: text[start_position..end_position].to_string(),
            document_id: document.document_id.clone(),
            start_position,
            end_position,
        });

        if end == char_count {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Rebuild the original text from an ordered chunk sequence by dropping each overlap
pub fn reconstruct_text(chunks: &[TextChunk]) -> String {
    let mut text = String::new();
    let mut covered: usize = 0;

    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.start_position);
        text.push_str(&chunk.text[skip..]);
        covered = chunk.end_position;
    }

    text
}
