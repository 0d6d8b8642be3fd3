//! Documents, chunks and embedded chunks.

use serde::{Deserialize, Serialize};

use crate::Chunker;

/// A loaded document. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier, unique within one run.
    pub id: String,
    /// Full raw text.
    pub text: String,
    /// Where the document came from (path, URL, email subject).
    pub source: String,
}

impl Document {
    /// Create a new document.
    pub fn new(id: impl Into<String>, text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source: source.into(),
        }
    }

    /// Create a document whose id is its source identifier.
    pub fn from_source(source: impl Into<String>, text: impl Into<String>) -> Self {
        let source = source.into();
        Self::new(source.clone(), text, source)
    }

    /// Split this document into source-tagged chunks.
    pub fn chunks(&self, chunker: &dyn Chunker) -> Vec<Chunk> {
        chunker
            .chunk(&self.text)
            .into_iter()
            .map(|segment| Chunk {
                text: segment.text,
                source: self.source.clone(),
                sequence_index: segment.index,
            })
            .collect()
    }
}

/// A bounded excerpt of a document.
///
/// `sequence_index` is the chunk's position within its source. It is kept for
/// traceability only; nothing orders chunks across documents by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The excerpt text.
    pub text: String,
    /// Source identifier of the owning document.
    pub source: String,
    /// Position within the owning document.
    #[serde(rename = "chunk_id")]
    pub sequence_index: usize,
}

/// A chunk paired with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    /// The chunk.
    pub chunk: Chunk,
    /// Its embedding vector.
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    /// Pair a chunk with its vector.
    #[must_use]
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }
}
