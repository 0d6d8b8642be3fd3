//! # quarry
//!
//! Retrieval-augmented question answering and fact-preserving map-reduce
//! summarization over small personal corpora (note exports, PDFs turned to
//! text, newsletters).
//!
//! ## The Problem
//!
//! Language models have context windows. A folder of notes does not fit, and
//! neither does a long newsletter. Two pipelines work around that:
//!
//! - **Ask**: split documents into overlapping chunks, embed them, keep the
//!   vectors in a flat index, and answer a question from the K closest chunks.
//! - **Digest**: split each long document into non-overlapping windows,
//!   summarize each window, merge the partials into one fact list per
//!   document, then cluster every fact list into a themed Markdown digest.
//!
//! ```text
//!                 Chunker ──► Embedder ──► VectorIndex
//!                    │                         │
//!                    │                     Retriever ──► RagPipeline ──► answer
//!                    │                                        ▲
//!                    │                                    Answerer
//!                    │                                        ▼
//!                    └────────────────────────► MapReduceSummarizer ──► Digest
//! ```
//!
//! [`Embedder`] and [`Answerer`] are capabilities supplied by the caller.
//! [`OpenAiClient`] implements both against an OpenAI-compatible HTTP API
//! (feature `openai`, on by default).
//!
//! ## Chunking
//!
//! Units are chars (Unicode scalar values); [`Segment`] offsets are bytes.
//! Consecutive chunks share exactly `overlap` chars.
//!
//! ### Fixed Size
//!
//! ```text
//! Document: "The quick brown fox jumps over the lazy dog."
//! Size: 20, Overlap: 5
//!
//! Chunk 0: "The quick brown fox "  [0..20]
//! Chunk 1: " fox jumps over the "  [15..35]
//! Chunk 2: " the lazy dog."        [30..44]
//! ```
//!
//! Used for summarization windows (`overlap = 0`), where coverage matters and
//! boundaries do not.
//!
//! ### Recursive
//!
//! Each chunk ends on the coarsest natural boundary found in the back half of
//! its window:
//!
//! ```text
//! Boundaries: ["\n\n", "\n", sentence (UAX #29), word (UAX #29)]
//!
//! 1. Is there a paragraph break in the back half? Cut after the last one.
//! 2. Otherwise a line break, then a sentence end, then a word end.
//! 3. Nothing at all? Hard split at the window edge.
//! ```
//!
//! The next chunk starts exactly `overlap` chars before the cut.
//!
//! ## Quick Start
//!
//! ```rust
//! use quarry::{Chunker, FixedChunker, RecursiveChunker};
//!
//! let text = "The quick brown fox jumps over the lazy dog. \
//!             Pack my box with five dozen liquor jugs.";
//!
//! let chunks = quarry::split(text, 50, 10).unwrap();
//! assert!(chunks.iter().all(|c| c.chars().count() <= 50));
//!
//! let windows = FixedChunker::no_overlap(40).chunk(text);
//! assert_eq!(windows.len(), 3);
//!
//! let segments = RecursiveChunker::prose(60, 0).chunk(text);
//! assert_eq!(segments[0].text, "The quick brown fox jumps over the lazy dog. ");
//! ```
//!
//! ## Asking
//!
//! ```rust,ignore
//! let client = Arc::new(OpenAiClient::from_env(&config.openai)?);
//! let mut retriever = Retriever::new(client.clone(), RecursiveChunker::prose(1000, 200));
//! retriever.index_documents(&DirectoryLoader::new("notes").load()?).await?;
//!
//! let pipeline = RagPipeline::new(retriever, client);
//! println!("{}", pipeline.ask("When is the dentist?").await?);
//! ```
//!
//! ## Errors
//!
//! Provider failures are never retried here. They surface as
//! [`Error::Provider`] carrying the [`Phase`] that failed, so a caller can
//! retry one chunk, one merge or the digest. [`DigestRun`] keeps finished
//! fact packs, and the finished chunk summaries of an interrupted document,
//! across such retries.

mod config;
mod document;
mod error;
mod fixed;
mod index;
mod loader;
mod mail;
mod pipeline;
mod provider;
mod recursive;
mod retriever;
mod segment;
mod summarize;

#[cfg(feature = "fastembed")]
mod local;
#[cfg(feature = "openai")]
mod openai;

pub use config::{
    OpenAiSettings, QuarryConfig, RetrievalSettings, SummarizeSettings, API_KEY_ENV,
};
pub use document::{Chunk, Document, EmbeddedChunk};
pub use error::{Error, Phase, ProviderError, Result};
pub use fixed::FixedChunker;
pub use index::{Hit, RetrievalResult, VectorIndex, INDEX_FILE, METADATA_FILE};
pub use loader::{html_to_text, read_document, DirectoryLoader, DocumentLoader};
pub use mail::{deliver_digest, fetch_documents, MailReader, MailSender, RawMessage, NO_SUBJECT};
pub use pipeline::{build_prompt, Answer, RagPipeline, DEFAULT_TOP_K, NO_INFORMATION};
pub use provider::{Answerer, Embedder, Message, Prompt, Role};
pub use recursive::{Boundary, RecursiveChunker};
pub use retriever::{Retriever, DEFAULT_EMBED_BATCH};
pub use segment::Segment;
pub use summarize::{
    Digest, DigestRun, FactPack, MapReduceSummarizer, Partials, DEFAULT_MAX_IN_FLIGHT,
    DEFAULT_SUMMARY_CHUNK,
};

#[cfg(feature = "fastembed")]
pub use local::FastEmbedder;
#[cfg(feature = "openai")]
pub use openai::OpenAiClient;

/// A text chunking strategy.
///
/// ```rust
/// use quarry::{Chunker, FixedChunker, RecursiveChunker, Segment};
///
/// fn chunk_document(chunker: &dyn Chunker, text: &str) -> Vec<Segment> {
///     chunker.chunk(text)
/// }
///
/// let text = "Hello world. This is a test.";
/// let a = chunk_document(&FixedChunker::new(10, 2), text);
/// let b = chunk_document(&RecursiveChunker::prose(10, 2), text);
/// assert!(!a.is_empty() && !b.is_empty());
/// ```
pub trait Chunker: Send + Sync {
    /// Split text into chunks.
    ///
    /// Each chunk is a [`Segment`] holding the text and its byte offsets in
    /// the original document. Empty text yields no segments.
    fn chunk(&self, text: &str) -> Vec<Segment>;

    /// Estimate the number of chunks for a text of `text_len` chars.
    ///
    /// Useful for pre-allocation. May be approximate.
    fn estimate_chunks(&self, text_len: usize) -> usize {
        (text_len / 500).max(1)
    }
}

/// Check a `(chunk_size, overlap)` pair.
pub(crate) fn validate_window(size: usize, overlap: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::InvalidChunkSize(size));
    }
    if overlap >= size {
        return Err(Error::OverlapExceedsSize { size, overlap });
    }
    Ok(())
}

/// Split `text` into boundary-aware chunks of at most `chunk_size` chars,
/// consecutive chunks sharing exactly `overlap` chars.
///
/// Text shorter than `chunk_size` yields one chunk; empty text yields none.
///
/// # Errors
///
/// [`Error::InvalidChunkSize`] if `chunk_size == 0`,
/// [`Error::OverlapExceedsSize`] if `overlap >= chunk_size`.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    let chunker = RecursiveChunker::try_prose(chunk_size, overlap)?;
    Ok(chunker.chunk(text).into_iter().map(|s| s.text).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_validates_parameters() {
        assert!(matches!(split("abc", 0, 0), Err(Error::InvalidChunkSize(0))));
        assert!(matches!(
            split("abc", 3, 3),
            Err(Error::OverlapExceedsSize { size: 3, overlap: 3 })
        ));
    }

    #[test]
    fn split_short_and_empty() {
        assert_eq!(split("short", 100, 10).unwrap(), vec!["short"]);
        assert!(split("", 100, 10).unwrap().is_empty());
    }
}
