//! Error types for quarry.

use std::fmt;
use std::path::PathBuf;

/// Failures reported by an external capability (embedder or answerer).
///
/// Adapters translate provider-specific failures into one of these; the
/// pipelines wrap them in [`Error::Provider`] together with the [`Phase`]
/// that was running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The embedding provider failed (transport, timeout, malformed response).
    #[error("embedder failed: {0}")]
    Embedder(String),

    /// The chat-completion provider failed (transport, timeout, malformed response).
    #[error("answerer failed: {0}")]
    Answerer(String),

    /// The provider rejected the call because a usage limit was reached.
    #[error("quota exceeded: {0}")]
    Quota(String),
}

/// The unit of work that was running when a provider call failed.
///
/// Carries enough context for a caller to retry just that unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Embedding chunk `chunk` of document `source` while building an index.
    IndexBuild {
        /// Source identifier of the document.
        source: String,
        /// Sequence index of the chunk within its document.
        chunk: usize,
    },
    /// Embedding a retrieval query.
    Query,
    /// Generating the final answer of a question.
    Answer,
    /// Summarizing one chunk of a document.
    SummarizeChunk {
        /// Source identifier of the document.
        source: String,
        /// Sequence index of the chunk within its document.
        chunk: usize,
    },
    /// Merging the partial summaries of a document.
    Merge {
        /// Source identifier of the document.
        source: String,
    },
    /// Building the cross-document digest.
    Digest,
    /// Listing messages under a mail label.
    Fetch {
        /// The label being listed.
        label: String,
    },
    /// Mailing the finished digest.
    Deliver,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::IndexBuild { source, chunk } => {
                write!(f, "index build ({source}, chunk {chunk})")
            }
            Phase::Query => f.write_str("query embedding"),
            Phase::Answer => f.write_str("answer generation"),
            Phase::SummarizeChunk { source, chunk } => {
                write!(f, "summarize ({source}, chunk {chunk})")
            }
            Phase::Merge { source } => write!(f, "merge ({source})"),
            Phase::Digest => f.write_str("digest"),
            Phase::Fetch { label } => write!(f, "mail fetch ({label})"),
            Phase::Deliver => f.write_str("digest delivery"),
        }
    }
}

/// Errors that can occur in quarry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid chunk size (must be > 0).
    #[error("invalid chunk size: {0} (must be > 0)")]
    InvalidChunkSize(usize),

    /// Overlap exceeds chunk size.
    #[error("overlap {overlap} exceeds chunk size {size}")]
    OverlapExceedsSize {
        /// The chunk size.
        size: usize,
        /// The overlap that exceeded the size.
        overlap: usize,
    },

    /// A vector's dimensionality disagrees with the index.
    #[error("dimension mismatch: index holds {expected}-d vectors, got {actual}")]
    DimensionMismatch {
        /// Dimension established by the index.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Search against an index with no entries.
    #[error("index is empty")]
    EmptyIndex,

    /// A caller violated a documented precondition.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// An external capability failed while running `phase`.
    #[error("{phase} failed: {source}")]
    Provider {
        /// The unit of work that failed.
        phase: Phase,
        /// The underlying provider failure.
        source: ProviderError,
    },

    /// One half of a persisted index is missing.
    #[error("missing index artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// The persisted index and its metadata disagree.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// A file could not be turned into text.
    #[error("cannot extract text from {}: {message}", .path.display())]
    Extract {
        /// The offending file.
        path: PathBuf,
        /// What the extractor reported.
        message: String,
    },

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Metadata (de)serialization failure.
    #[error("metadata encoding: {0}")]
    Json(#[from] serde_json::Error),

    /// Vector artifact (de)serialization failure.
    #[error("index encoding: {0}")]
    Encoding(#[from] bincode::Error),
}

impl Error {
    pub(crate) fn provider(phase: Phase, source: ProviderError) -> Self {
        Error::Provider { phase, source }
    }

    /// The failing phase, for provider errors.
    #[must_use]
    pub fn phase(&self) -> Option<&Phase> {
        match self {
            Error::Provider { phase, .. } => Some(phase),
            _ => None,
        }
    }

    /// Whether retrying the failed unit of work could succeed.
    ///
    /// Configuration and precondition errors are never retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Provider { .. })
    }
}

/// Result type for quarry operations.
pub type Result<T> = std::result::Result<T, Error>;
