//! Fixed-size chunking with overlap.
//!
//! The simplest chunking strategy: split every N chars with M chars of overlap.
//!
//! ## How It Works
//!
//! ```text
//! size = 10, overlap = 3
//!
//! Document: "abcdefghijklmnopqrstuvwxyz"
//!
//! Chunk 0: "abcdefghij"   [0..10]
//! Chunk 1: "hijklmnopq"   [7..17]   <- starts at 10 - 3 = 7
//! Chunk 2: "opqrstuvwx"   [14..24]  <- starts at 17 - 3 = 14
//! Chunk 3: "vwxyz"        [21..26]  <- final chunk may be shorter
//! ```
//!
//! The walk stops as soon as a window reaches the end of the text, so the
//! last chunk is never fully contained in the one before it.
//!
//! With `overlap = 0` this is the splitter used for map-reduce summarization:
//! coverage matters there, not robustness at search boundaries.

use crate::segment::char_offsets;
use crate::{Chunker, Error, Result, Segment};

/// Fixed-size chunker with configurable overlap, counted in chars.
///
/// ## Example
///
/// ```rust
/// use quarry::{Chunker, FixedChunker};
///
/// let chunker = FixedChunker::new(100, 20);
/// let text = "A".repeat(250);
/// let segments = chunker.chunk(&text);
///
/// // starts at 0, 80, 160; the third window reaches the end
/// assert_eq!(segments.len(), 3);
/// assert_eq!(segments[0].char_len(), 100);
/// assert_eq!(segments[1].start, 80);
/// ```
#[derive(Debug, Clone)]
pub struct FixedChunker {
    size: usize,
    overlap: usize,
}

impl FixedChunker {
    /// Create a new fixed-size chunker.
    ///
    /// # Panics
    ///
    /// Panics if `size == 0` or `overlap >= size`.
    #[must_use]
    pub fn new(size: usize, overlap: usize) -> Self {
        assert!(size > 0, "chunk size must be > 0");
        assert!(overlap < size, "overlap must be < size");
        Self { size, overlap }
    }

    /// Create a new fixed-size chunker, rejecting invalid parameters.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidChunkSize`] or [`Error::OverlapExceedsSize`].
    pub fn try_new(size: usize, overlap: usize) -> Result<Self> {
        crate::validate_window(size, overlap)?;
        Ok(Self { size, overlap })
    }

    /// Create a chunker with no overlap.
    #[must_use]
    pub fn no_overlap(size: usize) -> Self {
        Self::new(size, 0)
    }

    /// Maximum chunk size in chars.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The step size between chunk starts.
    fn step(&self) -> usize {
        self.size - self.overlap
    }
}

impl Chunker for FixedChunker {
    fn chunk(&self, text: &str) -> Vec<Segment> {
        if text.is_empty() {
            return vec![];
        }

        let offsets = char_offsets(text);
        let total = offsets.len() - 1;
        let mut segments = Vec::with_capacity(self.estimate_chunks(total));
        let mut start = 0;

        loop {
            let end = (start + self.size).min(total);
            let (from, to) = (offsets[start], offsets[end]);
            segments.push(Segment::new(&text[from..to], from, to, segments.len()));

            if end == total {
                break;
            }
            start += self.step();
        }

        segments
    }

    fn estimate_chunks(&self, text_len: usize) -> usize {
        if text_len == 0 {
            return 0;
        }
        if text_len <= self.size {
            return 1;
        }
        1 + (text_len - self.size).div_ceil(self.step())
    }
}

impl TryFrom<(usize, usize)> for FixedChunker {
    type Error = Error;

    fn try_from((size, overlap): (usize, usize)) -> Result<Self> {
        Self::try_new(size, overlap)
    }
}
