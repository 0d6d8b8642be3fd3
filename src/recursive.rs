//! Boundary-aware splitting with a separator hierarchy (LangChain-style).
//!
//! Prefers natural boundaries, coarsest first, and only hard-splits when no
//! boundary fits inside the window.
//!
//! ## The Algorithm
//!
//! Given boundaries `[paragraph, line, sentence, word]`, size `100` and
//! overlap `20`:
//!
//! ```text
//! 1. The window is chars [start, start + 100).
//! 2. Look for the last paragraph break ("\n\n") in the back half of it.
//! 3. None? Look for the last line break, then the last sentence end
//!    (UAX #29), then the last word boundary (UAX #29).
//! 4. Still nothing: hard split at start + 100.
//! 5. The next window starts 20 chars before the cut.
//! ```
//!
//! Searching only the back half keeps chunks at least half full; a boundary
//! right after the start would otherwise produce a stream of slivers.
//!
//! ## Why Exact Overlap?
//!
//! LangChain carries whole pieces from one chunk to the next, so the overlap
//! is "up to" the configured amount. Here the next chunk always begins exactly
//! `overlap` chars before the previous cut. The chunk end lands on a natural
//! boundary; the chunk start lands wherever the overlap puts it.
//!
//! ```text
//! "Paragraph one is here.\n\nParagraph two follows it."
//!                         ^ cut
//!  Chunk 0: "Paragraph one is here.\n\n"
//!  Chunk 1:              "here.\n\nParagraph two follows it."   (overlap 7)
//! ```

use unicode_segmentation::UnicodeSegmentation;

use crate::segment::char_offsets;
use crate::{Chunker, Result, Segment};

/// A kind of natural boundary a chunk may end on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Boundary {
    /// Right after a literal separator such as `"\n\n"`.
    Separator(String),
    /// The end of a sentence, per Unicode sentence segmentation.
    Sentence,
    /// The end of a word or of a run of whitespace/punctuation.
    Word,
}

impl Boundary {
    /// Shorthand for [`Boundary::Separator`].
    pub fn separator(sep: impl Into<String>) -> Self {
        Boundary::Separator(sep.into())
    }
}

/// Recursive boundary-aware splitter.
///
/// ## Example
///
/// ```rust
/// use quarry::{Chunker, RecursiveChunker};
///
/// let chunker = RecursiveChunker::prose(40, 5);
/// let text = "Paragraph one is short.\n\nParagraph two is a little longer.";
/// let segments = chunker.chunk(text);
///
/// assert_eq!(segments[0].text, "Paragraph one is short.\n\n");
/// assert!(segments.iter().all(|s| s.char_len() <= 40));
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    size: usize,
    overlap: usize,
    boundaries: Vec<Boundary>,
}

impl RecursiveChunker {
    /// Create a new recursive chunker.
    ///
    /// # Arguments
    ///
    /// * `size` - Maximum chunk size in chars
    /// * `overlap` - Chars shared by adjacent chunks
    /// * `boundaries` - Boundary hierarchy, coarsest first
    ///
    /// # Panics
    ///
    /// Panics if `size == 0`, `overlap >= size` or `boundaries` is empty.
    #[must_use]
    pub fn new(size: usize, overlap: usize, boundaries: Vec<Boundary>) -> Self {
        assert!(size > 0, "chunk size must be > 0");
        assert!(overlap < size, "overlap must be < size");
        assert!(!boundaries.is_empty(), "boundaries must not be empty");

        Self {
            size,
            overlap,
            boundaries,
        }
    }

    /// Create a chunker with the prose hierarchy: paragraph, line, sentence, word.
    #[must_use]
    pub fn prose(size: usize, overlap: usize) -> Self {
        Self::new(size, overlap, Self::prose_boundaries())
    }

    /// Like [`RecursiveChunker::prose`], rejecting invalid parameters.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidChunkSize`](crate::Error::InvalidChunkSize) or
    /// [`Error::OverlapExceedsSize`](crate::Error::OverlapExceedsSize).
    pub fn try_prose(size: usize, overlap: usize) -> Result<Self> {
        crate::validate_window(size, overlap)?;
        Ok(Self::prose(size, overlap))
    }

    fn prose_boundaries() -> Vec<Boundary> {
        vec![
            Boundary::separator("\n\n"),
            Boundary::separator("\n"),
            Boundary::Sentence,
            Boundary::Word,
        ]
    }

    /// Pick the char index at which the window `[start, limit)` should end.
    fn find_cut(&self, text: &str, offsets: &[usize], start: usize, limit: usize) -> usize {
        // Never cut inside the overlap, and keep chunks at least half full.
        let floor = start + (self.overlap + 1).max(self.size / 2);
        if floor > limit {
            return limit;
        }

        let (from, low, high) = (offsets[start], offsets[floor], offsets[limit]);

        for boundary in &self.boundaries {
            let cut = match boundary {
                Boundary::Separator(sep) if !sep.is_empty() => text[from..high]
                    .rfind(sep.as_str())
                    .map(|pos| from + pos + sep.len()),
                Boundary::Separator(_) => None,
                Boundary::Sentence | Boundary::Word => {
                    // One char of lookahead so a boundary at the window edge is visible.
                    let lookahead = offsets[(limit + 1).min(offsets.len() - 1)];
                    last_unicode_bound(&text[from..lookahead], boundary, high - from)
                        .map(|pos| from + pos)
                }
            };

            if let Some(cut) = cut.filter(|&cut| cut >= low && cut <= high) {
                if let Ok(index) = offsets.binary_search(&cut) {
                    return index;
                }
            }
        }

        limit
    }
}

/// Last sentence/word boundary in `window` at or before byte `max`.
fn last_unicode_bound(window: &str, boundary: &Boundary, max: usize) -> Option<usize> {
    let ends: Box<dyn Iterator<Item = usize>> = match boundary {
        Boundary::Sentence => Box::new(
            window
                .split_sentence_bound_indices()
                .map(|(i, piece)| i + piece.len()),
        ),
        _ => Box::new(
            window
                .split_word_bound_indices()
                .map(|(i, piece)| i + piece.len()),
        ),
    };

    ends.take_while(|&end| end <= max).last()
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<Segment> {
        if text.is_empty() {
            return vec![];
        }

        let offsets = char_offsets(text);
        let total = offsets.len() - 1;
        let mut segments = Vec::with_capacity(self.estimate_chunks(total));
        let mut start = 0;

        loop {
            let limit = start + self.size;
            let end = if limit >= total {
                total
            } else {
                self.find_cut(text, &offsets, start, limit)
            };

            let (from, to) = (offsets[start], offsets[end]);
            segments.push(Segment::new(&text[from..to], from, to, segments.len()));

            if end == total {
                break;
            }
            start = end - self.overlap;
        }

        segments
    }

    fn estimate_chunks(&self, text_len: usize) -> usize {
        if text_len == 0 {
            return 0;
        }
        // Chunks are at least half full, so this over-allocates a little.
        (text_len / (self.size - self.overlap).max(1)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_split() {
        let chunker = RecursiveChunker::prose(50, 0);
        let text = "First paragraph has some words.\n\nSecond paragraph also has words.";
        let segments = chunker.chunk(text);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "First paragraph has some words.\n\n");
        assert_eq!(segments[1].text, "Second paragraph also has words.");
    }

    #[test]
    fn test_exact_overlap() {
        let chunker = RecursiveChunker::prose(30, 6);
        let text = "The quick brown fox jumps over the lazy dog. Pack my box with five dozen jugs.";
        let segments = chunker.chunk(text);

        assert!(segments.len() > 1);
        for pair in segments.windows(2) {
            let shared = &text[pair[1].start..pair[0].end];
            assert_eq!(shared.chars().count(), 6);
        }
    }

    #[test]
    fn test_respects_max_size() {
        let chunker = RecursiveChunker::prose(20, 4);
        let text = "The quick brown fox jumps over the lazy dog.";
        for segment in chunker.chunk(text) {
            assert!(segment.char_len() <= 20, "too large: {segment}");
        }
    }

    #[test]
    fn test_prefers_word_boundary_over_hard_split() {
        let chunker = RecursiveChunker::prose(12, 0);
        let segments = chunker.chunk("alpha beta gamma delta");

        assert_eq!(segments[0].text, "alpha beta ");
    }

    #[test]
    fn test_hard_split_without_boundaries() {
        let chunker = RecursiveChunker::new(4, 0, vec![Boundary::separator("\n\n")]);
        let segments = chunker.chunk("abcdefghij");

        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, ["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_empty_text() {
        let chunker = RecursiveChunker::prose(100, 10);
        assert!(chunker.chunk("").is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunker = RecursiveChunker::prose(100, 10);
        let segments = chunker.chunk("Small text.");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "Small text.");
    }

    #[test]
    fn test_try_prose_validates() {
        assert!(RecursiveChunker::try_prose(0, 0).is_err());
        assert!(RecursiveChunker::try_prose(10, 12).is_err());
        assert!(RecursiveChunker::try_prose(10, 9).is_ok());
    }

    #[test]
    #[should_panic]
    fn test_zero_size_panics() {
        let _ = RecursiveChunker::prose(0, 0);
    }

    #[test]
    #[should_panic]
    fn test_empty_boundaries_panics() {
        let _ = RecursiveChunker::new(100, 0, vec![]);
    }
}
