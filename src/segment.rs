//! The Segment type: a window of text with position metadata.

/// A window of text with its position in the original document.
///
/// Segments are what chunkers produce. Pipelines attach a source identifier
/// to them to get a [`Chunk`](crate::Chunk).
///
/// ## Byte Offsets
///
/// `start` and `end` are byte offsets into the original text, so they can be
/// used to slice it directly, even though chunk sizes are counted in chars:
///
/// ```rust
/// use quarry::Segment;
///
/// let text = "Revenue grew 12% to $4B in Q1.";
/// let segment = Segment::new("12%", 13, 16, 0);
///
/// assert_eq!(&text[segment.span()], "12%");
/// ```
///
/// ## Overlap
///
/// Adjacent segments may share text. `index` is the position in the sequence:
///
/// ```text
/// Original:   "The quick brown fox"
/// Segment 0:  "The quick b"     [0..11]
/// Segment 1:  "ck brown fox"    [8..19]
///                ^
///            overlap region [8..11]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The window text.
    pub text: String,
    /// Byte offset where this segment starts in the original document.
    pub start: usize,
    /// Byte offset where this segment ends (exclusive) in the original document.
    pub end: usize,
    /// Zero-based index of this segment in the sequence.
    pub index: usize,
}

impl Segment {
    /// Create a new segment.
    #[must_use]
    pub fn new(text: impl Into<String>, start: usize, end: usize, index: usize) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            index,
        }
    }

    /// The length of this segment in chars.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether this segment is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The byte span of this segment in the original document.
    #[must_use]
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Segment {{ index: {}, span: {}..{}, chars: {} }}",
            self.index,
            self.start,
            self.end,
            self.char_len()
        )
    }
}

/// Byte offset of every char in `text`, followed by `text.len()`.
///
/// Entry `i` is where char `i` starts, so `offsets[a]..offsets[b]` slices
/// chars `a..b` without ever splitting a code point.
pub(crate) fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}
