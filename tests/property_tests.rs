//! Property-based tests for chunking and the vector index.
//!
//! Chunkers must keep these invariants for any text:
//! - Size: no chunk is longer than `chunk_size` chars
//! - Overlap: consecutive chunks share exactly `overlap` chars
//! - Non-empty: no chunk is empty; empty text yields no chunks
//! - Coverage: the first chunk starts at 0, the last ends at the text end
//! - Determinism: the same input always yields the same chunks
//!
//! The index must return `min(k, len)` hits in non-decreasing distance order,
//! and survive a persist/load round trip unchanged.

use proptest::prelude::*;
use quarry::{Chunk, Chunker, EmbeddedChunk, FixedChunker, RecursiveChunker, Segment, VectorIndex};

// =============================================================================
// Test Generators
// =============================================================================

/// Arbitrary single-line text, including multi-byte chars.
fn arbitrary_text() -> impl Strategy<Value = String> {
    prop::string::string_regex(".{0,400}").unwrap()
}

/// Prose with sentences, line breaks and paragraph breaks.
fn prose_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        (prop::string::string_regex("[A-Za-z]{1,12}").unwrap(), 0u8..10),
        1..120,
    )
    .prop_map(|words| {
        let mut result = String::new();
        for (word, punctuation) in words {
            result.push_str(&word);
            result.push_str(match punctuation {
                0 => ". ",
                1 => ".\n",
                2 => ".\n\n",
                3 => ", ",
                _ => " ",
            });
        }
        result
    })
}

/// A valid `(size, overlap)` pair.
fn window() -> impl Strategy<Value = (usize, usize)> {
    (1usize..120).prop_flat_map(|size| (Just(size), 0..size))
}

// =============================================================================
// Invariant Helpers
// =============================================================================

fn check_invariants(segments: &[Segment], text: &str, size: usize, overlap: usize) {
    if text.is_empty() {
        assert!(segments.is_empty());
        return;
    }

    assert_eq!(segments[0].start, 0);
    assert_eq!(segments.last().map(|s| s.end), Some(text.len()));

    for (i, segment) in segments.iter().enumerate() {
        assert!(!segment.is_empty(), "chunk {i} is empty");
        assert!(
            segment.char_len() <= size,
            "chunk {i} has {} chars > {size}",
            segment.char_len()
        );
        assert_eq!(&text[segment.span()], segment.text);
        assert_eq!(segment.index, i);
    }

    for pair in segments.windows(2) {
        assert!(pair[1].start < pair[0].end || overlap == 0);
        let shared = text[pair[1].start..pair[0].end].chars().count();
        assert_eq!(shared, overlap, "overlap between {} and {}", pair[0].index, pair[1].index);
    }

    if text.chars().count() <= size {
        assert_eq!(segments.len(), 1);
    }
}

// =============================================================================
// Chunkers
// =============================================================================

proptest! {
    #[test]
    fn fixed_invariants(text in arbitrary_text(), (size, overlap) in window()) {
        let segments = FixedChunker::new(size, overlap).chunk(&text);
        check_invariants(&segments, &text, size, overlap);
    }

    #[test]
    fn recursive_invariants_on_arbitrary_text(text in arbitrary_text(), (size, overlap) in window()) {
        let segments = RecursiveChunker::prose(size, overlap).chunk(&text);
        check_invariants(&segments, &text, size, overlap);
    }

    #[test]
    fn recursive_invariants_on_prose(text in prose_text(), (size, overlap) in window()) {
        let segments = RecursiveChunker::prose(size, overlap).chunk(&text);
        check_invariants(&segments, &text, size, overlap);
    }

    #[test]
    fn split_is_deterministic(text in prose_text(), (size, overlap) in window()) {
        let first = quarry::split(&text, size, overlap).unwrap();
        let second = quarry::split(&text, size, overlap).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn split_rejects_overlap_at_or_above_size(size in 1usize..100, extra in 0usize..10) {
        prop_assert!(quarry::split("text", size, size + extra).is_err());
    }
}

// =============================================================================
// Vector index
// =============================================================================

const DIM: usize = 3;

fn vectors() -> impl Strategy<Value = Vec<Vec<f32>>> {
    prop::collection::vec(prop::collection::vec(-100.0f32..100.0, DIM), 1..40)
}

fn query() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-100.0f32..100.0, DIM)
}

fn build(vectors: &[Vec<f32>]) -> VectorIndex {
    let entries = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let chunk = Chunk {
                text: format!("chunk {i}"),
                source: format!("doc-{}", i % 3),
                sequence_index: i,
            };
            EmbeddedChunk::new(chunk, v.clone())
        })
        .collect();

    let mut index = VectorIndex::new();
    index.add(entries).unwrap();
    index
}

proptest! {
    #[test]
    fn search_is_ordered_and_bounded(vs in vectors(), q in query(), k in 0usize..60) {
        let index = build(&vs);
        let hits = index.search(&q, k).unwrap();

        prop_assert_eq!(hits.len(), k.min(vs.len()));
        for pair in hits.windows(2) {
            prop_assert!(pair[0].distance <= pair[1].distance);
            if pair[0].distance == pair[1].distance {
                prop_assert!(pair[0].chunk.sequence_index < pair[1].chunk.sequence_index);
            }
        }
    }

    #[test]
    fn persist_round_trip_preserves_search(vs in vectors(), q in query(), k in 1usize..20) {
        let index = build(&vs);
        let dir = tempfile::tempdir().unwrap();
        index.persist(dir.path()).unwrap();
        let loaded = VectorIndex::load(dir.path()).unwrap();

        let before = index.search(&q, k).unwrap();
        let after = loaded.search(&q, k).unwrap();
        prop_assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(&after) {
            prop_assert_eq!(&a.chunk, &b.chunk);
            prop_assert!((a.distance - b.distance).abs() < 1e-4);
        }
    }
}

// =============================================================================
// Edge Cases
// =============================================================================

#[test]
fn short_text_is_one_chunk() {
    let text = "hello";
    assert_eq!(FixedChunker::new(50, 10).chunk(text).len(), 1);
    assert_eq!(RecursiveChunker::prose(50, 10).chunk(text).len(), 1);
    assert_eq!(quarry::split(text, 5, 4).unwrap(), vec!["hello"]);
}

#[test]
fn very_long_word_hard_splits() {
    let text = "a".repeat(1000);
    let segments = RecursiveChunker::prose(100, 10).chunk(&text);

    check_invariants(&segments, &text, 100, 10);
    assert_eq!(segments[0].char_len(), 100);
}

#[test]
fn unicode_offsets_stay_on_char_boundaries() {
    let text = "Hello 世界! Привет мир! مرحبا بالعالم 🦀🦀🦀";
    for (size, overlap) in [(5, 2), (7, 0), (20, 5)] {
        check_invariants(&FixedChunker::new(size, overlap).chunk(text), text, size, overlap);
        check_invariants(&RecursiveChunker::prose(size, overlap).chunk(text), text, size, overlap);
    }
}

#[test]
fn whitespace_only_text_is_chunked() {
    let text = "   \n\n\t\t  ";
    check_invariants(&RecursiveChunker::prose(4, 1).chunk(text), text, 4, 1);
}
