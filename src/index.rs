//! Flat nearest-neighbor index over embedded chunks.
//!
//! ## Layout
//!
//! Two parallel stores joined by position:
//!
//! ```text
//! vectors  (row-major f32, one row per entry):  [v0 | v1 | v2 | ...]
//! records  (chunk metadata):                    [c0 , c1 , c2 , ...]
//! ```
//!
//! Entry `i` is row `i` of `vectors` plus `records[i]`. Both grow together in
//! [`VectorIndex::add`], which validates a whole batch before touching either
//! store, so they never drift apart.
//!
//! ## Search
//!
//! Exhaustive scan under Euclidean (L2) distance. For the corpora this crate
//! targets (a few thousand notes or pages) a flat scan is fast and exact.
//! Results are sorted by ascending distance; equal distances keep insertion
//! order.
//!
//! ## On Disk
//!
//! A persisted index is a directory holding a pair of artifacts:
//!
//! ```text
//! index.bin       bincode: dimension + row-major vectors + CRC32 of metadata.json
//! metadata.json   [{ "text": ..., "source": ..., "chunk_id": ... }, ...]
//! ```
//!
//! The pair is only valid together. Loading fails if either file is missing,
//! if `metadata.json` is not the file `index.bin` was written with, or if
//! their entry counts disagree.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Chunk, EmbeddedChunk, Error, Result};

/// File name of the vector artifact inside an index directory.
pub const INDEX_FILE: &str = "index.bin";

/// File name of the metadata artifact inside an index directory.
pub const METADATA_FILE: &str = "metadata.json";

/// One search result: a stored chunk and its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// The matching chunk.
    pub chunk: Chunk,
    /// Euclidean distance to the query (lower = closer).
    pub distance: f32,
}

/// Ordered search results, best match first.
pub type RetrievalResult = Vec<Hit>;

#[derive(Serialize, Deserialize)]
struct VectorArtifact {
    dimension: Option<usize>,
    vectors: Vec<f32>,
    metadata_crc: u32,
}

fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Append-only flat L2 index.
///
/// ## Example
///
/// ```rust
/// use quarry::{Chunk, EmbeddedChunk, VectorIndex};
///
/// let chunk = |text: &str| Chunk {
///     text: text.into(),
///     source: "notes".into(),
///     sequence_index: 0,
/// };
///
/// let mut index = VectorIndex::new();
/// index.add(vec![
///     EmbeddedChunk::new(chunk("north"), vec![0.0, 1.0]),
///     EmbeddedChunk::new(chunk("east"), vec![1.0, 0.0]),
/// ])?;
///
/// let hits = index.search(&[0.9, 0.1], 1)?;
/// assert_eq!(hits[0].chunk.text, "east");
/// # Ok::<(), quarry::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimension: Option<usize>,
    vectors: Vec<f32>,
    records: Vec<Chunk>,
}

impl VectorIndex {
    /// Create an empty index. The first insertion fixes the dimension.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Vector dimension, once established.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Stored chunk metadata, in insertion order.
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.records
    }

    /// Append entries.
    ///
    /// The batch is validated as a whole first; on error nothing is added.
    ///
    /// # Errors
    ///
    /// [`Error::DimensionMismatch`] if any vector disagrees with the index
    /// dimension (or with the first vector of the batch, for an empty index),
    /// [`Error::Configuration`] for zero-length vectors.
    pub fn add(&mut self, entries: Vec<EmbeddedChunk>) -> Result<()> {
        let mut dimension = self.dimension;
        for entry in &entries {
            let actual = entry.vector.len();
            match dimension {
                None if actual == 0 => {
                    return Err(Error::Configuration(
                        "embedding vectors must not be empty".to_string(),
                    ));
                }
                None => dimension = Some(actual),
                Some(expected) if expected != actual => {
                    return Err(Error::DimensionMismatch { expected, actual });
                }
                Some(_) => {}
            }
        }

        let added = entries.len();
        self.dimension = dimension;
        self.vectors.reserve(added * dimension.unwrap_or(0));
        self.records.reserve(added);
        for entry in entries {
            self.vectors.extend_from_slice(&entry.vector);
            self.records.push(entry.chunk);
        }

        tracing::debug!(added, total = self.len(), "vector index grew");
        Ok(())
    }

    /// The `k` nearest entries to `query`, closest first.
    ///
    /// Returns `min(k, len)` hits. Ties keep insertion order.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyIndex`] if nothing has been added,
    /// [`Error::DimensionMismatch`] if `query` has the wrong dimension.
    pub fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        let dimension = match self.dimension {
            Some(dimension) if !self.is_empty() => dimension,
            _ => return Err(Error::EmptyIndex),
        };
        if query.len() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(dimension)
            .map(|row| euclidean(query, row))
            .enumerate()
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k.min(self.len()));

        Ok(scored
            .into_iter()
            .map(|(position, distance)| Hit {
                chunk: self.records[position].clone(),
                distance,
            })
            .collect())
    }

    /// Write the index pair into `dir`, creating it if needed.
    ///
    /// Each artifact is written under a temporary name and then renamed, so
    /// neither file is ever half-written. The two renames are not atomic as a
    /// pair; `index.bin` records a checksum of the metadata it was written
    /// with, so [`VectorIndex::load`] rejects a new file next to a stale one.
    ///
    /// # Errors
    ///
    /// I/O and encoding failures.
    pub fn persist(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let index_tmp = dir.join(format!("{INDEX_FILE}.tmp"));
        let metadata_tmp = dir.join(format!("{METADATA_FILE}.tmp"));

        let metadata = serde_json::to_vec_pretty(&self.records)?;
        let artifact = VectorArtifact {
            dimension: self.dimension,
            vectors: self.vectors.clone(),
            metadata_crc: checksum(&metadata),
        };

        let mut writer = BufWriter::new(File::create(&index_tmp)?);
        bincode::serialize_into(&mut writer, &artifact)?;
        writer.flush()?;

        fs::write(&metadata_tmp, &metadata)?;

        fs::rename(&index_tmp, dir.join(INDEX_FILE))?;
        fs::rename(&metadata_tmp, dir.join(METADATA_FILE))?;

        tracing::info!(entries = self.len(), dir = %dir.display(), "persisted vector index");
        Ok(())
    }

    /// Read an index pair written by [`VectorIndex::persist`].
    ///
    /// # Errors
    ///
    /// [`Error::MissingArtifact`] if either file is absent,
    /// [`Error::CorruptIndex`] if the two do not belong together, plus I/O
    /// and decoding failures.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let index_path = existing(dir.join(INDEX_FILE))?;
        let metadata_path = existing(dir.join(METADATA_FILE))?;

        let artifact: VectorArtifact =
            bincode::deserialize_from(BufReader::new(File::open(&index_path)?))?;
        let metadata = fs::read(&metadata_path)?;
        if checksum(&metadata) != artifact.metadata_crc {
            return Err(Error::CorruptIndex(format!(
                "{} was not written with {}",
                metadata_path.display(),
                index_path.display()
            )));
        }
        let records: Vec<Chunk> = serde_json::from_slice(&metadata)?;

        let rows = match artifact.dimension {
            Some(0) => {
                return Err(Error::CorruptIndex("zero vector dimension".to_string()));
            }
            Some(dimension) if artifact.vectors.len() % dimension == 0 => {
                artifact.vectors.len() / dimension
            }
            Some(dimension) => {
                return Err(Error::CorruptIndex(format!(
                    "{} floats do not form rows of dimension {dimension}",
                    artifact.vectors.len()
                )));
            }
            None if artifact.vectors.is_empty() => 0,
            None => {
                return Err(Error::CorruptIndex(
                    "vectors stored without a dimension".to_string(),
                ));
            }
        };
        if rows != records.len() {
            return Err(Error::CorruptIndex(format!(
                "{rows} vectors but {} metadata records",
                records.len()
            )));
        }

        tracing::info!(entries = rows, dir = %dir.display(), "loaded vector index");
        Ok(Self {
            dimension: artifact.dimension,
            vectors: artifact.vectors,
            records,
        })
    }
}

fn existing(path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::MissingArtifact(path))
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk::new(
            Chunk {
                text: text.to_string(),
                source: "test".to_string(),
                sequence_index: 0,
            },
            vector,
        )
    }

    #[test]
    fn test_search_orders_by_distance() {
        let mut index = VectorIndex::new();
        index
            .add(vec![
                entry("far", vec![10.0, 0.0]),
                entry("near", vec![1.0, 0.0]),
                entry("mid", vec![3.0, 0.0]),
            ])
            .unwrap();

        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        assert_eq!(texts, ["near", "mid", "far"]);
        assert!((hits[1].distance - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = VectorIndex::new();
        index
            .add(vec![
                entry("first", vec![1.0, 0.0]),
                entry("second", vec![0.0, 1.0]),
                entry("third", vec![-1.0, 0.0]),
            ])
            .unwrap();

        let hits = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].chunk.text, "first");
        assert_eq!(hits[1].chunk.text, "second");
    }

    #[test]
    fn test_k_capped_at_len() {
        let mut index = VectorIndex::new();
        index.add(vec![entry("only", vec![1.0])]).unwrap();
        assert_eq!(index.search(&[0.0], 10).unwrap().len(), 1);
        assert!(index.search(&[0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_index_errors() {
        let index = VectorIndex::new();
        assert!(matches!(index.search(&[1.0], 3), Err(Error::EmptyIndex)));
    }

    #[test]
    fn test_dimension_mismatch_rejects_whole_batch() {
        let mut index = VectorIndex::new();
        index.add(vec![entry("a", vec![1.0, 2.0])]).unwrap();

        let result = index.add(vec![entry("b", vec![1.0, 2.0]), entry("c", vec![1.0])]);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_query_dimension_checked() {
        let mut index = VectorIndex::new();
        index.add(vec![entry("a", vec![1.0, 2.0])]).unwrap();
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_length_vector_rejected() {
        let mut index = VectorIndex::new();
        assert!(matches!(
            index.add(vec![entry("a", vec![])]),
            Err(Error::Configuration(_))
        ));
        assert!(index.dimension().is_none());
    }

    #[test]
    fn test_persist_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = VectorIndex::new();
        index
            .add(vec![
                entry("a", vec![0.1, 0.2, 0.3]),
                entry("b", vec![0.3, 0.2, 0.1]),
            ])
            .unwrap();
        index.persist(dir.path()).unwrap();

        let loaded = VectorIndex::load(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimension(), Some(3));
        assert_eq!(
            loaded.search(&[0.3, 0.2, 0.1], 2).unwrap(),
            index.search(&[0.3, 0.2, 0.1], 2).unwrap()
        );
    }

    #[test]
    fn test_load_requires_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = VectorIndex::new();
        index.add(vec![entry("a", vec![1.0])]).unwrap();
        index.persist(dir.path()).unwrap();
        fs::remove_file(dir.path().join(METADATA_FILE)).unwrap();

        assert!(matches!(
            VectorIndex::load(dir.path()),
            Err(Error::MissingArtifact(_))
        ));
    }

    #[test]
    fn test_load_rejects_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = VectorIndex::new();
        index
            .add(vec![entry("a", vec![1.0]), entry("b", vec![2.0])])
            .unwrap();
        index.persist(dir.path()).unwrap();

        let truncated = serde_json::to_string(&index.chunks()[..1]).unwrap();
        fs::write(dir.path().join(METADATA_FILE), truncated).unwrap();

        assert!(matches!(
            VectorIndex::load(dir.path()),
            Err(Error::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_load_rejects_metadata_from_another_write() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        let mut old = VectorIndex::new();
        old.add(vec![entry("old note", vec![1.0, 0.0])]).unwrap();
        old.persist(first.path()).unwrap();

        let mut new = VectorIndex::new();
        new.add(vec![entry("new note", vec![0.0, 1.0])]).unwrap();
        new.persist(second.path()).unwrap();

        // Same entry count, so only the checksum tells them apart.
        fs::copy(
            second.path().join(INDEX_FILE),
            first.path().join(INDEX_FILE),
        )
        .unwrap();

        assert!(matches!(
            VectorIndex::load(first.path()),
            Err(Error::CorruptIndex(_))
        ));
        assert_eq!(VectorIndex::load(second.path()).unwrap().len(), 1);
    }
}
