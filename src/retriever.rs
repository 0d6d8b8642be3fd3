//! Chunk, embed and index documents; fetch the passages closest to a query.

use std::sync::Arc;

use crate::index::RetrievalResult;
use crate::{
    Chunker, Document, EmbeddedChunk, Embedder, Error, Phase, ProviderError, Result, VectorIndex,
};

/// Default number of chunks sent to the embedder per call.
pub const DEFAULT_EMBED_BATCH: usize = 64;

/// Orchestrates a [`Chunker`], an [`Embedder`] and a [`VectorIndex`].
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    chunker: Box<dyn Chunker>,
    index: VectorIndex,
    batch_size: usize,
}

impl Retriever {
    /// Create a retriever over an empty index.
    pub fn new(embedder: Arc<dyn Embedder>, chunker: impl Chunker + 'static) -> Self {
        Self {
            embedder,
            chunker: Box::new(chunker),
            index: VectorIndex::new(),
            batch_size: DEFAULT_EMBED_BATCH,
        }
    }

    /// Use an existing (for example, freshly loaded) index.
    #[must_use]
    pub fn with_index(mut self, index: VectorIndex) -> Self {
        self.index = index;
        self
    }

    /// Set how many chunks go to the embedder per call.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// The underlying index.
    #[must_use]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Give up the retriever, keeping its index.
    #[must_use]
    pub fn into_index(self) -> VectorIndex {
        self.index
    }

    /// Chunk, embed and index `documents`. Returns the number of chunks added.
    ///
    /// Documents are processed in order; batches already added stay in the
    /// index if a later one fails.
    ///
    /// # Errors
    ///
    /// [`Error::Provider`] with [`Phase::IndexBuild`] naming the document and
    /// the first chunk of the failed batch; [`Error::DimensionMismatch`] if
    /// the embedder changes dimension.
    pub async fn index_documents(&mut self, documents: &[Document]) -> Result<usize> {
        let mut added = 0;

        for document in documents {
            let chunks = document.chunks(self.chunker.as_ref());
            if chunks.is_empty() {
                tracing::warn!(source = %document.source, "document produced no chunks");
                continue;
            }

            for batch in chunks.chunks(self.batch_size) {
                let phase = Phase::IndexBuild {
                    source: document.source.clone(),
                    chunk: batch[0].sequence_index,
                };
                let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
                let vectors = self
                    .embedder
                    .embed_batch(&texts)
                    .await
                    .map_err(|e| Error::provider(phase.clone(), e))?;
                if vectors.len() != batch.len() {
                    return Err(Error::provider(
                        phase,
                        ProviderError::Embedder(format!(
                            "{} vectors for {} inputs",
                            vectors.len(),
                            batch.len()
                        )),
                    ));
                }

                self.index.add(
                    batch
                        .iter()
                        .cloned()
                        .zip(vectors)
                        .map(|(chunk, vector)| EmbeddedChunk::new(chunk, vector))
                        .collect(),
                )?;
                added += batch.len();
            }

            tracing::debug!(source = %document.source, chunks = chunks.len(), "indexed document");
        }

        tracing::info!(documents = documents.len(), chunks = added, "index build finished");
        Ok(added)
    }

    /// The `k` chunks closest to `query`, best first.
    ///
    /// An empty index or `k == 0` yields an empty result rather than an
    /// error: "no relevant context" is for the caller to handle.
    ///
    /// # Errors
    ///
    /// [`Error::Provider`] with [`Phase::Query`] if embedding the query fails,
    /// [`Error::DimensionMismatch`] if the embedder disagrees with the index.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 || self.index.is_empty() {
            tracing::debug!(k, entries = self.index.len(), "nothing to retrieve");
            return Ok(Vec::new());
        }

        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| Error::provider(Phase::Query, e))?;
        let hits = self.index.search(&vector, k)?;

        tracing::debug!(k, hits = hits.len(), "retrieved context");
        Ok(hits)
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("entries", &self.index.len())
            .field("dimension", &self.index.dimension())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedChunker;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds text as (length, vowel count), counting calls.
    #[derive(Default)]
    struct Shape {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for Shape {
        async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count();
            Ok(vec![text.len() as f32, vowels as f32])
        }
    }

    struct Broken;

    #[async_trait]
    impl Embedder for Broken {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
            Err(ProviderError::Embedder("offline".into()))
        }
    }

    #[tokio::test]
    async fn indexes_all_chunks() {
        let mut retriever = Retriever::new(Arc::new(Shape::default()), FixedChunker::new(5, 0))
            .with_batch_size(2);
        let docs = [
            Document::from_source("a", "aaaaabbbbbccccc"),
            Document::from_source("b", "xyz"),
        ];

        let added = retriever.index_documents(&docs).await.unwrap();
        assert_eq!(added, 4);
        assert_eq!(retriever.index().len(), 4);
    }

    #[tokio::test]
    async fn empty_index_skips_embedding() {
        let embedder = Arc::new(Shape::default());
        let retriever = Retriever::new(embedder.clone(), FixedChunker::new(5, 0));

        let hits = retriever.retrieve("anything", 3).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_k_is_empty() {
        let mut retriever = Retriever::new(Arc::new(Shape::default()), FixedChunker::new(5, 0));
        retriever
            .index_documents(&[Document::from_source("a", "hello")])
            .await
            .unwrap();
        assert!(retriever.retrieve("hello", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embed_failure_names_document() {
        let mut retriever = Retriever::new(Arc::new(Broken), FixedChunker::new(5, 0));
        let err = retriever
            .index_documents(&[Document::from_source("notes/a.html", "hello")])
            .await
            .unwrap_err();

        assert_eq!(
            err.phase(),
            Some(&Phase::IndexBuild {
                source: "notes/a.html".into(),
                chunk: 0
            })
        );
    }
}
