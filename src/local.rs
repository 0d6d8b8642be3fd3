//! Local embeddings with `fastembed` (requires the `fastembed` feature).
//!
//! Inference is CPU-bound and synchronous, so every call runs on tokio's
//! blocking pool. Must be used from within a tokio runtime.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{Embedder, Error, ProviderError, Result};

/// [`Embedder`] backed by an in-process ONNX model.
///
/// ## Example
///
/// ```rust,ignore
/// use quarry::{FastEmbedder, Retriever, RecursiveChunker};
///
/// // fastembed's default model (BGE-small-en, 384 dimensions)
/// let embedder = Arc::new(FastEmbedder::new()?);
/// let retriever = Retriever::new(embedder, RecursiveChunker::prose(1000, 200));
/// ```
#[derive(Clone)]
pub struct FastEmbedder {
    model: Arc<fastembed::TextEmbedding>,
}

impl FastEmbedder {
    /// Load fastembed's default model.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the model fails to load.
    pub fn new() -> Result<Self> {
        let model = fastembed::TextEmbedding::try_new(Default::default())
            .map_err(|e| Error::Configuration(format!("embedding model failed to load: {e}")))?;
        Ok(Self::from_model(model))
    }

    /// Wrap an already initialized model.
    pub fn from_model(model: fastembed::TextEmbedding) -> Self {
        Self {
            model: Arc::new(model),
        }
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ProviderError::Embedder("no embedding returned".to_string()))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await
            .map_err(|e| ProviderError::Embedder(format!("embedding task failed: {e}")))?
            .map_err(|e| ProviderError::Embedder(e.to_string()))
    }
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder").finish_non_exhaustive()
    }
}
