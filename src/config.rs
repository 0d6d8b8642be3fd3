//! Run configuration, built once and passed into each component.
//!
//! Every key is optional; missing keys take the defaults below.
//!
//! ```toml
//! [retrieval]
//! chunk_size = 1000
//! chunk_overlap = 200
//! top_k = 4
//! embed_batch_size = 64
//!
//! [summarize]
//! chunk_size = 10000
//! max_in_flight = 4
//! summary_temperature = 0.0
//! digest_temperature = 0.2
//! digest_max_tokens = 2000
//!
//! [openai]
//! base_url = "https://api.openai.com/v1"
//! chat_model = "gpt-4o"
//! embedding_model = "text-embedding-3-small"
//! timeout_secs = 60
//! ```
//!
//! The API key is never read from the file, only from `OPENAI_API_KEY`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variable holding the OpenAI API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuarryConfig {
    /// Ask pipeline.
    #[serde(default)]
    pub retrieval: RetrievalSettings,

    /// Digest pipeline.
    #[serde(default)]
    pub summarize: SummarizeSettings,

    /// Hosted provider.
    #[serde(default)]
    pub openai: OpenAiSettings,
}

/// Chunking and retrieval for question answering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Chunk size in chars.
    pub chunk_size: usize,
    /// Chars shared by adjacent chunks.
    pub chunk_overlap: usize,
    /// Chunks fed to the answerer per question.
    pub top_k: usize,
    /// Chunks per embedding request.
    pub embed_batch_size: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: crate::DEFAULT_TOP_K,
            embed_batch_size: crate::DEFAULT_EMBED_BATCH,
        }
    }
}

/// Map-reduce summarization and digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizeSettings {
    /// Non-overlapping window size in chars.
    pub chunk_size: usize,
    /// Concurrent per-chunk calls.
    pub max_in_flight: usize,
    /// Temperature for per-chunk and merge calls.
    pub summary_temperature: f32,
    /// Temperature for the digest call.
    pub digest_temperature: f32,
    /// Completion cap for the digest call.
    pub digest_max_tokens: u32,
}

impl Default for SummarizeSettings {
    fn default() -> Self {
        Self {
            chunk_size: crate::DEFAULT_SUMMARY_CHUNK,
            max_in_flight: crate::DEFAULT_MAX_IN_FLIGHT,
            summary_temperature: 0.0,
            digest_temperature: 0.2,
            digest_max_tokens: 2000,
        }
    }
}

/// OpenAI-compatible endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Model for answers, summaries and digests.
    pub chat_model: String,
    /// Model for embeddings.
    pub embedding_model: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            timeout_secs: 60,
        }
    }
}

impl QuarryConfig {
    /// Parse a TOML document and validate it.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for malformed TOML or invalid values.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| Error::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the file cannot be read, otherwise as
    /// [`QuarryConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Self::from_toml_str(&source)
    }

    /// Reject values no pipeline can run with.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.chunk_size == 0 {
            return Err(invalid("retrieval.chunk_size must be > 0"));
        }
        if r.chunk_overlap >= r.chunk_size {
            return Err(invalid("retrieval.chunk_overlap must be < retrieval.chunk_size"));
        }
        if r.top_k == 0 {
            return Err(invalid("retrieval.top_k must be > 0"));
        }
        if r.embed_batch_size == 0 {
            return Err(invalid("retrieval.embed_batch_size must be > 0"));
        }

        let s = &self.summarize;
        if s.chunk_size == 0 {
            return Err(invalid("summarize.chunk_size must be > 0"));
        }
        if s.max_in_flight == 0 {
            return Err(invalid("summarize.max_in_flight must be > 0"));
        }

        if self.openai.base_url.trim().is_empty() {
            return Err(invalid("openai.base_url must not be empty"));
        }
        Ok(())
    }

    /// The API key from the environment.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the variable is unset or empty.
    pub fn api_key() -> Result<String> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(Error::Configuration(format!("{API_KEY_ENV} is not set"))),
        }
    }
}

fn invalid(message: &str) -> Error {
    Error::Configuration(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_takes_defaults() {
        let config = QuarryConfig::from_toml_str("").unwrap();
        assert_eq!(config, QuarryConfig::default());
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.summarize.chunk_size, 10_000);
        assert_eq!(config.openai.chat_model, "gpt-4o");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = QuarryConfig::from_toml_str(
            "[retrieval]\nchunk_size = 300\nchunk_overlap = 100\n\n[openai]\ntimeout_secs = 5\n",
        )
        .unwrap();

        assert_eq!(config.retrieval.chunk_size, 300);
        assert_eq!(config.retrieval.chunk_overlap, 100);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.openai.timeout_secs, 5);
        assert_eq!(config.openai.embedding_model, "text-embedding-3-small");
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let err = QuarryConfig::from_toml_str("[retrieval]\nchunk_size = 100\nchunk_overlap = 100\n")
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("chunk_overlap")));
    }

    #[test]
    fn zero_in_flight_rejected() {
        let mut config = QuarryConfig::default();
        config.summarize.max_in_flight = 0;
        assert!(config.validate().is_err());
        assert!(!config.validate().unwrap_err().is_retryable());
    }

    #[test]
    fn malformed_toml_is_configuration_error() {
        assert!(matches!(
            QuarryConfig::from_toml_str("[retrieval\n"),
            Err(Error::Configuration(_))
        ));
    }
}
