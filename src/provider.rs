//! Capability interfaces for the external embedding and chat providers.
//!
//! The pipelines only ever see these traits. Everything provider-specific
//! (HTTP payloads, auth, response parsing) lives in an adapter implementing
//! them, such as [`OpenAiClient`](crate::OpenAiClient).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ProviderError;

/// Maps text to a fixed-dimension vector.
///
/// Every call on one instance must return vectors of the same dimension.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embed several texts, in order.
    ///
    /// The default implementation embeds them one at a time; adapters with a
    /// batch endpoint should override it.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Generates a completion for a chat-style prompt.
#[async_trait]
pub trait Answerer: Send + Sync {
    /// Complete `prompt` and return the generated text.
    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError>;
}

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions.
    System,
    /// The person asking.
    User,
    /// The model.
    Assistant,
}

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who is speaking.
    pub role: Role,
    /// What they say.
    pub content: String,
}

impl Message {
    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A system instruction plus conversation turns, with sampling knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// System instruction.
    pub system: String,
    /// Conversation turns after the system instruction.
    pub messages: Vec<Message>,
    /// Sampling temperature; provider default when `None`.
    pub temperature: Option<f32>,
    /// Completion length cap; provider default when `None`.
    pub max_tokens: Option<u32>,
}

impl Prompt {
    /// A prompt with one system instruction and one user turn.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: vec![Message::user(user)],
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the completion length cap.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Content of the last user turn, if any.
    #[must_use]
    pub fn last_user(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant;

    #[async_trait]
    impl Embedder for Constant {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![text.len() as f32])
        }
    }

    #[tokio::test]
    async fn default_batch_embeds_in_order() {
        let texts = vec!["a".to_string(), "abc".to_string()];
        let vectors = Constant.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![3.0]]);
    }

    #[test]
    fn prompt_builder_sets_knobs() {
        let prompt = Prompt::new("sys", "hi").with_temperature(0.2).with_max_tokens(50);
        assert_eq!(prompt.last_user(), Some("hi"));
        assert_eq!(prompt.temperature, Some(0.2));
        assert_eq!(prompt.max_tokens, Some(50));
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }
}
