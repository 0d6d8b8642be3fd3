//! [`Embedder`] and [`Answerer`] over an OpenAI-compatible HTTP API.
//!
//! Talks to `{base_url}/embeddings` and `{base_url}/chat/completions`.
//! Nothing is retried here; HTTP 429 surfaces as [`ProviderError::Quota`] so
//! callers can tell rate limits from hard failures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{
    Answerer, Embedder, Error, OpenAiSettings, Prompt, ProviderError, QuarryConfig, Result, Role,
};

/// Async client for embeddings and chat completions.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    chat_model: String,
    embedding_model: String,
}

impl OpenAiClient {
    /// Build a client with an explicit API key.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for an empty or malformed key, an empty model
    /// name, or an HTTP client that cannot be built.
    pub fn new(api_key: &str, settings: &OpenAiSettings) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Configuration("missing OpenAI API key".to_string()));
        }
        if settings.chat_model.trim().is_empty() || settings.embedding_model.trim().is_empty() {
            return Err(Error::Configuration("missing OpenAI model name".to_string()));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| Error::Configuration("invalid OpenAI API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            chat_model: settings.chat_model.clone(),
            embedding_model: settings.embedding_model.clone(),
        })
    }

    /// Build a client with the key from `OPENAI_API_KEY`.
    ///
    /// # Errors
    ///
    /// As [`OpenAiClient::new`], or if the variable is unset.
    pub fn from_env(settings: &OpenAiSettings) -> Result<Self> {
        Self::new(&QuarryConfig::api_key()?, settings)
    }

    async fn post<B, R>(
        &self,
        path: &str,
        body: &B,
        fail: fn(String) -> ProviderError,
    ) -> std::result::Result<R, ProviderError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let url = format!("{}/{path}", self.base_url);
        tracing::debug!(%url, "provider request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(classify(status, text, fail));
        }

        response
            .json()
            .await
            .map_err(|e| fail(format!("malformed response: {e}")))
    }
}

fn classify(status: StatusCode, body: String, fail: fn(String) -> ProviderError) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::Quota(body)
    } else {
        fail(format!("{status}: {body}"))
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
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

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let mut parsed: EmbeddingResponse = self
            .post("embeddings", &request, ProviderError::Embedder)
            .await?;

        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != texts.len() {
            return Err(ProviderError::Embedder(format!(
                "{} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[async_trait]
impl Answerer for OpenAiClient {
    async fn complete(&self, prompt: &Prompt) -> std::result::Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages: chat_messages(prompt),
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };
        let parsed: ChatResponse = self
            .post("chat/completions", &request, ProviderError::Answerer)
            .await?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Answerer("response had no content".to_string()))
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .finish_non_exhaustive()
    }
}

fn chat_messages(prompt: &Prompt) -> Vec<ChatMessage<'_>> {
    std::iter::once(ChatMessage {
        role: Role::System,
        content: &prompt.system,
    })
    .chain(prompt.messages.iter().map(|m| ChatMessage {
        role: m.role,
        content: &m.content,
    }))
    .collect()
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_turn_comes_first() {
        let prompt = Prompt::new("be terse", "hello").with_temperature(0.0);
        let request = ChatRequest {
            model: "gpt-4o",
            messages: chat_messages(&prompt),
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "be terse");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["temperature"], 0.0);
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn rate_limit_is_quota() {
        let err = classify(StatusCode::TOO_MANY_REQUESTS, "slow down".into(), ProviderError::Answerer);
        assert_eq!(err, ProviderError::Quota("slow down".into()));

        let err = classify(StatusCode::BAD_GATEWAY, "oops".into(), ProviderError::Embedder);
        assert!(matches!(err, ProviderError::Embedder(msg) if msg.contains("502")));
    }

    #[test]
    fn embeddings_parse_out_of_order() {
        let body = r#"{"data":[{"embedding":[2.0],"index":1},{"embedding":[1.0],"index":0}]}"#;
        let mut parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        parsed.data.sort_by_key(|entry| entry.index);
        assert_eq!(parsed.data[0].embedding, vec![1.0]);
    }

    #[test]
    fn empty_key_rejected() {
        let err = OpenAiClient::new("  ", &OpenAiSettings::default()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
