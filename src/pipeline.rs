//! Retrieval-augmented question answering: `ask(question) -> answer`.
//!
//! ```text
//! question ──► Retriever::retrieve(question, K)
//!                 │
//!                 ├─ no hits ──► NO_INFORMATION (answerer never called)
//!                 │
//!                 └─ hits ──► system: answer only from context
//!                             user:   Source: a\n<text>\n---\nSource: b\n<text>
//!                                     Question: <question>
//!                                  ──► Answerer::complete ──► answer
//! ```

use std::sync::Arc;

use crate::index::RetrievalResult;
use crate::{Answerer, Error, Phase, Prompt, Result, Retriever};

/// Returned when retrieval finds no context.
pub const NO_INFORMATION: &str = "No relevant information found.";

/// Default number of chunks fed to the answerer.
pub const DEFAULT_TOP_K: usize = 4;

const SYSTEM_INSTRUCTION: &str = "You answer questions about the user's documents. \
Use only the provided context. If the context is not sufficient to answer, say that you don't know.";

const CONTEXT_DELIMITER: &str = "\n---\n";

/// An answer together with the context it was generated from.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Generated text, or [`NO_INFORMATION`].
    pub text: String,
    /// Retrieved context, best first. Empty when nothing was found.
    pub context: RetrievalResult,
}

/// Composes a [`Retriever`] and an [`Answerer`].
pub struct RagPipeline {
    retriever: Retriever,
    answerer: Arc<dyn Answerer>,
    top_k: usize,
    temperature: Option<f32>,
}

impl RagPipeline {
    /// Create a pipeline retrieving [`DEFAULT_TOP_K`] chunks per question.
    pub fn new(retriever: Retriever, answerer: Arc<dyn Answerer>) -> Self {
        Self {
            retriever,
            answerer,
            top_k: DEFAULT_TOP_K,
            temperature: Some(0.0),
        }
    }

    /// Set the number of chunks retrieved per question.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the answer sampling temperature (`None` = provider default).
    #[must_use]
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// The retriever this pipeline queries.
    #[must_use]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `question` from the indexed documents.
    ///
    /// # Errors
    ///
    /// [`Error::Provider`] with [`Phase::Query`] or [`Phase::Answer`].
    /// Failures are not retried.
    pub async fn ask(&self, question: &str) -> Result<String> {
        Ok(self.ask_with_context(question).await?.text)
    }

    /// Like [`RagPipeline::ask`], also returning the retrieved context.
    ///
    /// # Errors
    ///
    /// See [`RagPipeline::ask`].
    pub async fn ask_with_context(&self, question: &str) -> Result<Answer> {
        let context = self.retriever.retrieve(question, self.top_k).await?;
        if context.is_empty() {
            tracing::info!("no context retrieved, skipping answerer");
            return Ok(Answer {
                text: NO_INFORMATION.to_string(),
                context,
            });
        }

        let mut prompt = build_prompt(question, &context);
        prompt.temperature = self.temperature;

        let text = self
            .answerer
            .complete(&prompt)
            .await
            .map_err(|e| Error::provider(Phase::Answer, e))?;

        tracing::info!(context = context.len(), "answered question");
        Ok(Answer { text, context })
    }
}

/// Build the answering prompt for `question` over retrieved `context`.
#[must_use]
pub fn build_prompt(question: &str, context: &RetrievalResult) -> Prompt {
    let passages: Vec<String> = context
        .iter()
        .map(|hit| format!("Source: {}\n{}", hit.chunk.source, hit.chunk.text))
        .collect();

    let user = format!(
        "Context:\n{}\n\nQuestion: {question}",
        passages.join(CONTEXT_DELIMITER)
    );
    Prompt::new(SYSTEM_INSTRUCTION, user)
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("retriever", &self.retriever)
            .field("top_k", &self.top_k)
            .field("temperature", &self.temperature)
            .finish()
    }
}
