//! Map-reduce summarization and the cross-document digest.
//!
//! ## The Problem
//!
//! A chat model has a bounded input. A long newsletter does not fit, and a
//! single-shot summary of a truncated input silently drops facts.
//!
//! ## Per Document
//!
//! ```text
//! SPLIT           non-overlapping windows of `chunk_size` chars
//!   │
//! SUMMARIZE_EACH  one call per window: "bullets, keep every number/name/date"
//!   │             (independent; up to `max_in_flight` calls at once)
//!   │
//! MERGE           one call over the partials joined in chunk order:
//!   │             "de-duplicate into one fact list"
//!   ▼
//! DONE            FactPack { source, summary }
//! ```
//!
//! Summarization windows do not overlap: the goal is coverage, not robustness
//! at search boundaries.
//!
//! ## Across Documents
//!
//! One more call clusters every [`FactPack`] into 2-6 themes, each with a
//! headline, 3-8 short factual bullets and a `Sources:` line. The result is a
//! Markdown [`Digest`].
//!
//! Merge and digest are join points: they start only once all of their inputs
//! exist. Only completeness of facts is asked of the model, not their order.
//!
//! A failed chunk does not stop its siblings. Finished partials are kept in a
//! [`Partials`] map, so a retry ([`MapReduceSummarizer::resume`],
//! [`DigestRun::summarize_pending`]) only calls the model for missing chunks.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::{Answerer, Chunk, Document, Error, FixedChunker, Phase, Prompt, Result};

/// Default summarization window, in chars.
pub const DEFAULT_SUMMARY_CHUNK: usize = 10_000;

/// Default cap on concurrent per-chunk calls.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

const SUMMARIZE_INSTRUCTION: &str = "Summarize the following text as short bullet points. \
Keep EVERY concrete fact: numbers, names, dates. Do not omit anything factual.";

const MERGE_INSTRUCTION: &str = "Merge the following partial summaries into one coherent, \
de-duplicated list of facts. Keep every number, name and date.";

const DIGEST_INSTRUCTION: &str = "You are writing a news digest for a busy reader.\n\
The input is a JSON array of fact packs, each with a source and its facts.\n\
Group them into 2-6 clear THEMES, merging topics from the same sector \
(e.g. finance, AI, markets, health). A single source may form a single theme.\n\n\
For each theme, return:\n\
1. A **headline**: a short noun phrase (2-5 words, no verbs)\n\
2. 3-8 bullet points, each at most 25 words, always with the concrete facts \
(numbers, names, companies, events)\n\
3. A **Sources:** line listing every contributing source, comma-separated\n\n\
Return clean Markdown with bold theme titles, indented bullets and one blank line \
between themes. You must preserve every factually meaningful point.";

/// Finished per-chunk summaries of one document, keyed by sequence index.
pub type Partials = BTreeMap<usize, String>;

/// The summary of one document, carried into the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactPack {
    /// Source identifier (file path, email subject).
    pub source: String,
    /// Merged fact list.
    #[serde(rename = "facts")]
    pub summary: String,
}

impl FactPack {
    /// Create a fact pack.
    pub fn new(source: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            summary: summary.into(),
        }
    }
}

/// Themed Markdown digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    /// The Markdown text, as generated.
    pub markdown: String,
}

impl Digest {
    /// The digest under a `Recap of <date>:` heading line.
    #[must_use]
    pub fn recap(&self, date: NaiveDate) -> String {
        format!("Recap of {}:\n{}", date.format("%d %b %Y"), self.markdown)
    }

    /// Subject line of the mailed digest for `date`.
    #[must_use]
    pub fn subject(date: NaiveDate) -> String {
        format!("News at midi \u{2013} {}", date.format("%d %b %Y"))
    }

    /// The Markdown rendered as an HTML mail body.
    #[must_use]
    pub fn to_html(&self) -> String {
        let parser = pulldown_cmark::Parser::new(&self.markdown);
        let mut html = String::with_capacity(self.markdown.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut html, parser);
        html
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.markdown)
    }
}

/// Fact-preserving map-reduce summarizer.
pub struct MapReduceSummarizer {
    answerer: Arc<dyn Answerer>,
    chunker: FixedChunker,
    max_in_flight: usize,
    summary_temperature: f32,
    digest_temperature: f32,
    digest_max_tokens: u32,
}

impl MapReduceSummarizer {
    /// Create a summarizer with default windows and concurrency.
    pub fn new(answerer: Arc<dyn Answerer>) -> Self {
        Self {
            answerer,
            chunker: FixedChunker::no_overlap(DEFAULT_SUMMARY_CHUNK),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            summary_temperature: 0.0,
            digest_temperature: 0.2,
            digest_max_tokens: 2000,
        }
    }

    /// Set the summarization window in chars.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size == 0`.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunker = FixedChunker::no_overlap(chunk_size);
        self
    }

    /// Cap concurrent per-chunk calls (at least 1).
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Temperature for the per-chunk and merge calls.
    #[must_use]
    pub fn with_summary_temperature(mut self, temperature: f32) -> Self {
        self.summary_temperature = temperature;
        self
    }

    /// Temperature and length cap for the digest call.
    #[must_use]
    pub fn with_digest_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.digest_temperature = temperature;
        self.digest_max_tokens = max_tokens;
        self
    }

    /// Run SPLIT, SUMMARIZE_EACH and MERGE over one document.
    ///
    /// A document with no text yields an empty fact pack without any call.
    ///
    /// # Errors
    ///
    /// [`Error::Provider`] with [`Phase::SummarizeChunk`] or [`Phase::Merge`].
    pub async fn summarize(&self, document: &Document) -> Result<FactPack> {
        self.resume(document, &mut Partials::new()).await
    }

    /// [`summarize`](Self::summarize), reusing partials from an earlier attempt.
    ///
    /// Only chunks missing from `partials` are sent to the model. New
    /// partials are stored as they succeed, so after a failure `partials`
    /// holds every finished chunk and can be passed to the next attempt.
    ///
    /// # Errors
    ///
    /// [`Error::Provider`] with [`Phase::SummarizeChunk`] or [`Phase::Merge`].
    pub async fn resume(&self, document: &Document, partials: &mut Partials) -> Result<FactPack> {
        let chunks = document.chunks(&self.chunker);
        if chunks.is_empty() {
            tracing::warn!(source = %document.source, "empty document, nothing to summarize");
            return Ok(FactPack::new(document.source.clone(), String::new()));
        }

        self.summarize_missing(&document.source, &chunks, partials).await?;
        let ordered: Vec<String> = chunks
            .iter()
            .filter_map(|chunk| partials.get(&chunk.sequence_index).cloned())
            .collect();
        let summary = self.merge(&document.source, &ordered).await?;

        tracing::info!(source = %document.source, chunks = chunks.len(), "summarized document");
        Ok(FactPack::new(document.source.clone(), summary))
    }

    /// SUMMARIZE_EACH: one call per chunk, at most `max_in_flight` at a time.
    ///
    /// Partials come back in chunk order. Every chunk is attempted even if
    /// one fails; the first failure in chunk order is returned.
    ///
    /// # Errors
    ///
    /// [`Error::Provider`] with [`Phase::SummarizeChunk`] naming the chunk.
    pub async fn summarize_chunks(&self, source: &str, chunks: &[Chunk]) -> Result<Vec<String>> {
        let mut partials = Partials::new();
        self.summarize_missing(source, chunks, &mut partials).await?;
        Ok(partials.into_values().collect())
    }

    /// Summarize the chunks that have no entry in `partials` yet.
    ///
    /// Successes are inserted even when a sibling fails.
    ///
    /// # Errors
    ///
    /// The first [`Phase::SummarizeChunk`] failure in chunk order.
    pub async fn summarize_missing(
        &self,
        source: &str,
        chunks: &[Chunk],
        partials: &mut Partials,
    ) -> Result<()> {
        let pending: Vec<&Chunk> = chunks
            .iter()
            .filter(|chunk| !partials.contains_key(&chunk.sequence_index))
            .collect();
        if pending.len() < chunks.len() {
            tracing::debug!(
                source,
                reused = chunks.len() - pending.len(),
                "reusing finished partials"
            );
        }

        let outcomes: Vec<(usize, Result<String>)> = stream::iter(pending)
            .map(|chunk| async move {
                (chunk.sequence_index, self.summarize_chunk(source, chunk).await)
            })
            .buffered(self.max_in_flight)
            .collect()
            .await;

        let mut first_failure = None;
        for (index, outcome) in outcomes {
            match outcome {
                Ok(partial) => {
                    partials.insert(index, partial);
                }
                Err(e) => {
                    tracing::warn!(source, chunk = index, error = %e, "chunk summary failed");
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    /// Summarize a single chunk. Lets a caller retry one failed unit.
    ///
    /// # Errors
    ///
    /// [`Error::Provider`] with [`Phase::SummarizeChunk`].
    pub async fn summarize_chunk(&self, source: &str, chunk: &Chunk) -> Result<String> {
        tracing::debug!(source, chunk = chunk.sequence_index, "summarizing chunk");
        let prompt = Prompt::new(SUMMARIZE_INSTRUCTION, chunk.text.clone())
            .with_temperature(self.summary_temperature);

        self.answerer.complete(&prompt).await.map_err(|e| {
            Error::provider(
                Phase::SummarizeChunk {
                    source: source.to_string(),
                    chunk: chunk.sequence_index,
                },
                e,
            )
        })
    }

    /// MERGE: fold ordered partial summaries into one fact list.
    ///
    /// # Errors
    ///
    /// [`Error::Provider`] with [`Phase::Merge`].
    pub async fn merge(&self, source: &str, partials: &[String]) -> Result<String> {
        let prompt = Prompt::new(MERGE_INSTRUCTION, partials.join("\n\n"))
            .with_temperature(self.summary_temperature);

        self.answerer.complete(&prompt).await.map_err(|e| {
            Error::provider(
                Phase::Merge {
                    source: source.to_string(),
                },
                e,
            )
        })
    }

    /// Cluster fact packs into a themed Markdown digest.
    ///
    /// # Errors
    ///
    /// [`Error::Precondition`] for zero packs (callers short-circuit before
    /// this), [`Error::Provider`] with [`Phase::Digest`].
    pub async fn digest(&self, packs: &[FactPack]) -> Result<Digest> {
        if packs.is_empty() {
            return Err(Error::Precondition(
                "digest needs at least one fact pack".to_string(),
            ));
        }

        let prompt = Prompt::new(DIGEST_INSTRUCTION, serde_json::to_string(packs)?)
            .with_temperature(self.digest_temperature)
            .with_max_tokens(self.digest_max_tokens);

        let markdown = self
            .answerer
            .complete(&prompt)
            .await
            .map_err(|e| Error::provider(Phase::Digest, e))?;

        tracing::info!(packs = packs.len(), "built digest");
        Ok(Digest { markdown })
    }
}

impl fmt::Debug for MapReduceSummarizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapReduceSummarizer")
            .field("chunk_size", &self.chunker.size())
            .field("max_in_flight", &self.max_in_flight)
            .field("summary_temperature", &self.summary_temperature)
            .field("digest_temperature", &self.digest_temperature)
            .field("digest_max_tokens", &self.digest_max_tokens)
            .finish()
    }
}

/// Fact packs accumulated across attempts of one digest run.
///
/// A retry after a failure only summarizes documents that have no pack yet,
/// and within an unfinished document only the chunks that have no partial.
#[derive(Debug, Default)]
pub struct DigestRun {
    packs: Vec<FactPack>,
    done: HashSet<String>,
    partials: HashMap<String, Partials>,
}

impl DigestRun {
    /// Start an empty run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Packs produced so far, in completion order.
    #[must_use]
    pub fn packs(&self) -> &[FactPack] {
        &self.packs
    }

    /// Whether the document with `id` already has a pack.
    #[must_use]
    pub fn is_done(&self, id: &str) -> bool {
        self.done.contains(id)
    }

    /// Finished chunk summaries kept for an unfinished document.
    #[must_use]
    pub fn partials(&self, id: &str) -> Option<&Partials> {
        self.partials.get(id)
    }

    /// Summarize every document without a pack. Returns how many were added.
    ///
    /// Stops at the first failed document. Packs produced before it are
    /// kept, as are the finished chunk summaries of the failed document.
    ///
    /// # Errors
    ///
    /// See [`MapReduceSummarizer::summarize`].
    pub async fn summarize_pending(
        &mut self,
        summarizer: &MapReduceSummarizer,
        documents: &[Document],
    ) -> Result<usize> {
        let mut added = 0;
        for document in documents {
            if self.done.contains(&document.id) {
                continue;
            }
            let partials = self.partials.entry(document.id.clone()).or_default();
            let pack = summarizer.resume(document, partials).await?;
            self.partials.remove(&document.id);
            self.done.insert(document.id.clone());
            self.packs.push(pack);
            added += 1;
        }
        Ok(added)
    }

    /// Build the digest over every pack.
    ///
    /// # Errors
    ///
    /// See [`MapReduceSummarizer::digest`].
    pub async fn finish(&self, summarizer: &MapReduceSummarizer) -> Result<Digest> {
        summarizer.digest(&self.packs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes the user turn and records every prompt.
    #[derive(Default)]
    struct Echo {
        prompts: Mutex<Vec<Prompt>>,
    }

    #[async_trait]
    impl Answerer for Echo {
        async fn complete(&self, prompt: &Prompt) -> std::result::Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.clone());
            Ok(prompt.last_user().unwrap_or_default().to_string())
        }
    }

    #[tokio::test]
    async fn map_then_merge_in_chunk_order() {
        let echo = Arc::new(Echo::default());
        let summarizer = MapReduceSummarizer::new(echo.clone()).with_chunk_size(4);

        let pack = summarizer
            .summarize(&Document::from_source("mail", "aaaabbbbcc"))
            .await
            .unwrap();

        assert_eq!(pack.source, "mail");
        assert_eq!(pack.summary, "aaaa\n\nbbbb\n\ncc");

        let prompts = echo.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 4);
        assert_eq!(prompts[3].system, MERGE_INSTRUCTION);
        assert_eq!(prompts[0].temperature, Some(0.0));
    }

    #[tokio::test]
    async fn empty_document_makes_no_calls() {
        let echo = Arc::new(Echo::default());
        let summarizer = MapReduceSummarizer::new(echo.clone());

        let pack = summarizer.summarize(&Document::from_source("blank", "")).await.unwrap();
        assert!(pack.summary.is_empty());
        assert!(echo.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn digest_requires_packs() {
        let summarizer = MapReduceSummarizer::new(Arc::new(Echo::default()));
        assert!(matches!(
            summarizer.digest(&[]).await,
            Err(Error::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn digest_sends_packs_as_json() {
        let echo = Arc::new(Echo::default());
        let summarizer = MapReduceSummarizer::new(echo.clone());

        summarizer
            .digest(&[FactPack::new("Markets", "- Revenue grew 12%")])
            .await
            .unwrap();

        let prompts = echo.prompts.lock().unwrap();
        assert_eq!(
            prompts[0].last_user(),
            Some(r#"[{"source":"Markets","facts":"- Revenue grew 12%"}]"#)
        );
        assert_eq!(prompts[0].max_tokens, Some(2000));
    }

    #[test]
    fn renders_markdown_as_html() {
        let digest = Digest {
            markdown: "**Markets**\n\n- Stocks rose 2%\n\nSources: Morning Brew".to_string(),
        };
        let html = digest.to_html();

        assert!(html.contains("<strong>Markets</strong>"));
        assert!(html.contains("<li>Stocks rose 2%</li>"));
        assert!(html.contains("<p>Sources: Morning Brew</p>"));
    }

    #[test]
    fn subject_names_the_day() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(Digest::subject(date), "News at midi \u{2013} 02 Mar 2026");
    }

    #[test]
    fn recap_heading_uses_day_month_year() {
        let digest = Digest {
            markdown: "**Markets**".to_string(),
        };
        let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        assert_eq!(digest.recap(date), "Recap of 15 Oct 2026:\n**Markets**");
    }
}
