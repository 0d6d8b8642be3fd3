//! Mail collaborators for the digest pipeline.
//!
//! Transport (IMAP, Gmail API, SMTP) lives outside this crate. Adapters
//! implement [`MailReader`] and [`MailSender`]; the pipeline only sees
//! [`RawMessage`]s turned into [`Document`]s by [`fetch_documents`], and hands
//! the finished digest back through [`deliver_digest`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{html_to_text, Digest, Document, Error, Phase, ProviderError, Result};

/// Source identifier for a message without a subject.
pub const NO_SUBJECT: &str = "(No subject)";

/// A fetched message, before it becomes a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Provider message id.
    pub id: String,
    /// Subject line, if any.
    pub subject: Option<String>,
    /// Body, plain text or HTML.
    pub body: String,
    /// Whether `body` is HTML.
    #[serde(default)]
    pub is_html: bool,
    /// When the message was received.
    pub received: Option<DateTime<Utc>>,
}

impl RawMessage {
    /// The subject, or [`NO_SUBJECT`] when missing or blank.
    #[must_use]
    pub fn subject_or_default(&self) -> &str {
        self.subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_SUBJECT)
    }
}

impl From<RawMessage> for Document {
    fn from(message: RawMessage) -> Self {
        let source = message.subject_or_default().to_string();
        let text = if message.is_html {
            html_to_text(&message.body)
        } else {
            message.body
        };
        Document::new(message.id, text, source)
    }
}

/// Lists messages under a label.
#[async_trait]
pub trait MailReader: Send + Sync {
    /// Up to `max` messages carrying `label`, received on or after `since`.
    async fn list_matching(
        &self,
        label: &str,
        since: NaiveDate,
        max: usize,
    ) -> std::result::Result<Vec<RawMessage>, ProviderError>;
}

/// Delivers a rendered digest.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Send one HTML message.
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> std::result::Result<(), ProviderError>;
}

/// List messages under `label` and turn the non-blank ones into documents.
///
/// # Errors
///
/// [`Error::Provider`] with [`Phase::Fetch`].
pub async fn fetch_documents(
    reader: &dyn MailReader,
    label: &str,
    since: NaiveDate,
    max: usize,
) -> Result<Vec<Document>> {
    let messages = reader.list_matching(label, since, max).await.map_err(|e| {
        Error::provider(
            Phase::Fetch {
                label: label.to_string(),
            },
            e,
        )
    })?;

    let fetched = messages.len();
    let documents: Vec<Document> = messages
        .into_iter()
        .map(Document::from)
        .filter(|doc| !doc.text.trim().is_empty())
        .collect();

    tracing::info!(label, fetched, kept = documents.len(), "fetched mail");
    Ok(documents)
}

/// Mail `digest` to `to` as HTML under the subject for `date`.
///
/// # Errors
///
/// [`Error::Provider`] with [`Phase::Deliver`].
pub async fn deliver_digest(
    sender: &dyn MailSender,
    to: &str,
    digest: &Digest,
    date: NaiveDate,
) -> Result<()> {
    let subject = Digest::subject(date);
    sender
        .send(to, &subject, &digest.to_html())
        .await
        .map_err(|e| Error::provider(Phase::Deliver, e))?;

    tracing::info!(to, subject = %subject, "delivered digest");
    Ok(())
}
