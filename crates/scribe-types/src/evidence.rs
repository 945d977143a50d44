//! Evidence types
//!
//! - [`EvidenceChunk`]: a ranked text chunk owned by the evidence store
//! - [`WebResult`]: an external search hit, identified by its url
//! - [`EvidenceBundle`]: the packed, budget-bounded evidence handed to the
//!   generator for one request

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rough token estimate: one token per four characters, rounded up
#[inline]
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Document identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Create new document id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A ranked chunk of one of the user's documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceChunk {
    /// Chunk identifier, unique within the store
    pub id: String,
    /// Owning document
    pub document_id: DocumentId,
    /// Chunk text
    pub text: String,
    /// Similarity score, higher is better
    pub relevance_score: f32,
    /// Token count of `text`
    pub token_count: usize,
}

impl EvidenceChunk {
    /// Create chunk, estimating its token count
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        document_id: impl Into<DocumentId>,
        text: impl Into<String>,
        relevance_score: f32,
    ) -> Self {
        let text = text.into();
        Self {
            id: id.into(),
            document_id: document_id.into(),
            token_count: estimate_tokens(&text),
            text,
            relevance_score,
        }
    }
}

/// An external web search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebResult {
    /// Page title
    pub title: String,
    /// Page url; doubles as the identifier
    pub url: String,
    /// Result snippet
    pub snippet: String,
    /// Publication date if the provider reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<DateTime<Utc>>,
}

impl WebResult {
    /// Create web result
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            published_date: None,
        }
    }

    /// With publication date
    #[inline]
    #[must_use]
    pub fn with_published_date(mut self, date: DateTime<Utc>) -> Self {
        self.published_date = Some(date);
        self
    }

    /// Tokens this result costs when serialized into a prompt
    #[inline]
    #[must_use]
    pub fn token_count(&self) -> usize {
        estimate_tokens(&self.title) + estimate_tokens(&self.snippet) + estimate_tokens(&self.url)
    }
}

/// Evidence packed for one generation call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceBundle {
    /// Document chunks, in rank order
    pub chunks: Vec<EvidenceChunk>,
    /// Web results, in rank order
    pub web_results: Vec<WebResult>,
    /// Token budget for document evidence
    pub document_budget: usize,
    /// Token budget for web evidence
    pub web_budget: usize,
    /// Tokens actually used
    pub tokens_used: usize,
}

impl EvidenceBundle {
    /// Empty bundle
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the bundle holds no evidence at all
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.web_results.is_empty()
    }

    /// Whether a chunk with this id was packed
    #[must_use]
    pub fn contains_chunk(&self, id: &str) -> bool {
        self.chunks.iter().any(|c| c.id == id)
    }

    /// Whether a web result with this url was packed
    #[must_use]
    pub fn contains_web(&self, url: &str) -> bool {
        self.web_results.iter().any(|w| w.url == url)
    }

    /// Look up a packed chunk
    #[must_use]
    pub fn chunk(&self, id: &str) -> Option<&EvidenceChunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    /// Look up a packed web result
    #[must_use]
    pub fn web(&self, url: &str) -> Option<&WebResult> {
        self.web_results.iter().find(|w| w.url == url)
    }

    /// All evidence text (chunks then snippets)
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.chunks
            .iter()
            .map(|c| c.text.as_str())
            .chain(self.web_results.iter().map(|w| w.snippet.as_str()))
    }
}
