//! Router decision types
//!
//! A [`RouterDecision`] is produced once per request by the task router and
//! is immutable afterwards. Its wire shape is what the classification model
//! is asked to emit, so every field here is part of that contract.

use crate::task::TaskKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which of the user's documents a request needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocContext {
    /// No document context
    None,
    /// The current document only
    Current,
    /// Linked documents
    Linked,
    /// Current and linked documents
    All,
}

/// How strongly a request needs web evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebContext {
    /// Web evidence not wanted
    No,
    /// Web evidence helps if retrieval is weak
    Recommended,
    /// Web evidence required
    Required,
}

/// Precision the answer must hold to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    /// Loose, creative answers are fine
    Low,
    /// Default precision
    Medium,
    /// Answers must stick to evidence
    High,
}

/// Evidence needs of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Needs {
    /// Whether the selected text is an input
    pub selection_text: bool,
    /// Document scope
    pub doc_context: DocContext,
    /// Web scope
    pub web_context: WebContext,
    /// Precision level
    pub precision: Precision,
}

/// Retrieval query derived from the ask
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct QueryPlan {
    /// Semantic (embedding) query
    pub semantic: String,
    /// Keyword query terms
    pub keywords: Vec<String>,
}

/// Kind of edit target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// The user's selection
    Selection,
    /// A paragraph
    Paragraph,
    /// A section under a heading
    Section,
    /// A table
    Table,
    /// The whole document
    Document,
    /// Cursor position (insertion)
    Cursor,
}

/// An edit target inside the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Target {
    /// Target kind
    #[serde(rename = "type")]
    pub kind: TargetKind,
    /// Optional locator (heading text, table caption, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
}

impl Target {
    /// Target the current selection
    #[inline]
    #[must_use]
    pub fn selection() -> Self {
        Self {
            kind: TargetKind::Selection,
            locator: None,
        }
    }

    /// Target of a given kind
    #[inline]
    #[must_use]
    pub fn new(kind: TargetKind) -> Self {
        Self {
            kind,
            locator: None,
        }
    }

    /// With locator
    #[inline]
    #[must_use]
    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }
}

/// Where a router decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecisionOrigin {
    /// Strict schema parse of the model output
    #[default]
    Model,
    /// Recovered by the approximate parser
    Approximate,
    /// Deterministic fallback
    Fallback,
}

/// Classification of one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouterDecision {
    /// Task kind
    pub task: TaskKind,
    /// Router confidence in `[0, 1]`
    pub confidence: f32,
    /// Evidence needs
    pub needs: Needs,
    /// Retrieval query
    pub query: QueryPlan,
    /// Edit targets
    #[serde(default)]
    pub targets: Vec<Target>,
    /// Origin (not part of the wire shape)
    #[serde(skip)]
    pub origin: DecisionOrigin,
}

impl RouterDecision {
    /// Deterministic decision used when classification fails.
    ///
    /// Keywords are the ask's words longer than three characters.
    #[must_use]
    pub fn fallback(ask: &str, selection: Option<&str>) -> Self {
        let has_selection = selection.is_some_and(|s| !s.trim().is_empty());
        Self {
            task: TaskKind::Rewrite,
            confidence: 0.0,
            needs: Needs {
                selection_text: has_selection,
                doc_context: DocContext::Current,
                web_context: WebContext::No,
                precision: Precision::Medium,
            },
            query: QueryPlan {
                semantic: ask.to_string(),
                keywords: fallback_keywords(ask),
            },
            targets: if has_selection {
                vec![Target::selection()]
            } else {
                Vec::new()
            },
            origin: DecisionOrigin::Fallback,
        }
    }

    /// Whether this decision came from the deterministic fallback
    #[inline]
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.origin == DecisionOrigin::Fallback
    }

    /// With origin
    #[inline]
    #[must_use]
    pub fn with_origin(mut self, origin: DecisionOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// Words longer than three characters, punctuation trimmed
#[must_use]
pub fn fallback_keywords(ask: &str) -> Vec<String> {
    ask.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() > 3)
        .map(str::to_string)
        .collect()
}
