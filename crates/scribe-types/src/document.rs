//! Documents as seen by the core
//!
//! The document store is an external collaborator; the core only needs a
//! document's title and text, and a way to patch its content.

use crate::evidence::DocumentId;
use crate::router::{Target, TargetKind};
use crate::task::TaskKind;
use serde::{Deserialize, Serialize};

/// A user document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Identifier
    pub id: DocumentId,
    /// Owner
    pub owner_id: String,
    /// Human-readable title
    pub title: String,
    /// Source text as authored (plain or markdown)
    pub plain_text: String,
    /// HTML rendition
    #[serde(default)]
    pub html_content: String,
}

impl Document {
    /// Create document from plain text; HTML mirrors the text
    #[must_use]
    pub fn new(
        id: impl Into<DocumentId>,
        owner_id: impl Into<String>,
        title: impl Into<String>,
        plain_text: impl Into<String>,
    ) -> Self {
        let plain_text = plain_text.into();
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            title: title.into(),
            html_content: plain_text.clone(),
            plain_text,
        }
    }
}

/// Partial update of a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New plain text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_text: Option<String>,
    /// New HTML
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_content: Option<String>,
}

impl DocumentPatch {
    /// Patch replacing the document content
    #[must_use]
    pub fn content(plain_text: impl Into<String>, html_content: impl Into<String>) -> Self {
        Self {
            title: None,
            plain_text: Some(plain_text.into()),
            html_content: Some(html_content.into()),
        }
    }

    /// Apply the patch in place
    pub fn apply_to(&self, document: &mut Document) {
        if let Some(title) = &self.title {
            document.title.clone_from(title);
        }
        if let Some(text) = &self.plain_text {
            document.plain_text.clone_from(text);
        }
        if let Some(html) = &self.html_content {
            document.html_content.clone_from(html);
        }
    }
}

/// Where a live edit lands in the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EditPlacement {
    /// Replace the first occurrence of `original`
    Replace {
        /// Text being replaced
        original: String,
    },
    /// Insert as a new block right after `anchor`
    InsertAfter {
        /// Text the insertion follows
        anchor: String,
    },
    /// Append as a new block at the end
    Append,
    /// Replace the whole document
    Document,
}

impl EditPlacement {
    /// Placement for a routed request
    ///
    /// A `document` target replaces everything. Otherwise a selection is
    /// replaced in place, or continued after for `extend`; without a
    /// selection the content is appended.
    #[must_use]
    pub fn for_request(task: TaskKind, selection: Option<&str>, targets: &[Target]) -> Self {
        if targets.iter().any(|t| t.kind == TargetKind::Document) {
            return Self::Document;
        }
        match selection.map(str::trim).filter(|s| !s.is_empty()) {
            Some(anchor) if task == TaskKind::Extend => Self::InsertAfter {
                anchor: anchor.to_string(),
            },
            Some(original) => Self::Replace {
                original: original.to_string(),
            },
            None => Self::Append,
        }
    }

    /// Merge `content` into `live`
    ///
    /// Returns `None` when the replaced or anchoring text is no longer in
    /// the document.
    #[must_use]
    pub fn merge(&self, live: &str, content: &str) -> Option<String> {
        let content = content.trim();
        match self {
            Self::Document => Some(content.to_string()),
            Self::Append => {
                let head = live.trim_end();
                if head.is_empty() {
                    return Some(content.to_string());
                }
                let tail = if live.ends_with('\n') { "\n" } else { "" };
                Some(format!("{head}\n\n{content}{tail}"))
            }
            Self::Replace { original } => {
                let at = find_span(live, original)?;
                Some(format!(
                    "{}{content}{}",
                    &live[..at],
                    &live[at + original.len()..]
                ))
            }
            Self::InsertAfter { anchor } => {
                let end = find_span(live, anchor)? + anchor.len();
                Some(format!("{}\n\n{content}{}", &live[..end], &live[end..]))
            }
        }
    }
}

fn find_span(live: &str, span: &str) -> Option<usize> {
    if span.is_empty() {
        None
    } else {
        live.find(span)
    }
}
