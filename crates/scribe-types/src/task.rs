//! Task kinds
//!
//! The closed set of request classes the router may produce. A task kind
//! decides the prompt shape downstream and whether the output is eligible
//! for live editing.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed enumeration of supported task kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Rewrite selected or referenced text
    Rewrite,
    /// Summarize text or documents
    Summarize,
    /// Continue or expand existing text
    Extend,
    /// Produce an outline
    Outline,
    /// Critique or review text
    Critique,
    /// Check claims against evidence
    FactCheck,
    /// Insert a reference or citation
    ReferenceInsert,
    /// Compare two or more items
    Compare,
    /// Create a new table
    TableCreate,
    /// Edit an existing table
    TableEdit,
    /// Restyle or reformat text
    Style,
    /// Produce a plan
    Plan,
    /// Extract structured facts
    Extract,
}

impl TaskKind {
    /// Every task kind, in declaration order
    pub const ALL: [TaskKind; 13] = [
        TaskKind::Rewrite,
        TaskKind::Summarize,
        TaskKind::Extend,
        TaskKind::Outline,
        TaskKind::Critique,
        TaskKind::FactCheck,
        TaskKind::ReferenceInsert,
        TaskKind::Compare,
        TaskKind::TableCreate,
        TaskKind::TableEdit,
        TaskKind::Style,
        TaskKind::Plan,
        TaskKind::Extract,
    ];

    /// Wire name of this task kind
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Rewrite => "rewrite",
            TaskKind::Summarize => "summarize",
            TaskKind::Extend => "extend",
            TaskKind::Outline => "outline",
            TaskKind::Critique => "critique",
            TaskKind::FactCheck => "fact_check",
            TaskKind::ReferenceInsert => "reference_insert",
            TaskKind::Compare => "compare",
            TaskKind::TableCreate => "table_create",
            TaskKind::TableEdit => "table_edit",
            TaskKind::Style => "style",
            TaskKind::Plan => "plan",
            TaskKind::Extract => "extract",
        }
    }

    /// Editing-class tasks produce content meant to replace or extend the
    /// document in place.
    #[inline]
    #[must_use]
    pub fn is_editing(self) -> bool {
        matches!(self, TaskKind::Rewrite | TaskKind::Extend | TaskKind::Style)
    }

    /// Long-form writing tasks get a coverage floor when any evidence exists.
    #[inline]
    #[must_use]
    pub fn is_long_form_writing(self) -> bool {
        matches!(
            self,
            TaskKind::Extend | TaskKind::Outline | TaskKind::Plan | TaskKind::TableCreate
        )
    }

    /// Tasks whose answers must stick closely to evidence
    #[inline]
    #[must_use]
    pub fn is_precise(self) -> bool {
        matches!(
            self,
            TaskKind::FactCheck
                | TaskKind::Extract
                | TaskKind::Compare
                | TaskKind::ReferenceInsert
                | TaskKind::TableEdit
        )
    }

    /// Sampling temperature for generation
    #[must_use]
    pub fn temperature(self) -> f32 {
        if self.is_precise() {
            0.1
        } else if self.is_editing() || matches!(self, TaskKind::Summarize | TaskKind::Critique) {
            0.3
        } else {
            0.5
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown task names
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task kind: {0}")]
pub struct UnknownTaskKind(pub String);

impl FromStr for TaskKind {
    type Err = UnknownTaskKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownTaskKind(s.to_string()))
    }
}
