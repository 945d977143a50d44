//! Structured generation instructions
//!
//! [`InstructionJson`] is what the planner hands to the generator. The task
//! kind and its inputs travel together as a tagged variant, so an instruction
//! can never pair a `compare` task with `rewrite` inputs.
//!
//! Wire shape:
//!
//! ```json
//! {
//!   "task": "rewrite",
//!   "inputs": { "target_text": "...", "goal": "more formal" },
//!   "targets": [{ "type": "selection" }],
//!   "context_refs": [{ "type": "doc", "id": "chunk-1", "why": "defines revenue" }],
//!   "constraints": { "max_words": 200, "tone": "formal" },
//!   "telemetry": { "route_confidence": 0.9, "rag_used": true, "web_used": false }
//! }
//! ```

use crate::evidence::EvidenceBundle;
use crate::router::Target;
use crate::task::TaskKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Task-specific inputs, tagged by task kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "task", content = "inputs", rename_all = "snake_case")]
pub enum TaskInputs {
    /// Rewrite inputs
    Rewrite {
        /// Text to rewrite
        target_text: String,
        /// Desired change ("more formal", "shorter")
        #[serde(default, skip_serializing_if = "Option::is_none")]
        goal: Option<String>,
    },
    /// Summarize inputs
    Summarize {
        /// Text to summarize
        target_text: String,
        /// Optional focus
        #[serde(default, skip_serializing_if = "Option::is_none")]
        focus: Option<String>,
    },
    /// Extend inputs
    Extend {
        /// Text to continue from
        target_text: String,
        /// Direction to take
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<String>,
    },
    /// Outline inputs
    Outline {
        /// Topic or text to outline
        target_text: String,
    },
    /// Critique inputs
    Critique {
        /// Text to critique
        target_text: String,
        /// Review criteria
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        criteria: Vec<String>,
    },
    /// Fact-check inputs
    FactCheck {
        /// Text containing the claims
        target_text: String,
        /// Individual claims, if already split
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        claims: Vec<String>,
    },
    /// Reference insertion inputs
    ReferenceInsert {
        /// Text that needs a reference
        target_text: String,
        /// What kind of source to cite
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference_hint: Option<String>,
    },
    /// Compare inputs
    Compare {
        /// Framing text
        target_text: String,
        /// Items under comparison
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        items: Vec<String>,
    },
    /// Table creation inputs
    TableCreate {
        /// Subject of the table
        target_text: String,
        /// Requested columns
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        columns: Vec<String>,
    },
    /// Table edit inputs
    TableEdit {
        /// Current table text
        target_text: String,
        /// Requested change
        #[serde(default, skip_serializing_if = "Option::is_none")]
        change: Option<String>,
    },
    /// Style inputs
    Style {
        /// Text to restyle
        target_text: String,
        /// Target style
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<String>,
    },
    /// Plan inputs
    Plan {
        /// Goal to plan for
        target_text: String,
    },
    /// Extract inputs
    Extract {
        /// Text to extract from
        target_text: String,
        /// Fields to extract
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        fields: Vec<String>,
    },
}

impl TaskInputs {
    /// Minimal inputs for a task: only the target text
    #[must_use]
    pub fn minimal(task: TaskKind, target_text: impl Into<String>) -> Self {
        let target_text = target_text.into();
        match task {
            TaskKind::Rewrite => Self::Rewrite { target_text, goal: None },
            TaskKind::Summarize => Self::Summarize { target_text, focus: None },
            TaskKind::Extend => Self::Extend { target_text, direction: None },
            TaskKind::Outline => Self::Outline { target_text },
            TaskKind::Critique => Self::Critique { target_text, criteria: Vec::new() },
            TaskKind::FactCheck => Self::FactCheck { target_text, claims: Vec::new() },
            TaskKind::ReferenceInsert => Self::ReferenceInsert {
                target_text,
                reference_hint: None,
            },
            TaskKind::Compare => Self::Compare { target_text, items: Vec::new() },
            TaskKind::TableCreate => Self::TableCreate { target_text, columns: Vec::new() },
            TaskKind::TableEdit => Self::TableEdit { target_text, change: None },
            TaskKind::Style => Self::Style { target_text, style: None },
            TaskKind::Plan => Self::Plan { target_text },
            TaskKind::Extract => Self::Extract { target_text, fields: Vec::new() },
        }
    }

    /// Task kind of these inputs
    #[must_use]
    pub fn task(&self) -> TaskKind {
        match self {
            Self::Rewrite { .. } => TaskKind::Rewrite,
            Self::Summarize { .. } => TaskKind::Summarize,
            Self::Extend { .. } => TaskKind::Extend,
            Self::Outline { .. } => TaskKind::Outline,
            Self::Critique { .. } => TaskKind::Critique,
            Self::FactCheck { .. } => TaskKind::FactCheck,
            Self::ReferenceInsert { .. } => TaskKind::ReferenceInsert,
            Self::Compare { .. } => TaskKind::Compare,
            Self::TableCreate { .. } => TaskKind::TableCreate,
            Self::TableEdit { .. } => TaskKind::TableEdit,
            Self::Style { .. } => TaskKind::Style,
            Self::Plan { .. } => TaskKind::Plan,
            Self::Extract { .. } => TaskKind::Extract,
        }
    }

    /// The text the task operates on
    #[must_use]
    pub fn target_text(&self) -> &str {
        match self {
            Self::Rewrite { target_text, .. }
            | Self::Summarize { target_text, .. }
            | Self::Extend { target_text, .. }
            | Self::Outline { target_text }
            | Self::Critique { target_text, .. }
            | Self::FactCheck { target_text, .. }
            | Self::ReferenceInsert { target_text, .. }
            | Self::Compare { target_text, .. }
            | Self::TableCreate { target_text, .. }
            | Self::TableEdit { target_text, .. }
            | Self::Style { target_text, .. }
            | Self::Plan { target_text }
            | Self::Extract { target_text, .. } => target_text,
        }
    }
}

/// Kind of evidence a context reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    /// A document chunk, identified by chunk id
    Doc,
    /// A web result, identified by url
    Web,
}

/// Reference to evidence the instruction relies on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ContextRef {
    /// Evidence kind
    #[serde(rename = "type")]
    pub kind: RefKind,
    /// Chunk id or url
    pub id: String,
    /// Why this evidence matters
    #[serde(default)]
    pub why: String,
}

impl ContextRef {
    /// Whether the referenced source is present in `bundle`
    #[must_use]
    pub fn is_in(&self, bundle: &EvidenceBundle) -> bool {
        match self.kind {
            RefKind::Doc => bundle.contains_chunk(&self.id),
            RefKind::Web => bundle.contains_web(&self.id),
        }
    }
}

/// Citation rendering style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CitationStyle {
    /// Numbered inline markers `[1]`
    Numbered,
    /// Source titles inline
    Inline,
    /// No citations
    None,
}

/// Generation constraints
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Constraints {
    /// Word ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_words: Option<u32>,
    /// Tone ("concise", "formal", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    /// Citation style
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_style: Option<CitationStyle>,
}

/// What the pipeline actually used
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Telemetry {
    /// Router confidence
    pub route_confidence: f32,
    /// Whether document evidence was used
    pub rag_used: bool,
    /// Whether web evidence was used
    pub web_used: bool,
}

/// Structured, machine-checkable instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InstructionJson {
    /// Task kind and its inputs
    #[serde(flatten)]
    pub inputs: TaskInputs,
    /// Edit targets
    #[serde(default)]
    pub targets: Vec<Target>,
    /// Evidence actually relied on
    #[serde(default)]
    pub context_refs: Vec<ContextRef>,
    /// Generation constraints
    #[serde(default)]
    pub constraints: Constraints,
    /// Pipeline telemetry
    #[serde(default)]
    pub telemetry: Telemetry,
}

impl InstructionJson {
    /// Task kind
    #[inline]
    #[must_use]
    pub fn task(&self) -> TaskKind {
        self.inputs.task()
    }

    /// Drop every context reference whose source is absent from `bundle`.
    ///
    /// Returns the number of references removed.
    pub fn retain_refs_in(&mut self, bundle: &EvidenceBundle) -> usize {
        let before = self.context_refs.len();
        self.context_refs.retain(|r| r.is_in(bundle));
        before - self.context_refs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceChunk;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn flattened_wire_shape() {
        let instruction = InstructionJson {
            inputs: TaskInputs::Rewrite {
                target_text: "hello".into(),
                goal: Some("formal".into()),
            },
            targets: vec![Target::selection()],
            context_refs: vec![],
            constraints: Constraints {
                max_words: Some(100),
                ..Constraints::default()
            },
            telemetry: Telemetry::default(),
        };

        let value = serde_json::to_value(&instruction).unwrap();
        assert_eq!(value["task"], "rewrite");
        assert_eq!(value["inputs"]["target_text"], "hello");
        assert_eq!(value["targets"][0]["type"], "selection");
        assert_eq!(value["constraints"]["max_words"], 100);
    }

    #[test]
    fn parses_model_shape() {
        let value = json!({
            "task": "compare",
            "inputs": { "target_text": "plans", "items": ["A", "B"] },
            "context_refs": [{ "type": "web", "id": "https://x.test", "why": "pricing" }]
        });
        let instruction: InstructionJson = serde_json::from_value(value).unwrap();
        assert_eq!(instruction.task(), TaskKind::Compare);
        assert_eq!(instruction.context_refs[0].kind, RefKind::Web);
        assert!(instruction.targets.is_empty());
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let value = json!({
            "task": "outline",
            "inputs": { "goal": "no target text" }
        });
        assert!(serde_json::from_value::<InstructionJson>(value).is_err());
    }

    #[test]
    fn retain_refs_drops_unknown_sources() {
        let bundle = EvidenceBundle {
            chunks: vec![EvidenceChunk::new("c1", "d", "text", 0.5)],
            ..EvidenceBundle::default()
        };
        let mut instruction = InstructionJson {
            inputs: TaskInputs::minimal(TaskKind::Summarize, "x"),
            targets: vec![],
            context_refs: vec![
                ContextRef { kind: RefKind::Doc, id: "c1".into(), why: String::new() },
                ContextRef { kind: RefKind::Doc, id: "c9".into(), why: String::new() },
                ContextRef { kind: RefKind::Web, id: "c1".into(), why: String::new() },
            ],
            constraints: Constraints::default(),
            telemetry: Telemetry::default(),
        };

        assert_eq!(instruction.retain_refs_in(&bundle), 2);
        assert_eq!(instruction.context_refs.len(), 1);
        assert_eq!(instruction.context_refs[0].id, "c1");
    }

    #[test]
    fn minimal_inputs_cover_every_task() {
        for kind in TaskKind::ALL {
            let inputs = TaskInputs::minimal(kind, "t");
            assert_eq!(inputs.task(), kind);
            assert_eq!(inputs.target_text(), "t");
        }
    }
}
