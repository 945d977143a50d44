//! Pipeline events
//!
//! The orchestrator reports each step to an injected [`PipelineObserver`].
//! [`TracingObserver`] forwards events to `tracing`; tests record them.

use crate::live_edit::DecisionPath;
use scribe_retrieval::GateVerdict;
use scribe_types::{DecisionOrigin, TaskKind};
use std::fmt;

/// Pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    /// Task routing
    Route,
    /// Linking request documents to the session
    Link,
    /// Evidence retrieval
    Retrieve,
    /// Instruction planning
    Plan,
    /// Response generation
    Generate,
    /// Draft verification
    Verify,
    /// Live-edit decision
    LiveEdit,
}

impl PipelineStage {
    /// Stage name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Route => "route",
            Self::Link => "link",
            Self::Retrieve => "retrieve",
            Self::Plan => "plan",
            Self::Generate => "generate",
            Self::Verify => "verify",
            Self::LiveEdit => "live_edit",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Request classified
    Routed {
        /// Task kind
        task: TaskKind,
        /// Router confidence
        confidence: f32,
        /// Where the decision came from
        origin: DecisionOrigin,
    },
    /// Evidence retrieved
    Retrieved {
        /// Document chunks returned
        document_chunks: usize,
        /// Web results returned
        web_results: usize,
        /// Relevance gate outcome, when the gate ran
        gate: Option<GateVerdict>,
        /// Whether a web search was issued
        web_attempted: bool,
    },
    /// Evidence packed and scored
    Packed {
        /// Chunks in the bundle
        chunks: usize,
        /// Web results in the bundle
        web_results: usize,
        /// Tokens used
        tokens_used: usize,
        /// Retrieval confidence
        confidence: f32,
        /// Evidence coverage
        coverage: f32,
    },
    /// Instruction planned
    Planned {
        /// Task kind
        task: TaskKind,
        /// Context references kept
        context_refs: usize,
        /// Context references dropped as unknown
        dropped_refs: usize,
        /// Whether the minimal fallback instruction was used
        fallback: bool,
    },
    /// Draft generated
    Generated {
        /// Draft length in characters
        chars: usize,
        /// Generation time
        elapsed_ms: u64,
    },
    /// Draft verified
    Verified {
        /// Validity
        is_valid: bool,
        /// Warning count
        warnings: usize,
    },
    /// Live-edit decision made
    LiveEditDecided {
        /// Whether the draft goes into the document
        triggered: bool,
        /// Decision path taken
        path: DecisionPath,
        /// Extracted payload length in characters
        payload_chars: usize,
    },
    /// A step degraded to its fallback
    Degraded {
        /// Affected step
        stage: PipelineStage,
        /// What happened
        reason: String,
    },
}

/// Receives pipeline events
pub trait PipelineObserver: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &PipelineEvent);
}

/// Observer that logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Routed {
                task,
                confidence,
                origin,
            } => {
                tracing::info!(%task, confidence, ?origin, "routed");
            }
            PipelineEvent::Retrieved {
                document_chunks,
                web_results,
                gate,
                web_attempted,
            } => {
                tracing::info!(
                    document_chunks,
                    web_results,
                    document_relevant = gate.map(|g| g.document_relevant),
                    gate_reason = gate.map(|g| g.reason.as_str()),
                    web_attempted,
                    "retrieved"
                );
            }
            PipelineEvent::Packed {
                chunks,
                web_results,
                tokens_used,
                confidence,
                coverage,
            } => {
                tracing::info!(chunks, web_results, tokens_used, confidence, coverage, "packed");
            }
            PipelineEvent::Planned {
                task,
                context_refs,
                dropped_refs,
                fallback,
            } => {
                tracing::info!(%task, context_refs, dropped_refs, fallback, "planned");
            }
            PipelineEvent::Generated { chars, elapsed_ms } => {
                tracing::info!(chars, elapsed_ms, "generated");
            }
            PipelineEvent::Verified { is_valid, warnings } => {
                tracing::info!(is_valid, warnings, "verified");
            }
            PipelineEvent::LiveEditDecided {
                triggered,
                path,
                payload_chars,
            } => {
                tracing::info!(triggered, path = path.as_str(), payload_chars, "live edit decided");
            }
            PipelineEvent::Degraded { stage, reason } => {
                tracing::warn!(%stage, %reason, "degraded");
            }
        }
    }
}
