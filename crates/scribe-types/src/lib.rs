//! Scribe Types
//!
//! Typed data model shared by every Scribe crate:
//! - Task kinds and router decisions
//! - Evidence chunks, web results and packed bundles
//! - Structured instructions with per-task tagged inputs
//! - Session-owned state: linked documents and conversation history
//! - Request/response surface
//!
//! All wire types derive `serde`; the two model-produced types
//! ([`RouterDecision`] and [`InstructionJson`]) also derive `JsonSchema` so
//! their schema can be embedded in prompts and validated at the parse
//! boundary.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod document;
pub mod evidence;
pub mod history;
pub mod instruction;
pub mod linked;
pub mod request;
pub mod router;
pub mod task;

pub use document::{Document, DocumentPatch, EditPlacement};
pub use evidence::{estimate_tokens, DocumentId, EvidenceBundle, EvidenceChunk, WebResult};
pub use history::{ConversationHistory, Role, Turn, DEFAULT_MAX_TURNS};
pub use instruction::{
    CitationStyle, Constraints, ContextRef, InstructionJson, RefKind, TaskInputs, Telemetry,
};
pub use linked::{LinkedDocumentSet, MAX_LINKED_DOCUMENTS};
pub use request::{
    OrchestratorResponse, QueryRequest, ResponseMetadata, SourcesUsed, VerificationResult,
    DEFAULT_MAX_TOKENS,
};
pub use router::{
    fallback_keywords, DecisionOrigin, DocContext, Needs, Precision, QueryPlan, RouterDecision,
    Target, TargetKind, WebContext,
};
pub use task::{TaskKind, UnknownTaskKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
