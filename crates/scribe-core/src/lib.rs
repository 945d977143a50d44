//! Scribe Core - retrieval-augmented orchestration
//!
//! The pipeline behind the editor's assistant:
//! - Routes each ask to a task with a model call, falling back to rules
//! - Gathers document and web evidence within a token budget
//! - Plans a structured instruction over that evidence
//! - Generates, then verifies the draft against its sources
//! - Decides whether the draft is written straight into the document
//!
//! # Example
//!
//! ```rust,ignore
//! use scribe_core::prelude::*;
//!
//! # async fn example(
//! #     llm: std::sync::Arc<dyn LlmClient>,
//! #     evidence: std::sync::Arc<dyn scribe_retrieval::EvidenceStore>,
//! #     documents: std::sync::Arc<dyn DocumentStore>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator =
//!     OrchestratorBuilder::new(ScribeConfig::new(), llm, evidence, documents).build()?;
//! let mut session = OrchestratorSession::new("s-1", "alice", 20);
//!
//! let request = QueryRequest::new("Summarize this section").with_document("doc-1");
//! let response = orchestrator
//!     .process_query(&mut session, request, &CancellationToken::new())
//!     .await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod generator;
pub mod json;
pub mod live_edit;
pub mod llm;
pub mod markdown;
pub mod observer;
pub mod orchestrator;
pub mod planner;
pub mod router;
pub mod session;
pub mod verifier;
pub mod workflow;

// Re-exports for convenience
pub use catalog::{EvidenceCatalog, Source};
pub use config::{
    HistoryConfig, LiveEditConfig, LlmConfig, PackingConfig, ScribeConfig, SignalsConfig,
    WebConfig,
};
pub use document::{DocumentStore, InMemoryDocumentStore};
pub use error::{
    ConfigError, DocumentError, ErrorBody, LlmError, ParseError, ScribeError, WorkflowError,
    APOLOGY,
};
pub use generator::{GenerationInput, ResponseGenerator};
pub use json::{parse_model_output, ParseStage, Parsed};
pub use live_edit::{DecisionPath, LiveEditDecision, LiveEditEngine};
pub use llm::{
    complete_bounded, CallPurpose, ChatMessage, ChatRole, CompletionOptions, CompletionRequest,
    HttpLlmClient, HttpLlmConfig, LlmClient, ResponseFormat,
};
pub use observer::{PipelineEvent, PipelineObserver, PipelineStage, TracingObserver};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use planner::{InstructionPlanner, PlanInput, PlanOutcome};
pub use router::TaskRouter;
pub use session::{OrchestratorSession, SessionHandle, SessionManager};
pub use verifier::GENERAL_KNOWLEDGE_WARNING;
pub use workflow::{EditCoordinator, EditProposal, EditState};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding the orchestrator
    pub use crate::{
        DocumentStore, LlmClient, Orchestrator, OrchestratorBuilder, OrchestratorSession,
        PipelineObserver, ScribeConfig, ScribeError, SessionManager,
    };
    pub use scribe_types::{OrchestratorResponse, QueryRequest, TaskKind};
    pub use tokio_util::sync::CancellationToken;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
