//! Error types for Scribe Core
//!
//! Provides error handling for:
//! - Language model calls
//! - Model output parsing (strict and approximate stages)
//! - Edit workflow transitions and conflicts
//! - Document store access
//! - Configuration loading
//!
//! Only generation failures and cancellation abort a request; everything
//! else is recovered inside the pipeline.

use scribe_retrieval::RetrievalError;
use scribe_signals::SignalError;
use scribe_types::DocumentId;
use serde::Serialize;
use std::path::PathBuf;

use crate::workflow::EditState;

/// Apology shown to the user when a response cannot be produced
pub const APOLOGY: &str =
    "Sorry, I couldn't generate a response right now. Please try again in a moment.";

/// Main Scribe error type
#[derive(Debug, thiserror::Error)]
pub enum ScribeError {
    /// Response generation failed
    #[error("generation failed: {0}")]
    Generation(#[source] LlmError),

    /// Retrieval failed in a way that aborts the request
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Document store error
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// Edit workflow error
    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Caller cancelled the request
    #[error("request cancelled")]
    Cancelled,
}

impl ScribeError {
    /// Check if the caller may retry the whole request
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Generation(err) => err.is_retryable(),
            Self::Workflow(err) => err.is_retryable(),
            Self::Document(DocumentError::Backend(_)) => true,
            _ => false,
        }
    }

    /// User-visible message
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Cancelled => "The request was cancelled.",
            Self::Workflow(
                WorkflowError::Conflict { .. } | WorkflowError::TargetMissing { .. },
            ) => {
                "The document changed while the edit was pending. Please review the edit again."
            }
            _ => APOLOGY,
        }
    }

    /// Short machine-readable category
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Generation(_) => "generation_failed",
            Self::Retrieval(_) => "retrieval_failed",
            Self::Document(_) => "document_error",
            Self::Workflow(_) => "workflow_error",
            Self::Config(_) => "config_error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Request-level error body: generic message, diagnostics, apology
    #[must_use]
    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.category().to_string(),
            details: self.to_string(),
            content: self.user_message().to_string(),
        }
    }
}

impl From<LlmError> for ScribeError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Cancelled => Self::Cancelled,
            other => Self::Generation(other),
        }
    }
}

/// Serializable error body returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Generic error category
    pub error: String,
    /// Diagnostic details
    pub details: String,
    /// User-visible apology
    pub content: String,
}

/// Language model errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Transport failure
    #[error("http error: {0}")]
    Http(String),

    /// Provider returned an error or an unusable body
    #[error("response error: {0}")]
    Response(String),

    /// Request or response could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Call exceeded its timeout
    #[error("model call timed out after {millis}ms")]
    Timeout {
        /// Timeout that elapsed
        millis: u64,
    },

    /// Call was cancelled
    #[error("model call cancelled")]
    Cancelled,
}

impl LlmError {
    /// Check if a retry could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }
}

/// Model output parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// No JSON object found in the output
    #[error("no JSON object in model output")]
    NoJson,

    /// JSON syntax error
    #[error("invalid JSON: {0}")]
    Syntax(String),

    /// JSON did not match the expected schema
    #[error("schema violation: {}", .0.join("; "))]
    Schema(Vec<String>),
}

/// Edit workflow errors
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Transition not allowed by the state machine
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition {
        /// Current state
        from: EditState,
        /// Requested state
        to: EditState,
    },

    /// Document content changed since the proposal was made
    #[error("document {document_id} changed since the proposal was made")]
    Conflict {
        /// Affected document
        document_id: DocumentId,
    },

    /// Text the edit was anchored to is no longer in the document
    #[error("edit target is no longer present in document {document_id}")]
    TargetMissing {
        /// Affected document
        document_id: DocumentId,
    },

    /// Another workflow or apply is in flight for the document
    #[error("document {document_id} already has an edit in progress")]
    Busy {
        /// Affected document
        document_id: DocumentId,
    },

    /// No workflow exists for the document
    #[error("no edit workflow for document {document_id}")]
    NoWorkflow {
        /// Affected document
        document_id: DocumentId,
    },

    /// Proposal id does not match the pending proposal
    #[error("unknown proposal {proposal_id}")]
    UnknownProposal {
        /// Requested proposal id
        proposal_id: String,
    },

    /// Document store failed while applying
    #[error("document store failed: {0}")]
    Document(#[from] DocumentError),
}

impl WorkflowError {
    /// Check if a retry could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Busy { .. } | Self::Document(DocumentError::Backend(_))
        )
    }
}

/// Document store errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum DocumentError {
    /// Document does not exist
    #[error("document {0} not found")]
    NotFound(DocumentId),

    /// User may not access the document
    #[error("user {user_id} may not access document {document_id}")]
    Forbidden {
        /// Document requested
        document_id: DocumentId,
        /// Requesting user
        user_id: String,
    },

    /// Backend failure
    #[error("document backend error: {0}")]
    Backend(String),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// IO error
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or shape error
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it is invalid
        reason: String,
    },

    /// Extra signal rule failed to compile
    #[error(transparent)]
    Signals(#[from] SignalError),
}
