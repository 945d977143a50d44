//! Document edit workflow
//!
//! State machine for live edits on one document:
//!
//! ```text
//! idle -> planning -> preview_ready -> applying -> applied
//!                          |              |    \-> discarded
//!                          |              \-> preview_ready (apply failed)
//!                          \-> discarded
//! ```
//!
//! `preview_ready -> planning` is illegal: a document holds at most one
//! workflow. [`EditCoordinator`] tracks one workflow per document, snapshots
//! the original content when a proposal is made, and refuses to apply when
//! the live content no longer matches that snapshot. Applying merges the
//! proposal into the live text at its [`EditPlacement`]; the rest of the
//! document is kept as authored.

use crate::document::DocumentStore;
use crate::error::WorkflowError;
use crate::markdown;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use scribe_types::{Document, DocumentId, DocumentPatch, EditPlacement};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use ulid::Ulid;

/// Workflow state of one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditState {
    /// No edit in progress
    #[default]
    Idle,
    /// Edit content is being produced
    Planning,
    /// Proposal ready for review
    PreviewReady,
    /// Proposal being written to the document
    Applying,
    /// Proposal written
    Applied,
    /// Proposal thrown away
    Discarded,
}

impl EditState {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EditState::Idle => "idle",
            EditState::Planning => "planning",
            EditState::PreviewReady => "preview_ready",
            EditState::Applying => "applying",
            EditState::Applied => "applied",
            EditState::Discarded => "discarded",
        }
    }

    /// Whether the workflow has finished
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, EditState::Applied | EditState::Discarded)
    }
}

impl fmt::Display for EditState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: EditState) -> Vec<EditState> {
    use EditState::{Applied, Applying, Discarded, Idle, Planning, PreviewReady};
    match from {
        Idle => vec![Planning],
        Planning => vec![PreviewReady, Discarded, Idle],
        PreviewReady => vec![Applying, Discarded],
        Applying => vec![Applied, Discarded, PreviewReady],
        Applied | Discarded => vec![Idle],
    }
}

/// Validate a state transition
///
/// # Errors
/// Returns [`WorkflowError::IllegalTransition`] when `to` is not reachable
/// from `from`.
pub fn validate_transition(from: EditState, to: EditState) -> Result<(), WorkflowError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(WorkflowError::IllegalTransition { from, to })
    }
}

/// Hash of document content at proposal time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentSnapshot(blake3::Hash);

impl ContentSnapshot {
    /// Snapshot of a text
    #[must_use]
    pub fn of(text: &str) -> Self {
        Self(blake3::hash(text.as_bytes()))
    }

    /// Whether `text` still matches the snapshot
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.0 == blake3::hash(text.as_bytes())
    }

    /// Hex digest
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

/// A pending edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditProposal {
    /// Proposal id
    pub id: String,
    /// Target document
    pub document_id: DocumentId,
    /// Proposed markdown content
    pub content: String,
    /// Where the content lands
    pub placement: EditPlacement,
    /// Original content snapshot
    pub snapshot: ContentSnapshot,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Workflow {
    state: EditState,
    proposal: Option<EditProposal>,
}

impl Workflow {
    fn transition(&mut self, to: EditState) -> Result<(), WorkflowError> {
        validate_transition(self.state, to)?;
        tracing::debug!(from = %self.state, to = %to, "edit workflow transition");
        self.state = to;
        Ok(())
    }
}

/// Per-document workflow registry
pub struct EditCoordinator {
    workflows: DashMap<DocumentId, Workflow>,
    documents: Arc<dyn DocumentStore>,
}

impl EditCoordinator {
    /// Create coordinator over a document store
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            workflows: DashMap::new(),
            documents,
        }
    }

    /// Current state of a document's workflow
    #[must_use]
    pub fn state(&self, document_id: &DocumentId) -> EditState {
        self.workflows
            .get(document_id)
            .map_or(EditState::Idle, |w| w.state)
    }

    /// Pending proposal of a document, if any
    #[must_use]
    pub fn pending(&self, document_id: &DocumentId) -> Option<EditProposal> {
        self.workflows
            .get(document_id)
            .and_then(|w| w.proposal.clone())
    }

    /// Start a workflow
    ///
    /// A finished workflow is reset first.
    ///
    /// # Errors
    /// [`WorkflowError::Busy`] while another workflow is active.
    pub fn begin(&self, document_id: &DocumentId) -> Result<(), WorkflowError> {
        let mut workflow = self.workflows.entry(document_id.clone()).or_default();
        if workflow.state.is_terminal() {
            workflow.transition(EditState::Idle)?;
            workflow.proposal = None;
        }
        if workflow.state != EditState::Idle {
            return Err(WorkflowError::Busy {
                document_id: document_id.clone(),
            });
        }
        workflow.transition(EditState::Planning)
    }

    /// Abandon planning without a proposal
    ///
    /// # Errors
    /// [`WorkflowError::IllegalTransition`] unless the workflow is planning.
    pub fn abandon(&self, document_id: &DocumentId) -> Result<(), WorkflowError> {
        let mut workflow = self.workflow_mut(document_id)?;
        workflow.transition(EditState::Idle)
    }

    /// Record a proposal for review, snapshotting the live document
    ///
    /// # Errors
    /// Fails when the workflow is not planning or the document cannot be read.
    pub async fn propose(
        &self,
        document_id: &DocumentId,
        user_id: &str,
        content: impl Into<String>,
        placement: EditPlacement,
    ) -> Result<EditProposal, WorkflowError> {
        if self.state(document_id) != EditState::Planning {
            return Err(WorkflowError::IllegalTransition {
                from: self.state(document_id),
                to: EditState::PreviewReady,
            });
        }

        let live = self.documents.get_document(document_id, user_id).await?;
        let proposal = EditProposal {
            id: Ulid::new().to_string(),
            document_id: document_id.clone(),
            content: content.into(),
            placement,
            snapshot: ContentSnapshot::of(&live.plain_text),
            created_at: Utc::now(),
        };

        let mut workflow = self.workflow_mut(document_id)?;
        workflow.transition(EditState::PreviewReady)?;
        workflow.proposal = Some(proposal.clone());
        tracing::info!(document = %document_id, proposal = %proposal.id, "edit proposal ready");
        Ok(proposal)
    }

    /// Apply the pending proposal
    ///
    /// On conflict or store failure the workflow returns to
    /// `preview_ready` so the apply can be retried or discarded.
    ///
    /// # Errors
    /// - [`WorkflowError::Busy`] when an apply is already in flight
    /// - [`WorkflowError::UnknownProposal`] when `proposal_id` is stale
    /// - [`WorkflowError::Conflict`] when the document changed
    /// - [`WorkflowError::TargetMissing`] when the placement cannot be found
    pub async fn apply(
        &self,
        document_id: &DocumentId,
        user_id: &str,
        proposal_id: &str,
    ) -> Result<Document, WorkflowError> {
        let proposal = {
            let mut workflow = self.workflow_mut(document_id)?;
            if workflow.state == EditState::Applying {
                return Err(WorkflowError::Busy {
                    document_id: document_id.clone(),
                });
            }
            let proposal = match &workflow.proposal {
                Some(p) if p.id == proposal_id => p.clone(),
                _ => {
                    return Err(WorkflowError::UnknownProposal {
                        proposal_id: proposal_id.to_string(),
                    })
                }
            };
            workflow.transition(EditState::Applying)?;
            proposal
        };

        match self.write(&proposal, user_id).await {
            Ok(document) => {
                let mut workflow = self.workflow_mut(document_id)?;
                workflow.transition(EditState::Applied)?;
                workflow.proposal = None;
                tracing::info!(document = %document_id, proposal = %proposal.id, "edit applied");
                Ok(document)
            }
            Err(err) => {
                let mut workflow = self.workflow_mut(document_id)?;
                workflow.transition(EditState::PreviewReady)?;
                tracing::warn!(document = %document_id, error = %err, "edit apply failed");
                Err(err)
            }
        }
    }

    /// Discard the pending proposal or abandon a planning workflow
    ///
    /// # Errors
    /// [`WorkflowError::IllegalTransition`] when nothing is pending.
    pub fn discard(&self, document_id: &DocumentId) -> Result<(), WorkflowError> {
        let mut workflow = self.workflow_mut(document_id)?;
        workflow.transition(EditState::Discarded)?;
        workflow.proposal = None;
        Ok(())
    }

    async fn write(&self, proposal: &EditProposal, user_id: &str) -> Result<Document, WorkflowError> {
        let live = self
            .documents
            .get_document(&proposal.document_id, user_id)
            .await?;
        if !proposal.snapshot.matches(&live.plain_text) {
            return Err(WorkflowError::Conflict {
                document_id: proposal.document_id.clone(),
            });
        }
        let merged = proposal
            .placement
            .merge(&live.plain_text, &proposal.content)
            .ok_or_else(|| WorkflowError::TargetMissing {
                document_id: proposal.document_id.clone(),
            })?;
        let html = markdown::to_html(&merged);
        let patch = DocumentPatch::content(merged, html);
        Ok(self
            .documents
            .update_document(&proposal.document_id, patch)
            .await?)
    }

    fn workflow_mut(
        &self,
        document_id: &DocumentId,
    ) -> Result<dashmap::mapref::one::RefMut<'_, DocumentId, Workflow>, WorkflowError> {
        self.workflows
            .get_mut(document_id)
            .ok_or_else(|| WorkflowError::NoWorkflow {
                document_id: document_id.clone(),
            })
    }
}

impl fmt::Debug for EditCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditCoordinator")
            .field("workflows", &self.workflows.len())
            .finish_non_exhaustive()
    }
}
