//! Request and response surface
//!
//! Field names follow the camelCase wire format used by the editor front end.

use crate::document::EditPlacement;
use crate::evidence::DocumentId;
use crate::history::Turn;
use crate::task::TaskKind;
use serde::{Deserialize, Serialize};

/// Default generation token budget
pub const DEFAULT_MAX_TOKENS: usize = 2000;

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

/// One user request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// The user ask
    pub message: String,
    /// Current document scope
    #[serde(default)]
    pub document_id: Option<DocumentId>,
    /// Highlighted text
    #[serde(default)]
    pub selection: Option<String>,
    /// Whether web search may be used
    #[serde(default)]
    pub use_web_search: bool,
    /// Generation token budget
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Prior turns supplied by the caller
    #[serde(default)]
    pub conversation_history: Vec<Turn>,
    /// Documents to link to the session
    #[serde(default)]
    pub linked_documents: Vec<DocumentId>,
}

impl QueryRequest {
    /// Create request for a message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            document_id: None,
            selection: None,
            use_web_search: false,
            max_tokens: DEFAULT_MAX_TOKENS,
            conversation_history: Vec::new(),
            linked_documents: Vec::new(),
        }
    }

    /// With current document
    #[inline]
    #[must_use]
    pub fn with_document(mut self, id: impl Into<DocumentId>) -> Self {
        self.document_id = Some(id.into());
        self
    }

    /// With selection
    #[inline]
    #[must_use]
    pub fn with_selection(mut self, selection: impl Into<String>) -> Self {
        self.selection = Some(selection.into());
        self
    }

    /// With web search toggle
    #[inline]
    #[must_use]
    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.use_web_search = enabled;
        self
    }

    /// With token budget
    #[inline]
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// With linked documents
    #[must_use]
    pub fn with_linked_documents<I, D>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<DocumentId>,
    {
        self.linked_documents = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Non-blank selection, if any
    #[must_use]
    pub fn selection_text(&self) -> Option<&str> {
        self.selection.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Evidence sources that reached the generator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesUsed {
    /// Chunks from the current document
    pub current_document: usize,
    /// Chunks from linked documents
    pub linked_documents: usize,
    /// Web results
    pub web: usize,
}

impl SourcesUsed {
    /// Total number of sources
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.current_document + self.linked_documents + self.web
    }

    /// Whether any document chunk was used
    #[inline]
    #[must_use]
    pub fn uses_documents(&self) -> bool {
        self.current_document + self.linked_documents > 0
    }

    /// Whether any web result was used
    #[inline]
    #[must_use]
    pub fn uses_web(&self) -> bool {
        self.web > 0
    }
}

/// Advisory verification outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Whether no problems were found
    pub is_valid: bool,
    /// Human-readable warnings
    pub warnings: Vec<String>,
}

impl VerificationResult {
    /// Build from warnings; valid when there are none
    #[must_use]
    pub fn from_warnings(warnings: Vec<String>) -> Self {
        Self {
            is_valid: warnings.is_empty(),
            warnings,
        }
    }
}

/// Response metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Routed task
    pub task: TaskKind,
    /// Retrieval confidence
    pub rag_confidence: f32,
    /// Evidence coverage
    pub coverage: f32,
    /// Sources that reached the generator
    pub sources_used: SourcesUsed,
    /// Wall time for the request
    pub processing_time_ms: u64,
    /// Whether the content should be written into the document
    pub should_trigger_live_edit: bool,
}

/// Result of one processed query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorResponse {
    /// Full answer, or a short status line when live edit triggers
    pub content: String,
    /// Human-readable source titles
    pub citations: Vec<String>,
    /// Metadata
    pub metadata: ResponseMetadata,
    /// Verification outcome
    pub verification: VerificationResult,
    /// Content to insert into the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_edit_content: Option<String>,
    /// Where the live edit content belongs in the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_edit_placement: Option<EditPlacement>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_defaults_from_minimal_json() {
        let request: QueryRequest = serde_json::from_value(json!({ "message": "hi" })).unwrap();
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(!request.use_web_search);
        assert!(request.linked_documents.is_empty());
    }

    #[test]
    fn request_reads_camel_case() {
        let request: QueryRequest = serde_json::from_value(json!({
            "message": "hi",
            "documentId": "d1",
            "useWebSearch": true,
            "linkedDocuments": ["a", "b"],
            "conversationHistory": [{ "role": "user", "content": "earlier" }]
        }))
        .unwrap();
        assert_eq!(request.document_id, Some(DocumentId::new("d1")));
        assert!(request.use_web_search);
        assert_eq!(request.linked_documents.len(), 2);
        assert_eq!(request.conversation_history.len(), 1);
    }

    #[test]
    fn blank_selection_is_ignored() {
        let request = QueryRequest::new("x").with_selection("  \n");
        assert!(request.selection_text().is_none());
    }

    #[test]
    fn live_edit_content_omitted_when_absent() {
        let response = OrchestratorResponse {
            content: "answer".into(),
            citations: vec![],
            metadata: ResponseMetadata {
                task: TaskKind::Summarize,
                rag_confidence: 0.0,
                coverage: 0.0,
                sources_used: SourcesUsed::default(),
                processing_time_ms: 3,
                should_trigger_live_edit: false,
            },
            verification: VerificationResult::from_warnings(vec![]),
            live_edit_content: None,
            live_edit_placement: None,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("liveEditContent").is_none());
        assert!(value.get("liveEditPlacement").is_none());
        assert_eq!(value["metadata"]["shouldTriggerLiveEdit"], false);
        assert_eq!(value["verification"]["isValid"], true);
    }
}
