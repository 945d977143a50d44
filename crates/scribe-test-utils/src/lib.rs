//! Testing utilities for the Scribe workspace
//!
//! Scripted model and search clients, a recording observer, and document
//! fixtures wired into a ready-to-use orchestrator.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use scribe_core::{
    CallPurpose, CompletionRequest, DocumentStore, InMemoryDocumentStore, LlmClient, LlmError,
    Orchestrator, OrchestratorBuilder, OrchestratorSession, PipelineEvent, PipelineObserver,
    PipelineStage, ScribeConfig,
};
use scribe_retrieval::{
    EvidenceStore, InMemoryEvidenceStore, RetrievalError, SearchOptions, WebSearchClient,
    WebSearchOptions,
};
use scribe_types::{
    Constraints, ContextRef, DocContext, Document, DocumentId, EvidenceChunk, InstructionJson,
    Needs, Precision, QueryPlan, RefKind, RouterDecision, Target, TaskInputs, TaskKind, Telemetry,
    WebContext, WebResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const OWNER: &str = "alice";
pub const REPORT_ID: &str = "report";
pub const NOTES_ID: &str = "notes";

pub const REPORT: &str = "Quarterly revenue grew 12% to $4.1M, driven by enterprise renewals.\n\n\
    Hiring slowed in the second half while the team focused on retention.\n\n\
    Quarterly revenue in EMEA doubled after the new pricing launched.";

pub const NOTES: &str = "Meeting notes: the board asked for a revenue forecast by region.\n\n\
    Action item: draft the pricing memo before the offsite.";

// ============================================================================
// Language model
// ============================================================================

/// Model client answering from a per-purpose script
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<HashMap<CallPurpose, Result<String, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `text` to every call of `purpose`
    #[must_use]
    pub fn reply(self, purpose: CallPurpose, text: impl Into<String>) -> Self {
        self.replies.lock().insert(purpose, Ok(text.into()));
        self
    }

    /// Fail every call of `purpose`
    #[must_use]
    pub fn fail(self, purpose: CallPurpose, err: LlmError) -> Self {
        self.replies.lock().insert(purpose, Err(err));
        self
    }

    /// Fail every call
    pub fn failing(err: LlmError) -> Self {
        Self::new()
            .fail(CallPurpose::Route, err.clone())
            .fail(CallPurpose::Plan, err.clone())
            .fail(CallPurpose::Generate, err)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self, purpose: CallPurpose) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.options.purpose == purpose)
            .count()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let purpose = request.options.purpose;
        self.requests.lock().push(request);
        self.replies
            .lock()
            .get(&purpose)
            .cloned()
            .unwrap_or_else(|| Err(LlmError::Response(format!("no scripted reply for {purpose:?}"))))
    }
}

/// Router decision with model origin and confidence 0.9
pub fn decision(task: TaskKind, ask: &str, doc: DocContext, web: WebContext) -> RouterDecision {
    RouterDecision {
        task,
        confidence: 0.9,
        needs: Needs {
            selection_text: false,
            doc_context: doc,
            web_context: web,
            precision: Precision::Medium,
        },
        query: QueryPlan {
            semantic: ask.to_string(),
            keywords: Vec::new(),
        },
        targets: Vec::new(),
        origin: scribe_types::DecisionOrigin::Model,
    }
}

/// Router decision anchored on the selection
pub fn selection_decision(task: TaskKind, ask: &str) -> RouterDecision {
    let mut decision = decision(task, ask, DocContext::Current, WebContext::No);
    decision.needs.selection_text = true;
    decision.targets = vec![Target::selection()];
    decision
}

/// Router output as the model would emit it
pub fn router_reply(decision: &RouterDecision) -> String {
    serde_json::to_string(decision).unwrap()
}

/// Planner output referencing evidence by alias (`D1`, `W1`, ...)
pub fn plan_reply(task: TaskKind, target_text: &str, aliases: &[&str]) -> String {
    let context_refs = aliases
        .iter()
        .map(|alias| ContextRef {
            kind: if alias.starts_with('W') {
                RefKind::Web
            } else {
                RefKind::Doc
            },
            id: (*alias).to_string(),
            why: "supports the answer".to_string(),
        })
        .collect();
    serde_json::to_string(&InstructionJson {
        inputs: TaskInputs::minimal(task, target_text),
        targets: Vec::new(),
        context_refs,
        constraints: Constraints::default(),
        telemetry: Telemetry::default(),
    })
    .unwrap()
}

// ============================================================================
// Evidence and web search
// ============================================================================

/// Web search returning fixed results and counting calls
#[derive(Default)]
pub struct StaticWebSearch {
    results: Vec<WebResult>,
    calls: AtomicUsize,
}

impl StaticWebSearch {
    pub fn new(results: Vec<WebResult>) -> Self {
        Self {
            results,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearchClient for StaticWebSearch {
    async fn search(
        &self,
        _query: &str,
        options: &WebSearchOptions,
    ) -> Result<Vec<WebResult>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.iter().take(options.max_results).cloned().collect())
    }
}

/// Web search that answers only after `delay`, unless cancelled first
pub struct SlowWebSearch {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowWebSearch {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearchClient for SlowWebSearch {
    async fn search(
        &self,
        _query: &str,
        options: &WebSearchOptions,
    ) -> Result<Vec<WebResult>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            () = options.cancel.cancelled() => Err(RetrievalError::Cancelled),
            () = tokio::time::sleep(self.delay) => Ok(vec![stock_result()]),
        }
    }
}

/// Web search whose every call fails
#[derive(Debug, Default)]
pub struct FailingWebSearch {
    calls: AtomicUsize,
}

impl FailingWebSearch {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearchClient for FailingWebSearch {
    async fn search(
        &self,
        _query: &str,
        _options: &WebSearchOptions,
    ) -> Result<Vec<WebResult>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RetrievalError::WebSearch("provider returned 500".to_string()))
    }
}

/// Evidence store whose every search fails
#[derive(Debug, Default)]
pub struct FailingEvidenceStore;

#[async_trait]
impl EvidenceStore for FailingEvidenceStore {
    async fn search(
        &self,
        _query: &str,
        _options: &SearchOptions,
    ) -> Result<Vec<EvidenceChunk>, RetrievalError> {
        Err(RetrievalError::Store("index offline".to_string()))
    }
}

pub fn stock_result() -> WebResult {
    WebResult::new(
        "ACME shares close higher",
        "https://markets.test/acme",
        "ACME stock closed at $182.40 on Friday.",
    )
    .with_published_date(Utc.with_ymd_and_hms(2026, 10, 16, 20, 0, 0).unwrap())
}

// ============================================================================
// Observer
// ============================================================================

/// Observer keeping every event
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().clone()
    }

    pub fn degraded_stages(&self) -> Vec<PipelineStage> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Degraded { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        self.events.lock().push(event.clone());
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Evidence store holding the report and the notes
pub fn fixture_evidence() -> Arc<InMemoryEvidenceStore> {
    let store = Arc::new(InMemoryEvidenceStore::new());
    store.index_document(&DocumentId::new(REPORT_ID), REPORT);
    store.index_document(&DocumentId::new(NOTES_ID), NOTES);
    store
}

/// Document store holding the report and the notes, owned by [`OWNER`]
pub fn fixture_documents() -> Arc<InMemoryDocumentStore> {
    let store = Arc::new(InMemoryDocumentStore::new());
    store.insert(Document::new(REPORT_ID, OWNER, "Q3 Report", REPORT));
    store.insert(Document::new(NOTES_ID, OWNER, "Board Notes", NOTES));
    store
}

pub fn session() -> OrchestratorSession {
    OrchestratorSession::new("session-1", OWNER, 20)
}

/// Orchestrator over the fixtures with a recording observer
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub llm: Arc<ScriptedLlm>,
    pub observer: Arc<RecordingObserver>,
    pub documents: Arc<InMemoryDocumentStore>,
}

impl Harness {
    pub fn new(llm: ScriptedLlm) -> Self {
        Self::build(llm, fixture_evidence(), None, ScribeConfig::default())
    }

    pub fn with_web(llm: ScriptedLlm, web: Arc<dyn WebSearchClient>) -> Self {
        Self::build(llm, fixture_evidence(), Some(web), ScribeConfig::default())
    }

    pub fn build(
        llm: ScriptedLlm,
        evidence: Arc<dyn EvidenceStore>,
        web: Option<Arc<dyn WebSearchClient>>,
        config: ScribeConfig,
    ) -> Self {
        let llm = Arc::new(llm);
        let observer = Arc::new(RecordingObserver::default());
        let documents = fixture_documents();
        let document_store: Arc<dyn DocumentStore> = documents.clone();

        let mut builder = OrchestratorBuilder::new(config, llm.clone(), evidence, document_store)
            .with_observer(observer.clone());
        if let Some(web) = web {
            builder = builder.with_web_search(web);
        }

        Self {
            orchestrator: builder.build().unwrap(),
            llm,
            observer,
            documents,
        }
    }
}
