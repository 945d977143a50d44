//! Context retriever
//!
//! Gathers document chunks and web results for one request:
//! - nothing from documents unless the relevance gate finds the ask
//!   document-relevant
//! - the current document, unless the router asked for linked documents only
//! - each linked document with its own scoped search, concurrently
//! - web search when enabled, wanted, and document evidence is weak or the
//!   router requires it
//!
//! Store and web failures degrade to "no evidence from that source". Caller
//! cancellation discards partial evidence.

use crate::error::RetrievalError;
use crate::gate::{GateVerdict, RelevanceGate};
use crate::pack::confidence;
use crate::store::{EvidenceStore, SearchOptions};
use crate::web::{clamp_web_timeout, search_bounded, WebSearchClient};
use futures::future::join_all;
use scribe_types::{
    DocContext, DocumentId, EvidenceChunk, LinkedDocumentSet, RouterDecision, WebContext, WebResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retriever configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrieverConfig {
    /// Chunks requested per search
    pub top_k: usize,
    /// Web search timeout in milliseconds, clamped to 3500..=5000
    pub web_timeout_ms: u64,
    /// Maximum web results per request
    pub max_web_results: usize,
    /// Document confidence below which web search is attempted
    pub low_confidence_threshold: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 15,
            web_timeout_ms: 4000,
            max_web_results: 5,
            low_confidence_threshold: 0.5,
        }
    }
}

impl RetrieverConfig {
    /// Effective web timeout
    #[inline]
    #[must_use]
    pub fn web_timeout(&self) -> Duration {
        clamp_web_timeout(Duration::from_millis(self.web_timeout_ms))
    }
}

/// What the retriever needs to know about a request
#[derive(Debug, Clone, Copy)]
pub struct RetrievalRequest<'a> {
    /// Router decision for the request
    pub decision: &'a RouterDecision,
    /// The user's ask
    pub ask: &'a str,
    /// Whether a non-empty selection accompanies the ask
    pub has_selection: bool,
    /// Document open in the editor, if any
    pub current_document: Option<&'a DocumentId>,
    /// Documents linked to the session
    pub linked_documents: &'a LinkedDocumentSet,
    /// Whether the user allowed web search
    pub web_enabled: bool,
}

/// Evidence gathered for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievedContext {
    /// Current-document chunks first, then linked-document chunks; each group
    /// ranked by descending score
    pub rag_chunks: Vec<EvidenceChunk>,
    /// Web results
    pub web_results: Vec<WebResult>,
    /// Gate verdict, when the gate was consulted
    pub gate: Option<GateVerdict>,
    /// Whether web search was attempted
    pub web_attempted: bool,
}

impl RetrievedContext {
    /// Whether nothing was found
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rag_chunks.is_empty() && self.web_results.is_empty()
    }
}

/// Context retriever
#[derive(Clone)]
pub struct ContextRetriever {
    store: Arc<dyn EvidenceStore>,
    web: Option<Arc<dyn WebSearchClient>>,
    gate: RelevanceGate,
    config: RetrieverConfig,
}

impl ContextRetriever {
    /// Create retriever without web search
    #[must_use]
    pub fn new(store: Arc<dyn EvidenceStore>, gate: RelevanceGate, config: RetrieverConfig) -> Self {
        Self {
            store,
            web: None,
            gate,
            config,
        }
    }

    /// Attach a web search client
    #[inline]
    #[must_use]
    pub fn with_web_search(mut self, web: Arc<dyn WebSearchClient>) -> Self {
        self.web = Some(web);
        self
    }

    /// Retriever configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Gather evidence for a request
    ///
    /// # Errors
    /// Returns [`RetrievalError::Cancelled`] when `cancel` fires; every other
    /// failure degrades to an empty contribution.
    pub async fn retrieve(
        &self,
        request: RetrievalRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<RetrievedContext, RetrievalError> {
        let documents = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RetrievalError::Cancelled),
            documents = self.retrieve_documents(&request) => documents,
        };
        let (rag_chunks, gate) = documents;

        let mut context = RetrievedContext {
            rag_chunks,
            gate,
            ..RetrievedContext::default()
        };

        if self.should_search_web(&request, &context.rag_chunks) {
            if let Some(web) = &self.web {
                context.web_attempted = true;
                context.web_results = search_bounded(
                    web.as_ref(),
                    search_query(&request),
                    self.config.max_web_results,
                    self.config.web_timeout(),
                    cancel,
                )
                .await?;
            }
        }

        tracing::info!(
            task = %request.decision.task,
            chunks = context.rag_chunks.len(),
            web_results = context.web_results.len(),
            web_attempted = context.web_attempted,
            gate = ?context.gate.map(|g| g.reason),
            "retrieved context"
        );
        Ok(context)
    }

    async fn retrieve_documents(
        &self,
        request: &RetrievalRequest<'_>,
    ) -> (Vec<EvidenceChunk>, Option<GateVerdict>) {
        let needs = &request.decision.needs;
        let query = search_query(request);

        if needs.doc_context == DocContext::None {
            return (Vec::new(), None);
        }
        let verdict = self
            .gate
            .assess(request.decision, request.ask, request.has_selection);
        if !verdict.document_relevant {
            return (Vec::new(), Some(verdict));
        }

        let mut current = match (needs.doc_context, request.current_document) {
            (DocContext::Current | DocContext::All, Some(id)) => {
                self.search_scoped(query, SearchOptions::document(id.clone(), self.config.top_k))
                    .await
            }
            (DocContext::All, None) => {
                self.search_scoped(query, SearchOptions::all(self.config.top_k))
                    .await
            }
            _ => Vec::new(),
        };
        sort_by_score(&mut current);

        let mut linked = Vec::new();
        if matches!(needs.doc_context, DocContext::Linked | DocContext::All) {
            let searches = request
                .linked_documents
                .iter()
                .filter(|id| Some(*id) != request.current_document)
                .map(|id| {
                    self.search_scoped(query, SearchOptions::document(id.clone(), self.config.top_k))
                });
            linked = join_all(searches).await.into_iter().flatten().collect();
            sort_by_score(&mut linked);
        }

        current.extend(linked);
        (current, Some(verdict))
    }

    async fn search_scoped(&self, query: &str, options: SearchOptions) -> Vec<EvidenceChunk> {
        match self.store.search(query, &options).await {
            Ok(chunks) => chunks,
            Err(err) => {
                tracing::warn!(error = %err, scope = ?options.scope, "evidence search failed");
                Vec::new()
            }
        }
    }

    fn should_search_web(&self, request: &RetrievalRequest<'_>, chunks: &[EvidenceChunk]) -> bool {
        let web_context = request.decision.needs.web_context;
        if !request.web_enabled || web_context == WebContext::No || self.web.is_none() {
            return false;
        }
        web_context == WebContext::Required
            || confidence(chunks) < self.config.low_confidence_threshold
    }
}

impl std::fmt::Debug for ContextRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRetriever")
            .field("web", &self.web.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn search_query<'a>(request: &RetrievalRequest<'a>) -> &'a str {
    let semantic = request.decision.query.semantic.trim();
    if semantic.is_empty() {
        request.ask
    } else {
        semantic
    }
}

fn sort_by_score(chunks: &mut [EvidenceChunk]) {
    chunks.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SearchScope;
    use crate::web::WebSearchOptions;
    use async_trait::async_trait;
    use mockall::mock;
    use pretty_assertions::assert_eq;
    use scribe_types::{Needs, Precision, QueryPlan, TaskKind};

    mock! {
        Store {}

        #[async_trait]
        impl EvidenceStore for Store {
            async fn search(
                &self,
                query: &str,
                options: &SearchOptions,
            ) -> Result<Vec<EvidenceChunk>, RetrievalError>;
        }
    }

    mock! {
        Web {}

        #[async_trait]
        impl WebSearchClient for Web {
            async fn search(
                &self,
                query: &str,
                options: &WebSearchOptions,
            ) -> Result<Vec<WebResult>, RetrievalError>;
        }
    }

    fn decision(doc: DocContext, web: WebContext) -> RouterDecision {
        RouterDecision {
            task: TaskKind::Summarize,
            confidence: 0.9,
            needs: Needs {
                selection_text: false,
                doc_context: doc,
                web_context: web,
                precision: Precision::Medium,
            },
            query: QueryPlan {
                semantic: "quarterly revenue".into(),
                keywords: vec!["revenue".into()],
            },
            targets: Vec::new(),
            origin: Default::default(),
        }
    }

    fn hits(doc: &str, scores: &[f32]) -> Vec<EvidenceChunk> {
        scores
            .iter()
            .enumerate()
            .map(|(i, s)| EvidenceChunk::new(format!("{doc}#{i}"), doc, "revenue text", *s))
            .collect()
    }

    fn retriever(store: MockStore, web: Option<MockWeb>) -> ContextRetriever {
        let base = ContextRetriever::new(
            Arc::new(store),
            RelevanceGate::default(),
            RetrieverConfig::default(),
        );
        match web {
            Some(web) => base.with_web_search(Arc::new(web)),
            None => base,
        }
    }

    #[test]
    fn config_clamps_timeout() {
        let config = RetrieverConfig {
            web_timeout_ms: 100,
            ..RetrieverConfig::default()
        };
        assert_eq!(config.web_timeout(), Duration::from_millis(3500));
    }

    #[tokio::test]
    async fn personal_ask_searches_current_document_only() {
        let mut store = MockStore::new();
        store
            .expect_search()
            .withf(|_, o| o.scope == SearchScope::Document(DocumentId::new("cur")))
            .times(1)
            .returning(|_, _| Ok(hits("cur", &[0.4, 0.9])));
        let mut web = MockWeb::new();
        web.expect_search().times(0);

        let decision = decision(DocContext::Current, WebContext::No);
        let current = DocumentId::new("cur");
        let linked = LinkedDocumentSet::new();
        let request = RetrievalRequest {
            decision: &decision,
            ask: "What does my document say about quarterly revenue?",
            has_selection: false,
            current_document: Some(&current),
            linked_documents: &linked,
            web_enabled: true,
        };

        let context = retriever(store, Some(web))
            .retrieve(request, &CancellationToken::new())
            .await
            .unwrap();
        let scores: Vec<f32> = context.rag_chunks.iter().map(|c| c.relevance_score).collect();
        assert_eq!(scores, vec![0.9, 0.4]);
        assert!(context.gate.is_some_and(|g| g.document_relevant));
        assert!(!context.web_attempted);
    }

    #[tokio::test]
    async fn current_info_ask_skips_documents_and_searches_web() {
        let mut store = MockStore::new();
        store.expect_search().times(0);
        let mut web = MockWeb::new();
        web.expect_search()
            .times(1)
            .returning(|_, _| Ok(vec![WebResult::new("TSLA", "https://q/tsla", "price")]));

        let decision = decision(DocContext::Current, WebContext::Recommended);
        let current = DocumentId::new("cur");
        let linked = LinkedDocumentSet::new();
        let request = RetrievalRequest {
            decision: &decision,
            ask: "What is Tesla's current stock price?",
            has_selection: false,
            current_document: Some(&current),
            linked_documents: &linked,
            web_enabled: true,
        };

        let context = retriever(store, Some(web))
            .retrieve(request, &CancellationToken::new())
            .await
            .unwrap();
        assert!(context.rag_chunks.is_empty());
        assert_eq!(context.web_results.len(), 1);
        assert!(context.web_attempted);
    }

    #[tokio::test]
    async fn linked_documents_follow_current_and_skip_duplicates() {
        let mut store = MockStore::new();
        store.expect_search().times(3).returning(|_, o| match &o.scope {
            SearchScope::Document(id) if id.as_str() == "cur" => Ok(hits("cur", &[0.2])),
            SearchScope::Document(id) if id.as_str() == "l1" => Ok(hits("l1", &[0.5])),
            SearchScope::Document(id) if id.as_str() == "l2" => Ok(hits("l2", &[0.8])),
            _ => Ok(Vec::new()),
        });

        let decision = decision(DocContext::All, WebContext::No);
        let current = DocumentId::new("cur");
        let mut linked = LinkedDocumentSet::new();
        linked.add("l1");
        linked.add("cur");
        linked.add("l2");
        let request = RetrievalRequest {
            decision: &decision,
            ask: "compare the plans in my notes",
            has_selection: false,
            current_document: Some(&current),
            linked_documents: &linked,
            web_enabled: false,
        };

        let context = retriever(store, None)
            .retrieve(request, &CancellationToken::new())
            .await
            .unwrap();
        let ids: Vec<&str> = context.rag_chunks.iter().map(|c| c.document_id.as_str()).collect();
        assert_eq!(ids, vec!["cur", "l2", "l1"]);
    }

    #[tokio::test]
    async fn linked_only_skips_current_document() {
        let mut store = MockStore::new();
        store
            .expect_search()
            .withf(|_, o| o.scope == SearchScope::Document(DocumentId::new("l1")))
            .times(1)
            .returning(|_, _| Ok(hits("l1", &[0.9])));

        let decision = decision(DocContext::Linked, WebContext::No);
        let current = DocumentId::new("cur");
        let mut linked = LinkedDocumentSet::new();
        linked.add("l1");
        let request = RetrievalRequest {
            decision: &decision,
            ask: "what do my notes say",
            has_selection: false,
            current_document: Some(&current),
            linked_documents: &linked,
            web_enabled: false,
        };

        let context = retriever(store, None)
            .retrieve(request, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(context.rag_chunks.len(), 1);
        assert!(context.gate.is_some_and(|g| g.document_relevant));
    }

    #[tokio::test]
    async fn all_without_document_searches_everything() {
        let mut store = MockStore::new();
        store
            .expect_search()
            .withf(|_, o| o.scope == SearchScope::All)
            .times(1)
            .returning(|_, _| Ok(hits("x", &[0.6])));

        let decision = decision(DocContext::All, WebContext::No);
        let linked = LinkedDocumentSet::new();
        let request = RetrievalRequest {
            decision: &decision,
            ask: "summarize my documents",
            has_selection: false,
            current_document: None,
            linked_documents: &linked,
            web_enabled: false,
        };
        let context = retriever(store, None)
            .retrieve(request, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(context.rag_chunks.len(), 1);
    }

    #[tokio::test]
    async fn store_failure_degrades_to_empty() {
        let mut store = MockStore::new();
        store
            .expect_search()
            .returning(|_, _| Err(RetrievalError::Store("index offline".into())));

        let decision = decision(DocContext::All, WebContext::No);
        let current = DocumentId::new("cur");
        let linked = LinkedDocumentSet::new();
        let request = RetrievalRequest {
            decision: &decision,
            ask: "summarize this document",
            has_selection: false,
            current_document: Some(&current),
            linked_documents: &linked,
            web_enabled: false,
        };
        let context = retriever(store, None)
            .retrieve(request, &CancellationToken::new())
            .await
            .unwrap();
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn strong_evidence_skips_recommended_web() {
        let mut store = MockStore::new();
        store.expect_search().returning(|_, _| Ok(hits("cur", &[0.9, 0.8])));
        let mut web = MockWeb::new();
        web.expect_search().times(0);

        let decision = decision(DocContext::All, WebContext::Recommended);
        let current = DocumentId::new("cur");
        let linked = LinkedDocumentSet::new();
        let request = RetrievalRequest {
            decision: &decision,
            ask: "summarize this document",
            has_selection: false,
            current_document: Some(&current),
            linked_documents: &linked,
            web_enabled: true,
        };
        let context = retriever(store, Some(web))
            .retrieve(request, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!context.web_attempted);
    }

    #[tokio::test]
    async fn disabled_web_is_never_called() {
        let mut store = MockStore::new();
        store.expect_search().times(0);
        let mut web = MockWeb::new();
        web.expect_search().times(0);

        let decision = decision(DocContext::None, WebContext::Required);
        let linked = LinkedDocumentSet::new();
        let request = RetrievalRequest {
            decision: &decision,
            ask: "latest news",
            has_selection: false,
            current_document: None,
            linked_documents: &linked,
            web_enabled: false,
        };
        let context = retriever(store, Some(web))
            .retrieve(request, &CancellationToken::new())
            .await
            .unwrap();
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn cancelled_request_returns_error() {
        let mut store = MockStore::new();
        store.expect_search().returning(|_, _| Ok(hits("cur", &[0.9])));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let decision = decision(DocContext::All, WebContext::No);
        let current = DocumentId::new("cur");
        let linked = LinkedDocumentSet::new();
        let request = RetrievalRequest {
            decision: &decision,
            ask: "summarize this document",
            has_selection: false,
            current_document: Some(&current),
            linked_documents: &linked,
            web_enabled: false,
        };
        let err = retriever(store, None).retrieve(request, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
