//! End-to-end retrieval over the in-memory store

use async_trait::async_trait;
use scribe_retrieval::{
    pack, score, ContextRetriever, InMemoryEvidenceStore, RelevanceGate, RetrievalError,
    RetrievalRequest, RetrieverConfig, TokenBudget, WebSearchClient, WebSearchOptions,
};
use scribe_types::{
    DocContext, DocumentId, LinkedDocumentSet, Needs, Precision, QueryPlan, RouterDecision,
    TaskKind, WebContext, WebResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const REPORT: &str = "Quarterly revenue grew 12% to $4.1M, driven by enterprise renewals.\n\n\
    Hiring slowed in the second half while the team focused on retention.\n\n\
    Quarterly revenue in EMEA doubled after the new pricing launched.";

struct NeverAnswers {
    calls: AtomicUsize,
}

#[async_trait]
impl WebSearchClient for NeverAnswers {
    async fn search(
        &self,
        _query: &str,
        options: &WebSearchOptions,
    ) -> Result<Vec<WebResult>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        options.cancel.cancelled().await;
        Err(RetrievalError::Cancelled)
    }
}

fn decision(ask: &str, web: WebContext) -> RouterDecision {
    RouterDecision {
        task: TaskKind::Summarize,
        confidence: 0.8,
        needs: Needs {
            selection_text: false,
            doc_context: DocContext::Current,
            web_context: web,
            precision: Precision::Medium,
        },
        query: QueryPlan {
            semantic: ask.to_string(),
            keywords: Vec::new(),
        },
        targets: Vec::new(),
        origin: Default::default(),
    }
}

#[tokio::test]
async fn document_question_packs_document_evidence() {
    let store = Arc::new(InMemoryEvidenceStore::new());
    let doc = DocumentId::new("report");
    store.index_document(&doc, REPORT);

    let retriever = ContextRetriever::new(store, RelevanceGate::default(), RetrieverConfig::default());
    let ask = "What does my document say about quarterly revenue?";
    let decision = decision(ask, WebContext::No);
    let linked = LinkedDocumentSet::new();

    let context = retriever
        .retrieve(
            RetrievalRequest {
                decision: &decision,
                ask,
                has_selection: false,
                current_document: Some(&doc),
                linked_documents: &linked,
                web_enabled: false,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(context.rag_chunks.len(), 2);
    let bundle = pack(
        context.rag_chunks,
        context.web_results,
        TokenBudget::from_max_tokens(2000, 0.7, 0.15),
    );
    let scores = score(&bundle, decision.task);
    assert_eq!(bundle.chunks.len(), 2);
    assert!(scores.confidence > 0.5);
}

#[tokio::test(start_paused = true)]
async fn stalled_web_search_times_out_empty() {
    let store = Arc::new(InMemoryEvidenceStore::new());
    let web = Arc::new(NeverAnswers {
        calls: AtomicUsize::new(0),
    });
    let retriever = ContextRetriever::new(store, RelevanceGate::default(), RetrieverConfig::default())
        .with_web_search(web.clone());

    let ask = "What is Tesla's current stock price?";
    let decision = decision(ask, WebContext::Recommended);
    let doc = DocumentId::new("report");
    let linked = LinkedDocumentSet::new();

    let context = retriever
        .retrieve(
            RetrievalRequest {
                decision: &decision,
                ask,
                has_selection: false,
                current_document: Some(&doc),
                linked_documents: &linked,
                web_enabled: true,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(context.web_attempted);
    assert!(context.web_results.is_empty());
    assert_eq!(web.calls.load(Ordering::SeqCst), 1);
}
