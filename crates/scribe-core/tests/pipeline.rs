//! End-to-end pipeline runs over the fixture documents

use async_trait::async_trait;
use mockall::mock;
use pretty_assertions::assert_eq;
use scribe_core::{
    CallPurpose, EditState, LlmError, PipelineEvent, PipelineStage, ScribeConfig, ScribeError,
    GENERAL_KNOWLEDGE_WARNING,
};
use scribe_retrieval::{GateReason, RetrievalError, WebSearchClient, WebSearchOptions};
use scribe_test_utils::{
    decision, fixture_evidence, plan_reply, router_reply, selection_decision, session,
    stock_result, FailingEvidenceStore, FailingWebSearch, Harness, ScriptedLlm, SlowWebSearch,
    StaticWebSearch, NOTES_ID, OWNER, REPORT, REPORT_ID,
};
use scribe_types::{
    DocContext, DocumentId, EditPlacement, QueryRequest, TaskKind, WebContext, WebResult,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

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

const DOC_QUESTION: &str = "What does my document say about quarterly revenue?";
const STOCK_QUESTION: &str = "What is the ACME stock price today?";

fn stock_llm() -> ScriptedLlm {
    ScriptedLlm::new()
        .reply(
            CallPurpose::Route,
            router_reply(&decision(
                TaskKind::Extract,
                STOCK_QUESTION,
                DocContext::None,
                WebContext::Required,
            )),
        )
        .reply(
            CallPurpose::Plan,
            plan_reply(TaskKind::Extract, STOCK_QUESTION, &["W1"]),
        )
        .reply(CallPurpose::Generate, "ACME stock closed at $182.40 [1].")
}

#[tokio::test]
async fn document_question_never_searches_the_web() {
    let mut web = MockWeb::new();
    web.expect_search().never();

    let llm = ScriptedLlm::new()
        .reply(
            CallPurpose::Route,
            router_reply(&decision(
                TaskKind::Summarize,
                DOC_QUESTION,
                DocContext::Current,
                WebContext::No,
            )),
        )
        .reply(
            CallPurpose::Plan,
            plan_reply(TaskKind::Summarize, DOC_QUESTION, &["D1"]),
        )
        .reply(
            CallPurpose::Generate,
            "Quarterly revenue grew 12% to $4.1M on enterprise renewals [1].",
        );
    let harness = Harness::with_web(llm, Arc::new(web));

    let request = QueryRequest::new(DOC_QUESTION)
        .with_document(REPORT_ID)
        .with_web_search(true);
    let response = harness
        .orchestrator
        .process_query(&mut session(), request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.metadata.task, TaskKind::Summarize);
    assert!(response.metadata.sources_used.current_document > 0);
    assert_eq!(response.metadata.sources_used.web, 0);
    assert_eq!(response.citations, vec!["Q3 Report".to_string()]);
    assert!(response.verification.is_valid, "{:?}", response.verification);
    assert!(!response.metadata.should_trigger_live_edit);
    assert_eq!(response.live_edit_content, None);
    assert_eq!(response.live_edit_placement, None);
    assert!(harness.observer.events().iter().any(|e| matches!(
        e,
        PipelineEvent::Retrieved { gate: Some(verdict), .. }
            if verdict.document_relevant && verdict.reason == GateReason::PersonalContent
    )));

    let generate = harness
        .llm
        .requests()
        .into_iter()
        .find(|r| r.options.purpose == CallPurpose::Generate)
        .unwrap();
    assert!(!generate.messages[0].content.contains("report#"));
}

#[tokio::test]
async fn stock_question_uses_the_web_when_enabled() {
    let web = Arc::new(StaticWebSearch::new(vec![stock_result()]));
    let harness = Harness::with_web(stock_llm(), web.clone());

    let response = harness
        .orchestrator
        .process_query(
            &mut session(),
            QueryRequest::new(STOCK_QUESTION).with_web_search(true),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(web.calls(), 1);
    assert_eq!(response.metadata.sources_used.web, 1);
    assert_eq!(response.metadata.sources_used.current_document, 0);
    assert_eq!(response.citations, vec!["ACME shares close higher".to_string()]);
    assert!(response.verification.is_valid, "{:?}", response.verification);
}

#[tokio::test]
async fn stock_question_without_web_falls_back_to_general_knowledge() {
    let web = Arc::new(StaticWebSearch::new(vec![stock_result()]));
    let harness = Harness::with_web(
        stock_llm().reply(CallPurpose::Generate, "I can't see live prices."),
        web.clone(),
    );

    let response = harness
        .orchestrator
        .process_query(
            &mut session(),
            QueryRequest::new(STOCK_QUESTION),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(web.calls(), 0);
    assert_eq!(response.metadata.sources_used.total(), 0);
    assert!(response.citations.is_empty());
    assert!(!response.verification.is_valid);
    assert!(response
        .verification
        .warnings
        .contains(&GENERAL_KNOWLEDGE_WARNING.to_string()));
}

#[tokio::test]
async fn rewrite_of_selection_goes_live_and_applies() {
    const SELECTION: &str = "Hiring slowed in the second half while the team focused on retention.";
    const REWRITE: &str = "Hiring decelerated during the second half of the year, as the team \
                           concentrated its efforts on retaining existing staff.";

    let mut routed = selection_decision(TaskKind::Rewrite, "Make this paragraph more formal");
    routed.query.semantic = "hiring slowed retention".to_string();
    let llm = ScriptedLlm::new()
        .reply(CallPurpose::Route, router_reply(&routed))
        .reply(
            CallPurpose::Plan,
            plan_reply(TaskKind::Rewrite, SELECTION, &["D1"]),
        )
        .reply(CallPurpose::Generate, REWRITE);
    let harness = Harness::new(llm);

    let request = QueryRequest::new("Make this paragraph more formal")
        .with_document(REPORT_ID)
        .with_selection(SELECTION);
    let response = harness
        .orchestrator
        .process_query(&mut session(), request, &CancellationToken::new())
        .await
        .unwrap();

    assert!(response.metadata.should_trigger_live_edit);
    assert_eq!(response.live_edit_content.as_deref(), Some(REWRITE));
    assert_ne!(response.content, REWRITE);
    assert!(harness.observer.events().iter().any(|e| matches!(
        e,
        PipelineEvent::LiveEditDecided { triggered: true, .. }
    )));

    let placement = response.live_edit_placement.clone().unwrap();
    assert_eq!(
        placement,
        EditPlacement::Replace {
            original: SELECTION.to_string()
        }
    );

    let edits = harness.orchestrator.edits();
    let report = DocumentId::new(REPORT_ID);
    edits.begin(&report).unwrap();
    let proposal = edits
        .propose(&report, OWNER, response.live_edit_content.unwrap(), placement)
        .await
        .unwrap();
    assert_eq!(edits.state(&report), EditState::PreviewReady);
    let updated = edits.apply(&report, OWNER, &proposal.id).await.unwrap();
    assert_eq!(updated.plain_text, REPORT.replace(SELECTION, REWRITE));
    assert!(updated
        .plain_text
        .starts_with("Quarterly revenue grew 12% to $4.1M"));
    assert!(updated
        .plain_text
        .ends_with("Quarterly revenue in EMEA doubled after the new pricing launched."));
    assert_eq!(edits.state(&report), EditState::Applied);
}

#[tokio::test]
async fn sixth_linked_document_is_rejected() {
    let llm = ScriptedLlm::new()
        .reply(
            CallPurpose::Route,
            router_reply(&decision(
                TaskKind::Summarize,
                "Summarize my notes",
                DocContext::Linked,
                WebContext::No,
            )),
        )
        .reply(CallPurpose::Generate, "The board wants a regional revenue forecast.");
    let harness = Harness::new(llm);

    let mut ids = vec![NOTES_ID.to_string()];
    ids.extend((1..=5).map(|i| format!("extra-{i}")));
    let mut session = session();
    let response = harness
        .orchestrator
        .process_query(
            &mut session,
            QueryRequest::new("Summarize my notes").with_linked_documents(ids),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(session.linked_documents().len(), 5);
    assert!(!session
        .linked_documents()
        .contains(&DocumentId::new("extra-5")));
    assert!(harness
        .observer
        .degraded_stages()
        .contains(&PipelineStage::Link));
    assert!(response.metadata.sources_used.linked_documents > 0);
    assert_eq!(session.history().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_web_search_times_out_and_is_excluded() {
    let web = Arc::new(SlowWebSearch::new(Duration::from_secs(30)));
    let harness = Harness::with_web(stock_llm(), web.clone());

    let response = harness
        .orchestrator
        .process_query(
            &mut session(),
            QueryRequest::new(STOCK_QUESTION).with_web_search(true),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(web.calls(), 1);
    assert_eq!(response.metadata.sources_used.web, 0);
    assert!(response.citations.is_empty());
    assert!(harness.observer.events().iter().any(|e| matches!(
        e,
        PipelineEvent::Retrieved {
            web_attempted: true,
            web_results: 0,
            ..
        }
    )));
    assert!(harness
        .observer
        .degraded_stages()
        .contains(&PipelineStage::Retrieve));
}

#[tokio::test]
async fn router_and_planner_failures_degrade() {
    let llm = ScriptedLlm::new()
        .reply(CallPurpose::Route, "I think this is a rewrite?")
        .fail(CallPurpose::Plan, LlmError::Http("connection reset".into()))
        .reply(CallPurpose::Generate, "Here you go.");
    let harness = Harness::new(llm);

    let response = harness
        .orchestrator
        .process_query(
            &mut session(),
            QueryRequest::new("tidy this up"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.content, "Here you go.");
    let stages = harness.observer.degraded_stages();
    assert!(stages.contains(&PipelineStage::Route));
    assert!(stages.contains(&PipelineStage::Plan));
}

#[tokio::test]
async fn generation_failure_is_an_error() {
    let harness = Harness::new(ScriptedLlm::failing(LlmError::Http("503".into())));
    let mut session = session();

    let err = harness
        .orchestrator
        .process_query(
            &mut session,
            QueryRequest::new("Write an intro"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ScribeError::Generation(_)));
    assert!(err.is_retryable());
    assert!(session.history().is_empty());
    assert!(harness
        .observer
        .degraded_stages()
        .contains(&PipelineStage::Generate));
}

#[tokio::test]
async fn cancelled_request_stops_early() {
    let harness = Harness::new(stock_llm());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = harness
        .orchestrator
        .process_query(&mut session(), QueryRequest::new(STOCK_QUESTION), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ScribeError::Cancelled));
    assert_eq!(harness.llm.calls(CallPurpose::Generate), 0);
}

#[tokio::test]
async fn failing_sources_yield_an_answer_without_evidence() {
    let web = Arc::new(FailingWebSearch::default());
    let llm = ScriptedLlm::new()
        .reply(
            CallPurpose::Route,
            router_reply(&decision(
                TaskKind::Summarize,
                DOC_QUESTION,
                DocContext::Current,
                WebContext::Recommended,
            )),
        )
        .reply(CallPurpose::Generate, "Revenue trends are not available right now.");
    let harness = Harness::build(
        llm,
        Arc::new(FailingEvidenceStore),
        Some(web.clone()),
        ScribeConfig::default(),
    );

    let response = harness
        .orchestrator
        .process_query(
            &mut session(),
            QueryRequest::new(DOC_QUESTION)
                .with_document(REPORT_ID)
                .with_web_search(true),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(web.calls(), 1);
    assert_eq!(response.metadata.sources_used.total(), 0);
    assert!(response.metadata.rag_confidence.abs() < f32::EPSILON);
    assert!(response
        .verification
        .warnings
        .contains(&GENERAL_KNOWLEDGE_WARNING.to_string()));
}

async fn ask_stock(harness: &Harness) {
    harness
        .orchestrator
        .process_query(
            &mut session(),
            QueryRequest::new(STOCK_QUESTION).with_web_search(true),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn repeated_web_queries_hit_the_cache() {
    let cached_web = Arc::new(StaticWebSearch::new(vec![stock_result()]));
    let cached = Harness::with_web(stock_llm(), cached_web.clone());
    ask_stock(&cached).await;
    ask_stock(&cached).await;
    assert_eq!(cached_web.calls(), 1);

    let mut config = ScribeConfig::default();
    config.web.cache_capacity = 0;
    let direct_web = Arc::new(StaticWebSearch::new(vec![stock_result()]));
    let direct = Harness::build(
        stock_llm(),
        fixture_evidence(),
        Some(direct_web.clone()),
        config,
    );
    ask_stock(&direct).await;
    ask_stock(&direct).await;
    assert_eq!(direct_web.calls(), 2);
}
