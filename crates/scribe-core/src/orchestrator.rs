//! Orchestrator
//!
//! Runs one request through the pipeline:
//! Router → Retriever → Packer & Scorer → Planner → Generator → Verifier →
//! Live-edit decision.
//!
//! Only generation failures and cancellation end a request early. Every
//! other step degrades to its fallback and reports it to the observer.

use crate::catalog::EvidenceCatalog;
use crate::config::{PackingConfig, ScribeConfig};
use crate::document::DocumentStore;
use crate::error::{ConfigError, ScribeError};
use crate::generator::{GenerationInput, ResponseGenerator};
use crate::live_edit::LiveEditEngine;
use crate::llm::LlmClient;
use crate::observer::{PipelineEvent, PipelineObserver, PipelineStage, TracingObserver};
use crate::planner::{InstructionPlanner, PlanInput};
use crate::router::TaskRouter;
use crate::session::OrchestratorSession;
use crate::verifier;
use crate::workflow::EditCoordinator;
use scribe_retrieval::{
    pack, score, CachedWebSearch, ContextRetriever, EvidenceStore, RelevanceGate,
    RetrievalError, RetrievalRequest, WebSearchClient,
};
use scribe_types::{
    EditPlacement, EvidenceBundle, OrchestratorResponse, QueryRequest, ResponseMetadata,
    SourcesUsed, TaskKind,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Builds an [`Orchestrator`] from configuration and collaborators
pub struct OrchestratorBuilder {
    config: ScribeConfig,
    llm: Arc<dyn LlmClient>,
    evidence: Arc<dyn EvidenceStore>,
    documents: Arc<dyn DocumentStore>,
    web: Option<Arc<dyn WebSearchClient>>,
    observer: Arc<dyn PipelineObserver>,
}

impl OrchestratorBuilder {
    /// Create builder
    #[must_use]
    pub fn new(
        config: ScribeConfig,
        llm: Arc<dyn LlmClient>,
        evidence: Arc<dyn EvidenceStore>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            config,
            llm,
            evidence,
            documents,
            web: None,
            observer: Arc::new(TracingObserver),
        }
    }

    /// With web search; results are cached when the web cache is enabled
    #[must_use]
    pub fn with_web_search(mut self, web: Arc<dyn WebSearchClient>) -> Self {
        self.web = Some(web);
        self
    }

    /// With observer
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the configuration is invalid.
    pub fn build(self) -> Result<Orchestrator, ConfigError> {
        let mut config = self.config;
        config.validate()?;
        let rules = Arc::new(config.rule_table()?);

        let mut retriever = ContextRetriever::new(
            self.evidence,
            RelevanceGate::new(Arc::clone(&rules)),
            config.retrieval.clone(),
        );
        if let Some(web) = self.web {
            let web: Arc<dyn WebSearchClient> = if config.web.cache_capacity > 0 {
                Arc::new(CachedWebSearch::new(
                    web,
                    config.web.cache_capacity,
                    config.web.cache_ttl(),
                ))
            } else {
                web
            };
            retriever = retriever.with_web_search(web);
        }

        Ok(Orchestrator {
            router: TaskRouter::new(Arc::clone(&self.llm), Arc::clone(&rules), &config.llm)
                .with_history_turns(config.history.prompt_turns),
            retriever,
            planner: InstructionPlanner::new(Arc::clone(&self.llm), &config.llm),
            generator: ResponseGenerator::new(self.llm, &config.llm)
                .with_history_turns(config.history.prompt_turns),
            live_edit: LiveEditEngine::new(rules, config.live_edit),
            edits: EditCoordinator::new(Arc::clone(&self.documents)),
            documents: self.documents,
            observer: self.observer,
            packing: config.packing,
        })
    }
}

/// The retrieval-augmented orchestration pipeline
pub struct Orchestrator {
    router: TaskRouter,
    retriever: ContextRetriever,
    planner: InstructionPlanner,
    generator: ResponseGenerator,
    live_edit: LiveEditEngine,
    edits: EditCoordinator,
    documents: Arc<dyn DocumentStore>,
    observer: Arc<dyn PipelineObserver>,
    packing: PackingConfig,
}

impl Orchestrator {
    /// Task router
    #[inline]
    #[must_use]
    pub fn router(&self) -> &TaskRouter {
        &self.router
    }

    /// Edit workflow coordinator
    #[inline]
    #[must_use]
    pub fn edits(&self) -> &EditCoordinator {
        &self.edits
    }

    /// Process one request within a session
    ///
    /// # Errors
    /// [`ScribeError::Cancelled`] when `cancel` fires and
    /// [`ScribeError::Generation`] when no draft could be produced. Every
    /// other failure degrades inside the pipeline.
    pub async fn process_query(
        &self,
        session: &mut OrchestratorSession,
        request: QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<OrchestratorResponse, ScribeError> {
        let started = Instant::now();
        let ask = request.message.as_str();
        let selection = request.selection_text();

        session.seed_history(&request.conversation_history);
        self.link_requested(session, &request);

        // Route
        let decision =
            cancellable(cancel, self.router.route(ask, selection, session.history())).await?;
        self.emit(PipelineEvent::Routed {
            task: decision.task,
            confidence: decision.confidence,
            origin: decision.origin,
        });
        if decision.is_fallback() {
            self.degraded(PipelineStage::Route, "router fell back to the default decision");
        }

        // Retrieve
        let retrieval = RetrievalRequest {
            decision: &decision,
            ask,
            has_selection: selection.is_some(),
            current_document: request.document_id.as_ref(),
            linked_documents: session.linked_documents(),
            web_enabled: request.use_web_search,
        };
        let context = match self.retriever.retrieve(retrieval, cancel).await {
            Ok(context) => context,
            Err(RetrievalError::Cancelled) => return Err(ScribeError::Cancelled),
            Err(err) => return Err(err.into()),
        };
        self.emit(PipelineEvent::Retrieved {
            document_chunks: context.rag_chunks.len(),
            web_results: context.web_results.len(),
            gate: context.gate,
            web_attempted: context.web_attempted,
        });
        if context.web_attempted && context.web_results.is_empty() {
            self.degraded(PipelineStage::Retrieve, "web search returned nothing");
        }

        // Pack and score
        let bundle = pack(
            context.rag_chunks,
            context.web_results,
            self.packing.budget(request.max_tokens),
        );
        let scores = score(&bundle, decision.task);
        self.emit(PipelineEvent::Packed {
            chunks: bundle.chunks.len(),
            web_results: bundle.web_results.len(),
            tokens_used: bundle.tokens_used,
            confidence: scores.confidence,
            coverage: scores.coverage,
        });

        let catalog = cancellable(
            cancel,
            EvidenceCatalog::resolve(&bundle, self.documents.as_ref(), session.user_id()),
        )
        .await?;

        // Plan
        let plan = cancellable(
            cancel,
            self.planner.plan(PlanInput {
                decision: &decision,
                ask,
                selection,
                bundle: &bundle,
                catalog: &catalog,
            }),
        )
        .await?;
        self.emit(PipelineEvent::Planned {
            task: plan.instruction.task(),
            context_refs: plan.instruction.context_refs.len(),
            dropped_refs: plan.dropped_refs,
            fallback: plan.fallback,
        });
        if plan.fallback {
            self.degraded(PipelineStage::Plan, "planner fell back to the minimal instruction");
        }
        let instruction = plan.instruction;

        // Generate
        let guidance = verifier::guidance(&instruction, &bundle);
        let generation_started = Instant::now();
        let draft = match self
            .generator
            .generate(
                GenerationInput {
                    ask,
                    instruction: &instruction,
                    bundle: &bundle,
                    catalog: &catalog,
                    guidance: &guidance,
                    history: session.history(),
                    max_tokens: request.max_tokens,
                },
                cancel,
            )
            .await
        {
            Ok(draft) => draft,
            Err(err) => {
                let err = ScribeError::from(err);
                if !matches!(err, ScribeError::Cancelled) {
                    tracing::error!(error = %err, "generation failed");
                    self.degraded(PipelineStage::Generate, &err.to_string());
                }
                return Err(err);
            }
        };
        self.emit(PipelineEvent::Generated {
            chars: draft.chars().count(),
            elapsed_ms: elapsed_ms(generation_started),
        });

        // Verify
        let verification = verifier::verify(&draft, &instruction, &bundle, &catalog);
        self.emit(PipelineEvent::Verified {
            is_valid: verification.is_valid,
            warnings: verification.warnings.len(),
        });

        // Live edit
        let live_edit = self.live_edit.decide(&decision, ask, &draft, scores);
        self.emit(PipelineEvent::LiveEditDecided {
            triggered: live_edit.trigger,
            path: live_edit.path,
            payload_chars: live_edit.payload.chars().count(),
        });
        let should_trigger_live_edit = live_edit.trigger;
        let live_edit_content = live_edit.into_content();
        let live_edit_placement = live_edit_content
            .as_ref()
            .map(|_| EditPlacement::for_request(decision.task, selection, &decision.targets));
        let content = if should_trigger_live_edit {
            live_edit_status(decision.task).to_string()
        } else {
            draft.clone()
        };

        session.record_exchange(ask, draft);

        let response = OrchestratorResponse {
            content,
            citations: catalog.citations(),
            metadata: ResponseMetadata {
                task: decision.task,
                rag_confidence: scores.confidence,
                coverage: scores.coverage,
                sources_used: sources_used(&bundle, &request),
                processing_time_ms: elapsed_ms(started),
                should_trigger_live_edit,
            },
            verification,
            live_edit_content,
            live_edit_placement,
        };
        tracing::info!(
            session_id = session.id(),
            task = %response.metadata.task,
            sources = response.metadata.sources_used.total(),
            live_edit = should_trigger_live_edit,
            elapsed_ms = response.metadata.processing_time_ms,
            "query processed"
        );
        Ok(response)
    }

    fn link_requested(&self, session: &mut OrchestratorSession, request: &QueryRequest) {
        for id in &request.linked_documents {
            if !session.link_document(id.clone()) {
                tracing::warn!(
                    session_id = session.id(),
                    document_id = %id,
                    "linked document rejected, set is full"
                );
                self.degraded(
                    PipelineStage::Link,
                    &format!("linked document {id} rejected, set is full"),
                );
            }
        }
    }

    fn emit(&self, event: PipelineEvent) {
        self.observer.on_event(&event);
    }

    fn degraded(&self, stage: PipelineStage, reason: &str) {
        self.emit(PipelineEvent::Degraded {
            stage,
            reason: reason.to_string(),
        });
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("router", &self.router)
            .field("retriever", &self.retriever)
            .field("packing", &self.packing)
            .finish_non_exhaustive()
    }
}

async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, ScribeError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ScribeError::Cancelled),
        output = future => Ok(output),
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn sources_used(bundle: &EvidenceBundle, request: &QueryRequest) -> SourcesUsed {
    let current = bundle
        .chunks
        .iter()
        .filter(|c| request.document_id.as_ref() == Some(&c.document_id))
        .count();
    SourcesUsed {
        current_document: current,
        linked_documents: bundle.chunks.len() - current,
        web: bundle.web_results.len(),
    }
}

/// Chat line shown when the content went into the document
fn live_edit_status(task: TaskKind) -> &'static str {
    match task {
        TaskKind::Rewrite | TaskKind::Style => "I've updated the text in your document.",
        TaskKind::Extend => "I've continued the text in your document.",
        TaskKind::TableCreate | TaskKind::TableEdit => "I've put the table in your document.",
        _ => "I've added the content to your document.",
    }
}
