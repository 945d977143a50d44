//! Instruction planner
//!
//! Turns a router decision, the ask and the packed evidence into an
//! [`InstructionJson`]. Whatever the model proposes, the result holds:
//! - the task matches the router decision
//! - every context ref points at a source in the bundle
//! - telemetry reports what the pipeline actually used
//!
//! Any failure yields the minimal instruction instead.

use crate::catalog::EvidenceCatalog;
use crate::config::LlmConfig;
use crate::json::{self, Parsed};
use crate::llm::{
    complete_bounded, truncate_for_log, CallPurpose, ChatMessage, CompletionOptions,
    CompletionRequest, LlmClient,
};
use scribe_types::{
    Constraints, EvidenceBundle, InstructionJson, RouterDecision, Target, TaskInputs, Telemetry,
};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Word ceiling of the minimal instruction
pub const FALLBACK_MAX_WORDS: u32 = 500;

/// Tone of the minimal instruction
pub const FALLBACK_TONE: &str = "concise";

/// Inputs to one planning call
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    /// Router decision
    pub decision: &'a RouterDecision,
    /// The user's ask
    pub ask: &'a str,
    /// Non-blank selection
    pub selection: Option<&'a str>,
    /// Packed evidence
    pub bundle: &'a EvidenceBundle,
    /// Aliases and titles for the bundle
    pub catalog: &'a EvidenceCatalog,
}

impl PlanInput<'_> {
    fn telemetry(&self) -> Telemetry {
        Telemetry {
            route_confidence: self.decision.confidence,
            rag_used: !self.bundle.chunks.is_empty(),
            web_used: !self.bundle.web_results.is_empty(),
        }
    }

    fn target_text(&self) -> &str {
        self.selection.unwrap_or(self.ask)
    }
}

/// Planner result
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    /// Instruction for the generator
    pub instruction: InstructionJson,
    /// Whether the minimal instruction was used
    pub fallback: bool,
    /// Context refs dropped because their source was not in the bundle
    pub dropped_refs: usize,
}

/// Minimal instruction used when planning fails
#[must_use]
pub fn minimal_instruction(input: &PlanInput<'_>) -> InstructionJson {
    InstructionJson {
        inputs: TaskInputs::minimal(input.decision.task, input.target_text()),
        targets: vec![Target::selection()],
        context_refs: Vec::new(),
        constraints: Constraints {
            max_words: Some(FALLBACK_MAX_WORDS),
            tone: Some(FALLBACK_TONE.to_string()),
            citation_style: None,
        },
        telemetry: input.telemetry(),
    }
}

/// Instruction planner
#[derive(Clone)]
pub struct InstructionPlanner {
    llm: Arc<dyn LlmClient>,
    model: String,
    timeout: Duration,
    max_tokens: u32,
}

impl InstructionPlanner {
    /// Create planner
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>, config: &LlmConfig) -> Self {
        Self {
            llm,
            model: config.router_model().to_string(),
            timeout: config.router_timeout(),
            max_tokens: config.planner_max_tokens,
        }
    }

    /// Plan an instruction; falls back to the minimal instruction on failure
    pub async fn plan(&self, input: PlanInput<'_>) -> PlanOutcome {
        let request = CompletionRequest::new(
            vec![
                ChatMessage::system(system_prompt()),
                ChatMessage::user(user_prompt(&input)),
            ],
            CompletionOptions::new(CallPurpose::Plan, self.model.clone(), 0.1)
                .with_max_tokens(self.max_tokens)
                .json(),
        );

        match complete_bounded(
            self.llm.as_ref(),
            request,
            self.timeout,
            &CancellationToken::new(),
        )
        .await
        {
            Ok(raw) => interpret(&raw, &input),
            Err(err) => {
                tracing::warn!(error = %err, "planner call failed, using minimal instruction");
                fallback(&input)
            }
        }
    }
}

impl std::fmt::Debug for InstructionPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstructionPlanner")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn fallback(input: &PlanInput<'_>) -> PlanOutcome {
    PlanOutcome {
        instruction: minimal_instruction(input),
        fallback: true,
        dropped_refs: 0,
    }
}

/// Turn raw planner output into an instruction
#[must_use]
pub fn interpret(raw: &str, input: &PlanInput<'_>) -> PlanOutcome {
    let mut instruction = match json::parse_model_output::<InstructionJson>(raw) {
        Ok(Parsed { value, .. }) => value,
        Err(err) => {
            tracing::warn!(
                error = %err,
                output = %truncate_for_log(raw, 200),
                "planner output unusable, using minimal instruction"
            );
            return fallback(input);
        }
    };

    let task = input.decision.task;
    if instruction.task() != task || instruction.inputs.target_text().trim().is_empty() {
        tracing::debug!(
            planned = %instruction.task(),
            routed = %task,
            "planner inputs replaced with minimal inputs"
        );
        instruction.inputs = TaskInputs::minimal(task, input.target_text());
    }

    if instruction.targets.is_empty() {
        instruction.targets = if input.decision.targets.is_empty() {
            vec![Target::selection()]
        } else {
            input.decision.targets.clone()
        };
    }

    for context_ref in &mut instruction.context_refs {
        context_ref.id = input.catalog.resolve_ref(context_ref.kind, &context_ref.id);
    }
    let dropped_refs = instruction.retain_refs_in(input.bundle);
    if dropped_refs > 0 {
        tracing::debug!(dropped_refs, "dropped context refs absent from the bundle");
    }

    instruction.telemetry = input.telemetry();

    PlanOutcome {
        instruction,
        fallback: false,
        dropped_refs,
    }
}

fn system_prompt() -> String {
    let schema =
        serde_json::to_string(&json::schema_value::<InstructionJson>()).unwrap_or_default();
    format!(
        "You plan the work of a document-editing assistant.\n\
         Reply with exactly one JSON object and nothing else.\n\
         Keep the given task. Put the text to work on in inputs.target_text.\n\
         List in context_refs only the evidence the answer should rely on, by alias \
         (D1, D2 for documents, W1, W2 for web results), with a short reason.\n\
         Set constraints (max_words, tone, citation_style) when the request implies them.\n\
         JSON Schema: {schema}"
    )
}

fn user_prompt(input: &PlanInput<'_>) -> String {
    let mut prompt = format!("Task: {}\nRequest: {}\n", input.decision.task, input.ask);
    if let Some(selection) = input.selection {
        let _ = writeln!(prompt, "Selected text: {}", truncate_for_log(selection, 2_000));
    }
    if input.bundle.is_empty() {
        prompt.push_str("Evidence: (none)\n");
    } else {
        prompt.push_str("Evidence:\n");
        prompt.push_str(&input.catalog.render_aliased(input.bundle));
    }
    prompt
}
