//! Task router
//!
//! Classifies a request into one [`TaskKind`] plus evidence needs. The model
//! is asked for exactly the [`RouterDecision`] JSON shape; its output goes
//! through three stages:
//! - strict schema-validated parse (origin `Model`)
//! - approximate parse, or a field salvage of `task` and `confidence`
//!   (origin `Approximate`)
//! - deterministic fallback (origin `Fallback`)
//!
//! Routing never fails.

use crate::config::LlmConfig;
use crate::json::{self, ParseStage, Parsed};
use crate::llm::{
    complete_bounded, truncate_for_log, CallPurpose, ChatMessage, CompletionOptions,
    CompletionRequest, LlmClient,
};
use once_cell::sync::Lazy;
use regex::Regex;
use scribe_signals::RuleTable;
use scribe_types::{
    fallback_keywords, ConversationHistory, DecisionOrigin, RouterDecision, TaskKind,
};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Selection characters shown to the router
const MAX_SELECTION_CHARS: usize = 1_500;

static TASK_FIELD: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)"task"\s*:\s*"([a-z_ -]+)""#).ok());
static CONFIDENCE_FIELD: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)"confidence"\s*:\s*"?([0-9]*\.?[0-9]+)"?"#).ok());

/// Task router
#[derive(Clone)]
pub struct TaskRouter {
    llm: Arc<dyn LlmClient>,
    rules: Arc<RuleTable>,
    model: String,
    timeout: Duration,
    max_tokens: u32,
    history_turns: usize,
}

impl TaskRouter {
    /// Create router
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>, rules: Arc<RuleTable>, config: &LlmConfig) -> Self {
        Self {
            llm,
            rules,
            model: config.router_model().to_string(),
            timeout: config.router_timeout(),
            max_tokens: config.router_max_tokens,
            history_turns: 4,
        }
    }

    /// With number of history turns shown to the model
    #[inline]
    #[must_use]
    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    /// Classify a request
    pub async fn route(
        &self,
        ask: &str,
        selection: Option<&str>,
        history: &ConversationHistory,
    ) -> RouterDecision {
        let request = CompletionRequest::new(
            vec![
                ChatMessage::system(system_prompt()),
                ChatMessage::user(self.user_prompt(ask, selection, history)),
            ],
            CompletionOptions::new(CallPurpose::Route, self.model.clone(), 0.0)
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
            Ok(raw) => interpret(&raw, ask, selection),
            Err(err) => {
                tracing::warn!(error = %err, "router call failed, using fallback decision");
                RouterDecision::fallback(ask, selection)
            }
        }
    }

    fn user_prompt(
        &self,
        ask: &str,
        selection: Option<&str>,
        history: &ConversationHistory,
    ) -> String {
        let mut prompt = format!("Request: {ask}\n");
        match selection.filter(|s| !s.trim().is_empty()) {
            Some(text) => {
                let _ = writeln!(
                    prompt,
                    "Selected text: {}",
                    truncate_for_log(text, MAX_SELECTION_CHARS)
                );
            }
            None => prompt.push_str("Selected text: (none)\n"),
        }

        let signals = self.rules.signals(ask);
        if !signals.is_empty() {
            let names: Vec<_> = signals.iter().map(|s| s.as_str()).collect();
            let _ = writeln!(prompt, "Signals: {}", names.join(", "));
        }

        let turns = history.recent(self.history_turns);
        if !turns.is_empty() {
            prompt.push_str("Recent conversation:\n");
            for turn in turns {
                let _ = writeln!(
                    prompt,
                    "{}: {}",
                    turn.role.as_str(),
                    truncate_for_log(&turn.content, 300)
                );
            }
        }
        prompt
    }
}

impl std::fmt::Debug for TaskRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRouter")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

fn system_prompt() -> String {
    let tasks: Vec<_> = TaskKind::ALL.iter().map(|t| t.as_str()).collect();
    let schema = serde_json::to_string(&json::schema_value::<RouterDecision>()).unwrap_or_default();
    format!(
        "You classify requests made to a document-editing assistant.\n\
         Reply with exactly one JSON object and nothing else.\n\
         task: one of {tasks}.\n\
         confidence: your certainty between 0 and 1.\n\
         needs.selectionText: true when the selected text is the input.\n\
         needs.docContext: none, current, linked or all.\n\
         needs.webContext: no, recommended or required (required for current events, prices, news).\n\
         needs.precision: low, medium or high.\n\
         query.semantic: a search query for the user's documents; query.keywords: key terms.\n\
         targets: where an edit applies (selection, paragraph, section, table, document, cursor).\n\
         JSON Schema: {schema}",
        tasks = tasks.join(", "),
    )
}

/// Turn raw router output into a decision; never fails
#[must_use]
pub fn interpret(raw: &str, ask: &str, selection: Option<&str>) -> RouterDecision {
    let has_selection = selection.is_some_and(|s| !s.trim().is_empty());

    let decision = match json::parse_model_output::<RouterDecision>(raw) {
        Ok(Parsed { value, stage }) => {
            let origin = match stage {
                ParseStage::Strict if (0.0..=1.0).contains(&value.confidence) => {
                    DecisionOrigin::Model
                }
                _ => DecisionOrigin::Approximate,
            };
            Some(value.with_origin(origin))
        }
        Err(err) => {
            tracing::debug!(error = %err, "router output unparseable, trying field salvage");
            salvage(raw, ask, selection)
        }
    };

    let Some(mut decision) = decision else {
        tracing::warn!(
            output = %truncate_for_log(raw, 200),
            "router output unusable, using fallback decision"
        );
        return RouterDecision::fallback(ask, selection);
    };

    decision.confidence = if decision.confidence.is_finite() {
        decision.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    decision.needs.selection_text &= has_selection;
    if decision.query.semantic.trim().is_empty() {
        decision.query.semantic = ask.to_string();
    }
    if decision.query.keywords.is_empty() {
        decision.query.keywords = fallback_keywords(ask);
    }
    decision
}

fn salvage(raw: &str, ask: &str, selection: Option<&str>) -> Option<RouterDecision> {
    let task: TaskKind = TASK_FIELD
        .as_ref()?
        .captures(raw)?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;
    let confidence = CONFIDENCE_FIELD
        .as_ref()
        .and_then(|re| re.captures(raw))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f32>().ok())
        .unwrap_or(0.0);

    let mut decision = RouterDecision::fallback(ask, selection);
    decision.task = task;
    decision.confidence = confidence;
    Some(decision.with_origin(DecisionOrigin::Approximate))
}
