//! Live-edit decision engine
//!
//! Decides whether a draft is written into the document or only shown in
//! chat, and which span of the draft to insert.
//!
//! - **Structured path**: the router produced a real decision; editing
//!   tasks with enough confidence and coverage qualify
//! - **Heuristic path**: the router fell back; announcement phrases,
//!   writing verbs in the ask or a long structured draft qualify
//!
//! Either way the extracted payload must be longer than the configured
//! minimum.

use crate::config::LiveEditConfig;
use scribe_retrieval::EvidenceScores;
use scribe_signals::{RuleTable, Signal};
use scribe_types::RouterDecision;
use std::sync::Arc;

/// Which path decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionPath {
    /// Router decision with task, confidence and coverage
    Structured,
    /// Keyword heuristics over the ask and the draft
    Heuristic,
}

impl DecisionPath {
    /// Path name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Heuristic => "heuristic",
        }
    }
}

/// Live-edit outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEditDecision {
    /// Whether the payload goes into the document
    pub trigger: bool,
    /// Path that decided
    pub path: DecisionPath,
    /// Extracted payload; empty when nothing is insertable
    pub payload: String,
}

impl LiveEditDecision {
    /// Payload when triggered
    #[must_use]
    pub fn into_content(self) -> Option<String> {
        self.trigger.then_some(self.payload)
    }
}

/// Live-edit decision engine
#[derive(Debug, Clone)]
pub struct LiveEditEngine {
    rules: Arc<RuleTable>,
    config: LiveEditConfig,
}

impl LiveEditEngine {
    /// Create engine
    #[must_use]
    pub fn new(rules: Arc<RuleTable>, config: LiveEditConfig) -> Self {
        Self { rules, config }
    }

    /// Decide for a draft
    #[must_use]
    pub fn decide(
        &self,
        decision: &RouterDecision,
        ask: &str,
        draft: &str,
        scores: EvidenceScores,
    ) -> LiveEditDecision {
        let draft_chars = draft.chars().count();

        let (path, eligible) = if decision.is_fallback() {
            let eligible = self.rules.matches(Signal::Announcement, draft)
                || self.rules.matches(Signal::WritingIntent, ask)
                || (draft_chars > self.config.long_form_chars
                    && self.rules.matches(Signal::StructureMarker, draft));
            (DecisionPath::Heuristic, eligible)
        } else {
            let eligible = decision.task.is_editing()
                && scores.confidence > self.config.min_confidence
                && scores.coverage > self.config.min_coverage;
            (DecisionPath::Structured, eligible)
        };

        if !eligible {
            return LiveEditDecision {
                trigger: false,
                path,
                payload: String::new(),
            };
        }

        let structured = path == DecisionPath::Structured;
        let mut payload = self.extract(draft, structured);
        if structured
            && payload.chars().count() < self.config.full_draft_chars
            && draft_chars > self.config.full_draft_chars
        {
            payload = draft.trim().to_string();
        }

        let trigger = payload.chars().count() > self.config.min_payload_chars;
        LiveEditDecision {
            trigger,
            path,
            payload: if trigger { payload } else { String::new() },
        }
    }

    /// Insertable span of a draft.
    ///
    /// Text after the first announcement phrase; otherwise the whole draft
    /// when it is structured or long enough; otherwise nothing.
    #[must_use]
    pub fn extract(&self, draft: &str, structured: bool) -> String {
        if let Some(found) = self.rules.first_match(Signal::Announcement, draft) {
            return draft[found.end..].trim().to_string();
        }
        if structured || draft.chars().count() > self.config.full_draft_chars {
            return draft.trim().to_string();
        }
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use scribe_types::TaskKind;

    fn engine() -> LiveEditEngine {
        LiveEditEngine::new(Arc::new(RuleTable::builtin()), LiveEditConfig::default())
    }

    fn routed(task: TaskKind) -> RouterDecision {
        let mut decision = RouterDecision::fallback("ask", Some("selection"));
        decision.task = task;
        decision.confidence = 0.9;
        decision.origin = scribe_types::DecisionOrigin::Model;
        decision
    }

    fn scores(confidence: f32, coverage: f32) -> EvidenceScores {
        EvidenceScores {
            confidence,
            coverage,
        }
    }

    const REWRITE: &str = "The quarterly results exceeded expectations, with revenue rising on \
                           stronger subscription renewals. Margins held steady despite higher costs.";

    #[test]
    fn confident_rewrite_triggers_with_whole_draft() {
        let outcome = engine().decide(&routed(TaskKind::Rewrite), "Make it formal", REWRITE, scores(0.8, 0.8));
        assert!(outcome.trigger);
        assert_eq!(outcome.path, DecisionPath::Structured);
        assert_eq!(outcome.payload, REWRITE);
    }

    #[test]
    fn structured_path_needs_editing_task_and_evidence() {
        let engine = engine();
        let weak = engine.decide(&routed(TaskKind::Rewrite), "x", REWRITE, scores(0.5, 0.8));
        assert!(!weak.trigger);
        let thin = engine.decide(&routed(TaskKind::Rewrite), "x", REWRITE, scores(0.8, 0.4));
        assert!(!thin.trigger);
        let summary = engine.decide(&routed(TaskKind::Summarize), "x", REWRITE, scores(1.0, 1.0));
        assert!(!summary.trigger);
        assert_eq!(summary.payload, "");
    }

    #[test]
    fn short_announced_payload_expands_to_full_draft() {
        let draft = format!("Here's the rewritten paragraph: {}", &REWRITE[..80]);
        let outcome = engine().decide(&routed(TaskKind::Style), "x", &draft, scores(0.9, 0.9));
        assert!(outcome.trigger);
        assert_eq!(outcome.payload, draft);
    }

    #[test]
    fn heuristic_announcement_extracts_following_text() {
        let fallback = RouterDecision::fallback("tidy up", None);
        let draft = format!("Sure! I'll write the following: {REWRITE}");
        let outcome = engine().decide(&fallback, "tidy up", &draft, scores(0.0, 0.0));
        assert_eq!(outcome.path, DecisionPath::Heuristic);
        assert!(outcome.trigger);
        assert_eq!(outcome.payload, REWRITE);
    }

    #[test]
    fn typographic_apostrophes_are_announcements() {
        let engine = engine();
        for draft in [
            format!("Here’s the content: {REWRITE}"),
            format!("Sure, I’ll write the following: {REWRITE}"),
            format!("I’ve rewritten this: {REWRITE}"),
        ] {
            assert_eq!(engine.extract(&draft, false), REWRITE, "{draft}");
        }
    }

    #[test]
    fn heuristic_writing_intent_or_long_structure() {
        let engine = engine();
        let fallback = RouterDecision::fallback("x", None);

        let intent = engine.decide(&fallback, "Draft an intro for the report", REWRITE, scores(0.0, 0.0));
        assert!(intent.trigger);

        let long = format!("# Plan\n\n{}", "- a step worth taking today\n".repeat(25));
        let structured = engine.decide(&fallback, "thoughts?", &long, scores(0.0, 0.0));
        assert!(structured.trigger);

        let chat = engine.decide(&fallback, "thoughts?", REWRITE, scores(0.0, 0.0));
        assert!(!chat.trigger);
    }

    #[test]
    fn short_drafts_never_trigger() {
        let outcome = engine().decide(
            &RouterDecision::fallback("x", None),
            "Write a title",
            "Here's the draft: A Short Title",
            scores(0.0, 0.0),
        );
        assert!(!outcome.trigger);
        assert_eq!(outcome.into_content(), None);
    }

    proptest! {
        #[test]
        fn never_triggers_at_or_below_fifty_chars(
            draft in ".{0,50}",
            ask in prop_oneof![Just("Write a summary"), Just("rewrite this"), Just("hi")],
            fallback in any::<bool>(),
            confidence in 0.0f32..=1.0,
            coverage in 0.0f32..=1.0,
        ) {
            let decision = if fallback {
                RouterDecision::fallback(ask, None)
            } else {
                routed(TaskKind::Rewrite)
            };
            let outcome = engine().decide(&decision, ask, &draft, scores(confidence, coverage));
            prop_assert!(!outcome.trigger);
        }
    }
}
