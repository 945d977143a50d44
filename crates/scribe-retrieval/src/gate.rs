//! Relevance gate
//!
//! Decides whether the user's documents should be searched at all. Rules
//! are evaluated in a fixed order and the first one that fires wins:
//!
//! 1. web context `required` → not document-relevant
//! 2. current/live information phrasing → not document-relevant
//! 3. the router needs the selection and one exists → document-relevant
//! 4. explicit reference to the document → document-relevant
//! 5. reference to the user's own content → document-relevant
//! 6. generic long-form writing request → not document-relevant
//! 7. otherwise → not document-relevant

use scribe_signals::{RuleTable, Signal};
use scribe_types::{RouterDecision, WebContext};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Which gate rule decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    /// Router requires web evidence
    WebRequired,
    /// Ask is about current or live information
    CurrentInformation,
    /// Ask operates on the user's selection
    SelectionAnchored,
    /// Ask references the document explicitly
    DocumentAnchored,
    /// Ask references the user's own content
    PersonalContent,
    /// Ask is a generic writing request
    GenericWriting,
    /// No rule fired
    NoDocumentSignal,
}

impl GateReason {
    /// Short label for logs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GateReason::WebRequired => "web_required",
            GateReason::CurrentInformation => "current_information",
            GateReason::SelectionAnchored => "selection_anchored",
            GateReason::DocumentAnchored => "document_anchored",
            GateReason::PersonalContent => "personal_content",
            GateReason::GenericWriting => "generic_writing",
            GateReason::NoDocumentSignal => "no_document_signal",
        }
    }
}

impl fmt::Display for GateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateVerdict {
    /// Whether the user's documents should be searched
    pub document_relevant: bool,
    /// Rule that decided
    pub reason: GateReason,
}

impl GateVerdict {
    #[inline]
    fn relevant(reason: GateReason) -> Self {
        Self {
            document_relevant: true,
            reason,
        }
    }

    #[inline]
    fn irrelevant(reason: GateReason) -> Self {
        Self {
            document_relevant: false,
            reason,
        }
    }
}

/// Keyword relevance gate
#[derive(Debug, Clone)]
pub struct RelevanceGate {
    rules: Arc<RuleTable>,
}

impl RelevanceGate {
    /// Create gate over a rule table
    #[inline]
    #[must_use]
    pub fn new(rules: Arc<RuleTable>) -> Self {
        Self { rules }
    }

    /// Assess an ask
    #[must_use]
    pub fn assess(&self, decision: &RouterDecision, ask: &str, has_selection: bool) -> GateVerdict {
        if decision.needs.web_context == WebContext::Required {
            return GateVerdict::irrelevant(GateReason::WebRequired);
        }
        if self.rules.matches(Signal::CurrentInfo, ask) {
            return GateVerdict::irrelevant(GateReason::CurrentInformation);
        }
        if decision.needs.selection_text && has_selection {
            return GateVerdict::relevant(GateReason::SelectionAnchored);
        }
        if self.rules.matches(Signal::DocumentAnchor, ask) {
            return GateVerdict::relevant(GateReason::DocumentAnchored);
        }
        if self.rules.matches(Signal::PersonalContent, ask) {
            return GateVerdict::relevant(GateReason::PersonalContent);
        }
        if self.rules.matches(Signal::LongFormWriting, ask) {
            return GateVerdict::irrelevant(GateReason::GenericWriting);
        }
        GateVerdict::irrelevant(GateReason::NoDocumentSignal)
    }
}

impl Default for RelevanceGate {
    fn default() -> Self {
        Self::new(Arc::new(RuleTable::builtin()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scribe_types::{DocContext, Needs, Precision, QueryPlan, TaskKind};

    fn decision(web: WebContext, selection: bool) -> RouterDecision {
        RouterDecision {
            task: TaskKind::Summarize,
            confidence: 0.9,
            needs: Needs {
                selection_text: selection,
                doc_context: DocContext::Current,
                web_context: web,
                precision: Precision::Medium,
            },
            query: QueryPlan {
                semantic: String::new(),
                keywords: Vec::new(),
            },
            targets: Vec::new(),
            origin: Default::default(),
        }
    }

    #[test]
    fn rule_order() {
        let gate = RelevanceGate::default();
        let cases = [
            (WebContext::Required, true, "Rewrite this paragraph", GateReason::WebRequired),
            (WebContext::No, true, "What is Tesla's current stock price?", GateReason::CurrentInformation),
            (WebContext::No, true, "Make it punchier", GateReason::SelectionAnchored),
            (WebContext::No, false, "Rewrite this paragraph to be more formal", GateReason::DocumentAnchored),
            (WebContext::No, false, "What does my document say about revenue?", GateReason::PersonalContent),
            (WebContext::No, false, "Write an essay about rivers", GateReason::GenericWriting),
            (WebContext::No, false, "What is the capital of France?", GateReason::NoDocumentSignal),
        ];
        for (web, selection, ask, expected) in cases {
            let verdict = gate.assess(&decision(web, selection), ask, selection);
            assert_eq!(verdict.reason, expected, "{ask}");
        }
    }

    #[test]
    fn relevance_follows_reason() {
        let gate = RelevanceGate::default();
        assert!(gate
            .assess(&decision(WebContext::No, false), "What does my document say about revenue?", false)
            .document_relevant);
        assert!(!gate
            .assess(&decision(WebContext::Recommended, false), "latest news on AI", false)
            .document_relevant);
    }

    #[test]
    fn selection_needs_both_flag_and_text() {
        let gate = RelevanceGate::default();
        let verdict = gate.assess(&decision(WebContext::No, true), "Make it punchier", false);
        assert_eq!(verdict.reason, GateReason::NoDocumentSignal);
        let verdict = gate.assess(&decision(WebContext::No, false), "Make it punchier", true);
        assert_eq!(verdict.reason, GateReason::NoDocumentSignal);
    }
}
