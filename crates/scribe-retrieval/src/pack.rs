//! Evidence packer and scorer
//!
//! Packing is greedy in input order: document chunks fill the document
//! budget and web results fill the web budget. A group stops at the first
//! item that does not fit, so a high-ranked chunk is never displaced by a
//! smaller, lower-ranked one.

use scribe_types::{EvidenceBundle, EvidenceChunk, TaskKind, WebResult};
use serde::Serialize;

/// Default share of the token budget given to document chunks
pub const DEFAULT_DOCUMENT_SHARE: f32 = 0.70;

/// Default share of the token budget given to web results
pub const DEFAULT_WEB_SHARE: f32 = 0.15;

/// Coverage floor for long-form writing tasks with any evidence
pub const LONG_FORM_COVERAGE_FLOOR: f32 = 0.3;

/// Token budgets for the two evidence groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenBudget {
    /// Tokens available to document chunks
    pub document: usize,
    /// Tokens available to web results
    pub web: usize,
}

impl TokenBudget {
    /// Create budget
    #[inline]
    #[must_use]
    pub fn new(document: usize, web: usize) -> Self {
        Self { document, web }
    }

    /// Split a request's token allowance by share
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn from_max_tokens(max_tokens: usize, document_share: f32, web_share: f32) -> Self {
        let share = |s: f32| (max_tokens as f32 * s.clamp(0.0, 1.0)).floor() as usize;
        Self {
            document: share(document_share),
            web: share(web_share),
        }
    }
}

/// Pack chunks and web results into a bundle within `budget`
#[must_use]
pub fn pack(
    chunks: Vec<EvidenceChunk>,
    web_results: Vec<WebResult>,
    budget: TokenBudget,
) -> EvidenceBundle {
    let mut bundle = EvidenceBundle {
        document_budget: budget.document,
        web_budget: budget.web,
        ..EvidenceBundle::empty()
    };

    let mut document_used = 0;
    for chunk in chunks {
        if document_used + chunk.token_count > budget.document {
            break;
        }
        document_used += chunk.token_count;
        bundle.chunks.push(chunk);
    }

    let mut web_used = 0;
    for result in web_results {
        let tokens = result.token_count();
        if web_used + tokens > budget.web {
            break;
        }
        web_used += tokens;
        bundle.web_results.push(result);
    }

    bundle.tokens_used = document_used + web_used;
    bundle
}

/// Evidence quality scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvidenceScores {
    /// Strength of document evidence in `[0, 1]`
    pub confidence: f32,
    /// Overall evidence coverage in `[0, 1]`
    pub coverage: f32,
}

/// Confidence of a set of chunks: twice the mean relevance score, capped at 1
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn confidence(chunks: &[EvidenceChunk]) -> f32 {
    let scores: Vec<f32> = chunks
        .iter()
        .map(|c| c.relevance_score)
        .filter(|s| s.is_finite())
        .map(|s| s.max(0.0))
        .collect();
    if scores.is_empty() {
        return 0.0;
    }
    let mean = scores.iter().sum::<f32>() / scores.len() as f32;
    (mean * 2.0).min(1.0)
}

/// Score a packed bundle for a task
///
/// Coverage is the document confidence plus up to 0.5 for web results.
/// Long-form writing tasks get a coverage floor whenever any evidence is
/// present.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score(bundle: &EvidenceBundle, task: TaskKind) -> EvidenceScores {
    let confidence = confidence(&bundle.chunks);
    let web_term = (0.1 * bundle.web_results.len() as f32).min(0.5);
    let mut coverage = (confidence + web_term).clamp(0.0, 1.0);
    if task.is_long_form_writing() && !bundle.is_empty() {
        coverage = coverage.max(LONG_FORM_COVERAGE_FLOOR);
    }
    EvidenceScores {
        confidence,
        coverage,
    }
}
