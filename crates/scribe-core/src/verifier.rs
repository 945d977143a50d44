//! Draft verifier
//!
//! Advisory checks of a draft against the evidence it was generated from.
//! Nothing here changes the draft; findings become warnings in the
//! [`VerificationResult`]. The same module produces the guidance lines the
//! generator puts in its system prompt.

use crate::catalog::EvidenceCatalog;
use crate::markdown;
use once_cell::sync::Lazy;
use regex::Regex;
use scribe_types::{
    CitationStyle, ContextRef, EvidenceBundle, InstructionJson, RefKind, VerificationResult,
};
use std::collections::HashSet;

/// Warning attached to drafts produced without any evidence
pub const GENERAL_KNOWLEDGE_WARNING: &str =
    "No sources were available; this answer relies on general knowledge.";

static CLAIM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bas of (?:[a-z]+ )?(?:19|20)\d{2}\b",
        r"\b\d+(?:[.,]\d+)?\s?%",
        r"\$\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:million|billion|trillion|[mbk])\b)?",
        r"(?i)\b\d+(?:\.\d+)?\s(?:million|billion|trillion)\b",
        r"(?i)\b(?:in|since|by|until) (?:19|20)\d{2}\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static NUMBER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\d(?:[\d,.]*\d)?").ok());

static CITATION_MARKER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\[(\d{1,3})\]").ok());

const STOPWORDS: &[&str] = &[
    "about", "after", "also", "been", "from", "have", "into", "more", "that", "their", "them",
    "there", "these", "they", "this", "were", "what", "when", "which", "will", "with", "would",
];

/// Check a draft against its instruction and evidence
#[must_use]
pub fn verify(
    draft: &str,
    instruction: &InstructionJson,
    bundle: &EvidenceBundle,
    catalog: &EvidenceCatalog,
) -> VerificationResult {
    let plain = markdown::to_plain_text(draft);
    let mut warnings = Vec::new();

    if bundle.is_empty() {
        warnings.push(GENERAL_KNOWLEDGE_WARNING.to_string());
    }

    let draft_terms = terms(&plain);
    for context_ref in &instruction.context_refs {
        if !is_traceable(context_ref, bundle, &draft_terms) {
            let label = catalog
                .source_number(bundle, context_ref)
                .map_or_else(|| "a planned source".to_string(), |n| format!("source [{n}]"));
            warnings.push(format!("The answer does not reflect {label}."));
        }
    }

    let evidence: Vec<String> = bundle
        .texts()
        .chain(bundle.web_results.iter().map(|w| w.title.as_str()))
        .map(|t| t.replace(',', ""))
        .collect();
    let mut seen = HashSet::new();
    for claim in claims(&plain) {
        if !seen.insert(claim.to_lowercase()) {
            continue;
        }
        if !is_supported(claim, &evidence) {
            warnings.push(format!("Unsupported claim: \"{claim}\"."));
        }
    }

    if let Some(marker) = CITATION_MARKER.as_ref() {
        let mut flagged = HashSet::new();
        for caps in marker.captures_iter(&plain) {
            let Some(n) = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) else {
                continue;
            };
            if (n == 0 || n > catalog.source_count()) && flagged.insert(n) {
                warnings.push(format!("Citation [{n}] does not match any source."));
            }
        }
    }

    VerificationResult::from_warnings(warnings)
}

/// Guidance lines for the generator's system prompt
#[must_use]
pub fn guidance(instruction: &InstructionJson, bundle: &EvidenceBundle) -> Vec<String> {
    let mut lines = Vec::new();

    if bundle.is_empty() {
        lines.push(
            "No sources are available. Answer from general knowledge, say so briefly, and do \
             not invent figures, dates or citations."
                .to_string(),
        );
    } else {
        match instruction.constraints.citation_style {
            Some(CitationStyle::None) => {}
            Some(CitationStyle::Inline) => {
                lines.push("Name the sources you rely on by their title.".to_string());
            }
            Some(CitationStyle::Numbered) | None => {
                lines.push(
                    "Cite the sources you rely on inline as [n], using the numbers listed under \
                     Sources."
                        .to_string(),
                );
            }
        }
        lines.push(
            "Only state figures, dates and statistics that appear in the sources.".to_string(),
        );
    }

    if instruction.task().is_precise() {
        lines.push(
            "Stick strictly to the sources and point out anything they do not support."
                .to_string(),
        );
    }

    if bundle
        .web_results
        .iter()
        .any(|w| w.published_date.is_none())
    {
        lines.push(
            "Some web results are undated; avoid \"as of\" statements they do not make."
                .to_string(),
        );
    }

    if let Some(max_words) = instruction.constraints.max_words {
        lines.push(format!("Keep the answer under {max_words} words."));
    }
    if let Some(tone) = instruction
        .constraints
        .tone
        .as_deref()
        .filter(|t| !t.trim().is_empty())
    {
        lines.push(format!("Use a {tone} tone."));
    }

    lines
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 3)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn is_traceable(
    context_ref: &ContextRef,
    bundle: &EvidenceBundle,
    draft_terms: &HashSet<String>,
) -> bool {
    let source_text = match context_ref.kind {
        RefKind::Doc => bundle.chunk(&context_ref.id).map(|c| c.text.clone()),
        RefKind::Web => bundle
            .web(&context_ref.id)
            .map(|w| format!("{} {}", w.title, w.snippet)),
    };
    let Some(source_text) = source_text else {
        return false;
    };
    let source_terms = terms(&source_text);
    let needed = source_terms.len().min(2);
    source_terms.intersection(draft_terms).count() >= needed
}

fn claims(text: &str) -> Vec<&str> {
    let mut found: Vec<(usize, &str)> = CLAIM_PATTERNS
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| (m.start(), m.as_str().trim())))
        .collect();
    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, claim)| claim).collect()
}

fn is_supported(claim: &str, evidence: &[String]) -> bool {
    let Some(number) = NUMBER.as_ref() else {
        return true;
    };
    let figures: Vec<String> = number
        .find_iter(claim)
        .map(|m| m.as_str().replace(',', ""))
        .collect();
    if figures.is_empty() {
        return true;
    }
    evidence
        .iter()
        .any(|text| figures.iter().all(|figure| text.contains(figure.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scribe_types::{
        Constraints, EvidenceChunk, TaskInputs, TaskKind, Telemetry, WebResult,
    };
    use std::collections::HashMap;

    fn bundle() -> EvidenceBundle {
        EvidenceBundle {
            chunks: vec![EvidenceChunk::new(
                "r#0",
                "r",
                "Quarterly revenue grew 12% to $4,200 as of 2024, driven by subscriptions.",
                0.8,
            )],
            ..EvidenceBundle::default()
        }
    }

    fn instruction(task: TaskKind, refs: Vec<ContextRef>) -> InstructionJson {
        InstructionJson {
            inputs: TaskInputs::minimal(task, "text"),
            targets: Vec::new(),
            context_refs: refs,
            constraints: Constraints::default(),
            telemetry: Telemetry::default(),
        }
    }

    fn doc_ref(id: &str) -> ContextRef {
        ContextRef {
            kind: RefKind::Doc,
            id: id.to_string(),
            why: String::new(),
        }
    }

    fn check(draft: &str, instruction: &InstructionJson, bundle: &EvidenceBundle) -> VerificationResult {
        let catalog = EvidenceCatalog::build(bundle, &HashMap::new());
        verify(draft, instruction, bundle, &catalog)
    }

    #[test]
    fn supported_draft_is_valid() {
        let result = check(
            "**Revenue** grew 12% to $4,200 as of 2024 thanks to subscriptions [1].",
            &instruction(TaskKind::Summarize, vec![doc_ref("r#0")]),
            &bundle(),
        );
        assert_eq!(result, VerificationResult::from_warnings(Vec::new()));
    }

    #[test]
    fn empty_bundle_warns_about_general_knowledge() {
        let result = check(
            "Stocks tend to rise over time.",
            &instruction(TaskKind::Summarize, Vec::new()),
            &EvidenceBundle::empty(),
        );
        assert!(!result.is_valid);
        assert_eq!(result.warnings, vec![GENERAL_KNOWLEDGE_WARNING.to_string()]);
    }

    #[test]
    fn unsupported_claims_are_flagged_once() {
        let result = check(
            "Revenue grew 15% as of 2023. Again, 15% as of 2023. Costs hit 3 billion.",
            &instruction(TaskKind::Summarize, Vec::new()),
            &bundle(),
        );
        assert_eq!(
            result.warnings,
            vec![
                "Unsupported claim: \"15%\".".to_string(),
                "Unsupported claim: \"as of 2023\".".to_string(),
                "Unsupported claim: \"3 billion\".".to_string(),
            ]
        );
    }

    #[test]
    fn untraceable_refs_and_bad_markers_are_flagged() {
        let result = check(
            "Weather was pleasant all week [3].",
            &instruction(TaskKind::Summarize, vec![doc_ref("r#0")]),
            &bundle(),
        );
        assert_eq!(
            result.warnings,
            vec![
                "The answer does not reflect source [1].".to_string(),
                "Citation [3] does not match any source.".to_string(),
            ]
        );
    }

    #[test]
    fn guidance_follows_instruction_and_evidence() {
        let mut precise = instruction(TaskKind::FactCheck, Vec::new());
        precise.constraints.max_words = Some(80);
        precise.constraints.tone = Some("neutral".into());
        let mut with_web = bundle();
        with_web
            .web_results
            .push(WebResult::new("Wire", "https://wire.test", "undated"));

        let lines = guidance(&precise, &with_web);
        assert!(lines[0].contains("[n]"));
        assert!(lines.iter().any(|l| l.contains("Stick strictly")));
        assert!(lines.iter().any(|l| l.contains("undated")));
        assert!(lines.iter().any(|l| l == "Keep the answer under 80 words."));
        assert!(lines.iter().any(|l| l == "Use a neutral tone."));

        let empty = guidance(&instruction(TaskKind::Extend, Vec::new()), &EvidenceBundle::empty());
        assert_eq!(empty.len(), 1);
        assert!(empty[0].starts_with("No sources are available."));
    }
}
