//! Built-in rules, in priority order within each signal

use crate::table::Signal;

pub(crate) const BUILTIN_RULES: &[(Signal, &str)] = &[
    // Current / live information
    (
        Signal::CurrentInfo,
        r"\b(current|currently|latest|today|tonight|right now|this week|breaking)\b",
    ),
    (
        Signal::CurrentInfo,
        r"\b(stocks?|share price|prices?|market cap|exchange rates?|weather|forecast|scores?|news|headlines)\b",
    ),
    // The open document
    (
        Signal::DocumentAnchor,
        r"\b(in|from|within|of|throughout) (this|the|my) (document|doc|draft|page|text|file|essay|report|article)\b",
    ),
    (
        Signal::DocumentAnchor,
        r"\bth(is|ese) (paragraphs?|sections?|sentences?|passages?|tables?|lines?|bullets?|lists?|documents?|drafts?|headings?)\b",
    ),
    (
        Signal::DocumentAnchor,
        r"\b(the )?(selected|highlighted) (text|paragraph|section|part)\b",
    ),
    // The user's own content
    (
        Signal::PersonalContent,
        r"\bmy (own )?(notes?|documents?|docs?|drafts?|files?|writing|essays?|reports?|research|outline|journal)\b",
    ),
    (
        Signal::PersonalContent,
        r"\bwhat (did|have) i (write|written|say|said|note|noted|mention|mentioned)\b",
    ),
    (
        Signal::PersonalContent,
        r"\b(i|we) (wrote|noted|mentioned|documented|recorded)\b",
    ),
    // Generic long-form writing
    (
        Signal::LongFormWriting,
        r"^\s*(please\s+)?(can you\s+)?(write|compose|draft|generate|create|produce)\b",
    ),
    (
        Signal::LongFormWriting,
        r"\b(write|compose|draft)\b.{0,40}\b(essay|article|story|blog|post|letter|paper|poem|proposal|speech|report)\b",
    ),
    // Writing intent anywhere in the ask
    (
        Signal::WritingIntent,
        r"\b(write|create|generate|compose|draft|report)\b",
    ),
    // Announcement phrases, highest priority first
    (
        Signal::Announcement,
        r"\bi['’]?ll write(?: the following)?\s*:\s*",
    ),
    (
        Signal::Announcement,
        r"\bhere['’]?s the (?:content|draft|text|section|paragraph|(?:rewritten|revised|updated|expanded|new) \w+)\s*:\s*",
    ),
    (
        Signal::Announcement,
        r"\bhere is the (?:content|draft|text|section|paragraph|(?:rewritten|revised|updated|expanded|new) \w+)\s*:\s*",
    ),
    (
        Signal::Announcement,
        r"\bi['’]?ve (?:written|drafted|created|prepared|rewritten|revised)(?: the following| this)?\s*:\s*",
    ),
    (
        Signal::Announcement,
        r"\b(?:adding|writing|inserting) (?:this|the following) (?:to|into) (?:your|the) document\s*:\s*",
    ),
    // Markdown structure
    (Signal::StructureMarker, r"^#{1,6}\s+\S"),
    (Signal::StructureMarker, r"\*\*[^*\n]+\*\*"),
    (Signal::StructureMarker, r"^\s*\d+[.)]\s+\S"),
    (Signal::StructureMarker, r"^\s*[-*•]\s+\S"),
    (Signal::StructureMarker, r"^\s*\|.*\|\s*$"),
];
