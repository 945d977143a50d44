//! Rule table

use crate::builtin::BUILTIN_RULES;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What a matching rule says about a piece of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Asks about current or live information (prices, news, today)
    CurrentInfo,
    /// Explicit reference to the open document or a part of it
    DocumentAnchor,
    /// Reference to the user's own writing or notes
    PersonalContent,
    /// Generic long-form writing request
    LongFormWriting,
    /// Verb expressing intent to produce content
    WritingIntent,
    /// Model phrase announcing content that follows
    Announcement,
    /// Markdown structure (heading, bold, list, table)
    StructureMarker,
}

impl Signal {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::CurrentInfo => "current_info",
            Signal::DocumentAnchor => "document_anchor",
            Signal::PersonalContent => "personal_content",
            Signal::LongFormWriting => "long_form_writing",
            Signal::WritingIntent => "writing_intent",
            Signal::Announcement => "announcement",
            Signal::StructureMarker => "structure_marker",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of signals detected in a text
pub type SignalSet = BTreeSet<Signal>;

/// Serializable rule definition, as found in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Signal raised when the pattern matches
    pub signal: Signal,
    /// Regular expression, matched case-insensitively and multi-line
    pub pattern: String,
}

impl RuleSpec {
    /// Create rule spec
    #[must_use]
    pub fn new(signal: Signal, pattern: impl Into<String>) -> Self {
        Self {
            signal,
            pattern: pattern.into(),
        }
    }
}

/// Rule compilation errors
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Pattern failed to compile
    #[error("invalid pattern for {signal}: {pattern}: {source}")]
    InvalidPattern {
        /// Signal of the rule
        signal: Signal,
        /// Offending pattern
        pattern: String,
        /// Regex error
        #[source]
        source: regex::Error,
    },
}

/// A compiled rule
#[derive(Debug, Clone)]
pub struct Rule {
    signal: Signal,
    pattern: Regex,
}

impl Rule {
    /// Compile a rule
    ///
    /// # Errors
    /// Returns [`SignalError::InvalidPattern`] when the pattern does not compile.
    pub fn compile(spec: &RuleSpec) -> Result<Self, SignalError> {
        let pattern = RegexBuilder::new(&spec.pattern)
            .case_insensitive(true)
            .multi_line(true)
            .build()
            .map_err(|source| SignalError::InvalidPattern {
                signal: spec.signal,
                pattern: spec.pattern.clone(),
                source,
            })?;
        Ok(Self {
            signal: spec.signal,
            pattern,
        })
    }

    /// Signal of this rule
    #[inline]
    #[must_use]
    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// Pattern source
    #[inline]
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

/// A rule match inside a text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalMatch<'t> {
    /// Matched signal
    pub signal: Signal,
    /// Index of the rule within the table
    pub rule_index: usize,
    /// Byte offset where the match starts
    pub start: usize,
    /// Byte offset where the match ends
    pub end: usize,
    /// Matched text
    pub text: &'t str,
}

/// Ordered rule table; earlier rules take priority
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

static SHARED: Lazy<RuleTable> = Lazy::new(RuleTable::builtin);

impl RuleTable {
    /// Table holding only the built-in rules
    #[must_use]
    pub fn builtin() -> Self {
        let rules = BUILTIN_RULES
            .iter()
            .filter_map(|(signal, pattern)| Rule::compile(&RuleSpec::new(*signal, *pattern)).ok())
            .collect();
        Self { rules }
    }

    /// Process-wide built-in table
    #[must_use]
    pub fn shared() -> &'static RuleTable {
        &SHARED
    }

    /// Built-in rules followed by `extra` (lowest priority)
    ///
    /// # Errors
    /// Returns the first pattern that fails to compile.
    pub fn with_extra_rules(extra: &[RuleSpec]) -> Result<Self, SignalError> {
        let mut table = Self::builtin();
        for spec in extra {
            table.rules.push(Rule::compile(spec)?);
        }
        Ok(table)
    }

    /// Rules raising `signal`, in priority order
    pub fn rules_for(&self, signal: Signal) -> impl Iterator<Item = (usize, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .filter(move |(_, rule)| rule.signal == signal)
    }

    /// Whether any rule for `signal` matches
    #[must_use]
    pub fn matches(&self, signal: Signal, text: &str) -> bool {
        self.rules_for(signal).any(|(_, rule)| rule.pattern.is_match(text))
    }

    /// Match of the highest-priority rule for `signal` that matches anywhere
    /// in `text`
    #[must_use]
    pub fn first_match<'t>(&self, signal: Signal, text: &'t str) -> Option<SignalMatch<'t>> {
        self.rules_for(signal).find_map(|(rule_index, rule)| {
            rule.pattern.find(text).map(|m| SignalMatch {
                signal,
                rule_index,
                start: m.start(),
                end: m.end(),
                text: m.as_str(),
            })
        })
    }

    /// Every signal raised by `text`
    #[must_use]
    pub fn signals(&self, text: &str) -> SignalSet {
        self.rules
            .iter()
            .filter(|rule| rule.pattern.is_match(text))
            .map(|rule| rule.signal)
            .collect()
    }

    /// Number of rules
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}
