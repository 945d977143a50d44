//! Scribe configuration
//!
//! One TOML document with a section per concern:
//!
//! ```toml
//! [llm]
//! endpoint = "https://api.openai.com/v1/chat/completions"
//! model = "gpt-4o-mini"
//!
//! [retrieval]
//! top_k = 15
//! web_timeout_ms = 4000
//!
//! [[signals.extra_rules]]
//! signal = "current_info"
//! pattern = "\\bexchange rate\\b"
//! ```
//!
//! Every section and field has a default; unknown sections are rejected.

use crate::error::ConfigError;
use scribe_retrieval::{
    clamp_web_timeout, RetrieverConfig, TokenBudget, DEFAULT_DOCUMENT_SHARE, DEFAULT_WEB_SHARE,
};
use scribe_signals::{RuleSpec, RuleTable};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScribeConfig {
    /// Language model settings
    pub llm: LlmConfig,
    /// Retrieval settings
    pub retrieval: RetrieverConfig,
    /// Web search provider and cache
    pub web: WebConfig,
    /// Evidence packing shares
    pub packing: PackingConfig,
    /// Live-edit thresholds
    pub live_edit: LiveEditConfig,
    /// Conversation history bounds
    pub history: HistoryConfig,
    /// Signal rule additions
    pub signals: SignalsConfig,
}

impl ScribeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// Returns [`ConfigError`] on syntax errors, unknown sections or
    /// out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`ScribeConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// With language model settings
    #[inline]
    #[must_use]
    pub fn with_llm(mut self, llm: LlmConfig) -> Self {
        self.llm = llm;
        self
    }

    /// With retrieval settings
    #[inline]
    #[must_use]
    pub fn with_retrieval(mut self, retrieval: RetrieverConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    /// With live-edit thresholds
    #[inline]
    #[must_use]
    pub fn with_live_edit(mut self, live_edit: LiveEditConfig) -> Self {
        self.live_edit = live_edit;
        self
    }

    /// With extra signal rules
    #[inline]
    #[must_use]
    pub fn with_extra_rules(mut self, rules: Vec<RuleSpec>) -> Self {
        self.signals.extra_rules = rules;
        self
    }

    /// Check ranges, clamping the web timeout into its window
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for the first out-of-range value.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let clamped = clamp_web_timeout(Duration::from_millis(self.retrieval.web_timeout_ms));
        let clamped_ms = u64::try_from(clamped.as_millis()).unwrap_or(u64::MAX);
        if clamped_ms != self.retrieval.web_timeout_ms {
            tracing::warn!(
                configured = self.retrieval.web_timeout_ms,
                effective = clamped_ms,
                "web search timeout clamped"
            );
            self.retrieval.web_timeout_ms = clamped_ms;
        }

        if self.retrieval.top_k == 0 {
            return Err(invalid("retrieval.top_k", "must be at least 1"));
        }
        unit_interval("retrieval.low_confidence_threshold", self.retrieval.low_confidence_threshold)?;
        share("packing.document_share", self.packing.document_share)?;
        share("packing.web_share", self.packing.web_share)?;
        if self.packing.document_share + self.packing.web_share > 1.0 {
            return Err(invalid("packing", "document_share + web_share exceeds 1"));
        }
        unit_interval("live_edit.min_confidence", self.live_edit.min_confidence)?;
        unit_interval("live_edit.min_coverage", self.live_edit.min_coverage)?;
        if self.history.max_turns == 0 {
            return Err(invalid("history.max_turns", "must be at least 1"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(invalid("llm.model", "must not be empty"));
        }
        self.rule_table().map(|_| ())
    }

    /// Built-in signal rules plus configured extras
    ///
    /// # Errors
    /// Returns [`ConfigError::Signals`] when an extra pattern is invalid.
    pub fn rule_table(&self) -> Result<RuleTable, ConfigError> {
        Ok(RuleTable::with_extra_rules(&self.signals.extra_rules)?)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn unit_interval(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, "must be within [0, 1]"))
    }
}

fn share(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(invalid(field, "must be within (0, 1]"))
    }
}

/// Language model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint
    pub endpoint: String,
    /// Model for planning and generation
    pub model: String,
    /// Model for classification; defaults to `model`
    pub router_model: Option<String>,
    /// Timeout of classification and planning calls
    pub router_timeout_ms: u64,
    /// Timeout of generation calls
    pub generation_timeout_ms: u64,
    /// Token ceiling of the classification call
    pub router_max_tokens: u32,
    /// Token ceiling of the planning call
    pub planner_max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            router_model: None,
            router_timeout_ms: 8_000,
            generation_timeout_ms: 60_000,
            router_max_tokens: 400,
            planner_max_tokens: 800,
        }
    }
}

impl LlmConfig {
    /// Model used for classification
    #[must_use]
    pub fn router_model(&self) -> &str {
        self.router_model.as_deref().unwrap_or(&self.model)
    }

    /// Classification and planning timeout
    #[inline]
    #[must_use]
    pub fn router_timeout(&self) -> Duration {
        Duration::from_millis(self.router_timeout_ms)
    }

    /// Generation timeout
    #[inline]
    #[must_use]
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}

/// Web search provider and cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebConfig {
    /// Search endpoint; web search is unavailable when unset
    pub endpoint: Option<String>,
    /// Seconds a cached query lives
    pub cache_ttl_secs: u64,
    /// Maximum cached queries
    pub cache_capacity: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            cache_ttl_secs: 600,
            cache_capacity: 256,
        }
    }
}

impl WebConfig {
    /// Cache time-to-live
    #[inline]
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Token budget shares
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackingConfig {
    /// Share of `max_tokens` for document chunks
    pub document_share: f32,
    /// Share of `max_tokens` for web results
    pub web_share: f32,
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            document_share: DEFAULT_DOCUMENT_SHARE,
            web_share: DEFAULT_WEB_SHARE,
        }
    }
}

impl PackingConfig {
    /// Budget for a request's token allowance
    #[inline]
    #[must_use]
    pub fn budget(&self, max_tokens: usize) -> TokenBudget {
        TokenBudget::from_max_tokens(max_tokens, self.document_share, self.web_share)
    }
}

/// Live-edit thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiveEditConfig {
    /// Evidence confidence the structured path must exceed
    pub min_confidence: f32,
    /// Evidence coverage the structured path must exceed
    pub min_coverage: f32,
    /// Extracted payload must be longer than this many characters
    pub min_payload_chars: usize,
    /// Drafts longer than this are kept whole instead of a short extraction
    pub full_draft_chars: usize,
    /// Drafts longer than this with structure markers count as long-form
    pub long_form_chars: usize,
}

impl Default for LiveEditConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            min_coverage: 0.4,
            min_payload_chars: 50,
            full_draft_chars: 100,
            long_form_chars: 500,
        }
    }
}

/// Conversation history bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Turns kept per session
    pub max_turns: usize,
    /// Most recent turns rendered into prompts
    pub prompt_turns: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_turns: scribe_types::DEFAULT_MAX_TURNS,
            prompt_turns: 6,
        }
    }
}

/// Signal rule additions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignalsConfig {
    /// Rules appended after the built-in table
    pub extra_rules: Vec<RuleSpec>,
}
