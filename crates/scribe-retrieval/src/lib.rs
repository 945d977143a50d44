//! Scribe Retrieval
//!
//! Evidence gathering for the orchestration pipeline:
//! - [`EvidenceStore`]: similarity search over the user's documents
//! - [`WebSearchClient`]: external search, bounded by timeout and cancellation
//! - [`RelevanceGate`]: keyword gate deciding whether the current document matters
//! - [`ContextRetriever`]: combines the above per request
//! - [`pack`] and [`score`]: token-budgeted packing and confidence scoring
//!
//! # Example
//!
//! ```rust
//! use scribe_retrieval::{pack, score, TokenBudget};
//! use scribe_types::{EvidenceChunk, TaskKind};
//!
//! let chunks = vec![EvidenceChunk::new("d#0", "d", "Revenue grew 12%.", 0.4)];
//! let bundle = pack(chunks, Vec::new(), TokenBudget::from_max_tokens(2000, 0.7, 0.15));
//! let scores = score(&bundle, TaskKind::Summarize);
//! assert!((scores.confidence - 0.8).abs() < 1e-6);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod gate;
pub mod pack;
pub mod retriever;
pub mod store;
pub mod web;

pub use error::RetrievalError;
pub use gate::{GateReason, GateVerdict, RelevanceGate};
pub use pack::{
    confidence, pack, score, EvidenceScores, TokenBudget, DEFAULT_DOCUMENT_SHARE,
    DEFAULT_WEB_SHARE, LONG_FORM_COVERAGE_FLOOR,
};
pub use retriever::{ContextRetriever, RetrievalRequest, RetrievedContext, RetrieverConfig};
pub use store::{EvidenceStore, InMemoryEvidenceStore, SearchOptions, SearchScope};
pub use web::{
    clamp_web_timeout, search_bounded, CachedWebSearch, HttpWebSearchClient, HttpWebSearchConfig,
    WebSearchClient, WebSearchOptions, MAX_WEB_TIMEOUT, MIN_WEB_TIMEOUT,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
