//! Scribe Signals
//!
//! One table of `{pattern, signal}` rules consumed by the task router (as
//! prompt hints), the relevance gate (document vs. general asks) and the
//! live-edit heuristic (announcement phrases, writing verbs, structure
//! markers). Keeping the keyword lists in one place keeps those three
//! consumers from drifting apart.
//!
//! # Example
//!
//! ```rust
//! use scribe_signals::{RuleTable, Signal};
//!
//! let table = RuleTable::shared();
//! assert!(table.matches(Signal::CurrentInfo, "What is the latest stock price?"));
//! assert!(table.matches(Signal::DocumentAnchor, "Tighten this paragraph"));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod builtin;
mod table;

pub use table::{Rule, RuleSpec, RuleTable, Signal, SignalError, SignalMatch, SignalSet};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
