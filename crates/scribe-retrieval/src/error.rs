//! Error types for retrieval
//!
//! Retrieval failures are recovered locally by the context retriever: a
//! failing source contributes nothing and the pipeline continues. The only
//! error that escapes [`crate::ContextRetriever::retrieve`] is
//! [`RetrievalError::Cancelled`].

/// Retrieval errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetrievalError {
    /// Evidence store call failed
    #[error("evidence store error: {0}")]
    Store(String),

    /// Web search call failed
    #[error("web search error: {0}")]
    WebSearch(String),

    /// Call exceeded its timeout
    #[error("operation timed out after {millis}ms")]
    Timeout {
        /// Timeout that elapsed
        millis: u64,
    },

    /// Caller cancelled the request
    #[error("retrieval cancelled")]
    Cancelled,
}

impl RetrievalError {
    /// Whether the caller cancelled
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
