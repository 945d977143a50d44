//! Bounded linked-document set
//!
//! Each orchestrator session owns one [`LinkedDocumentSet`]. The capacity is
//! fixed at [`MAX_LINKED_DOCUMENTS`]; a link beyond it is rejected and leaves
//! the set untouched.

use crate::evidence::DocumentId;
use serde::Serialize;

/// Maximum number of documents linked to one session
pub const MAX_LINKED_DOCUMENTS: usize = 5;

/// Insertion-ordered set of linked documents, capacity five
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkedDocumentSet {
    ids: Vec<DocumentId>,
}

impl LinkedDocumentSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a document.
    ///
    /// Returns `true` if the document is linked afterwards (including when it
    /// already was) and `false` if the set is full.
    pub fn add(&mut self, id: impl Into<DocumentId>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return true;
        }
        if self.ids.len() >= MAX_LINKED_DOCUMENTS {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Unlink a document. Returns `false` if it was not linked.
    pub fn remove(&mut self, id: &DocumentId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|d| d != id);
        self.ids.len() != before
    }

    /// Check membership
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &DocumentId) -> bool {
        self.ids.iter().any(|d| d == id)
    }

    /// Linked ids, in link order
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[DocumentId] {
        &self.ids
    }

    /// Iterate linked ids
    pub fn iter(&self) -> impl Iterator<Item = &DocumentId> {
        self.ids.iter()
    }

    /// Number of linked documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is linked
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether the set is at capacity
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.ids.len() >= MAX_LINKED_DOCUMENTS
    }
}
