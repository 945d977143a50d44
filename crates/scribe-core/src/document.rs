//! Document store adapter
//!
//! The core reads titles for citations and patches content when a live
//! edit is applied. [`InMemoryDocumentStore`] backs the CLI and tests.

use crate::error::DocumentError;
use async_trait::async_trait;
use dashmap::DashMap;
use scribe_types::{Document, DocumentId, DocumentPatch};
use std::sync::Arc;

/// Access to the user's documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document the user may read
    async fn get_document(&self, id: &DocumentId, user_id: &str)
        -> Result<Document, DocumentError>;

    /// Patch a document, returning the updated document
    async fn update_document(
        &self,
        id: &DocumentId,
        patch: DocumentPatch,
    ) -> Result<Document, DocumentError>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn get_document(
        &self,
        id: &DocumentId,
        user_id: &str,
    ) -> Result<Document, DocumentError> {
        (**self).get_document(id, user_id).await
    }

    async fn update_document(
        &self,
        id: &DocumentId,
        patch: DocumentPatch,
    ) -> Result<Document, DocumentError> {
        (**self).update_document(id, patch).await
    }
}

/// In-memory document store keyed by id
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: DashMap<DocumentId, Document>,
}

impl InMemoryDocumentStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document
    pub fn insert(&self, document: Document) {
        self.documents.insert(document.id.clone(), document);
    }

    /// Number of documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_document(
        &self,
        id: &DocumentId,
        user_id: &str,
    ) -> Result<Document, DocumentError> {
        let document = self
            .documents
            .get(id)
            .ok_or_else(|| DocumentError::NotFound(id.clone()))?;
        if document.owner_id != user_id {
            return Err(DocumentError::Forbidden {
                document_id: id.clone(),
                user_id: user_id.to_string(),
            });
        }
        Ok(document.clone())
    }

    async fn update_document(
        &self,
        id: &DocumentId,
        patch: DocumentPatch,
    ) -> Result<Document, DocumentError> {
        let mut document = self
            .documents
            .get_mut(id)
            .ok_or_else(|| DocumentError::NotFound(id.clone()))?;
        patch.apply_to(&mut document);
        Ok(document.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn owner_checks() {
        let store = InMemoryDocumentStore::new();
        store.insert(Document::new("d1", "alice", "Q3 Report", "Revenue grew."));

        let doc = store.get_document(&DocumentId::new("d1"), "alice").await.unwrap();
        assert_eq!(doc.title, "Q3 Report");

        let err = store.get_document(&DocumentId::new("d1"), "bob").await.unwrap_err();
        assert!(matches!(err, DocumentError::Forbidden { .. }));

        let err = store.get_document(&DocumentId::new("nope"), "alice").await.unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));
    }

    #[tokio::test]
    async fn patch_updates_content() {
        let store = InMemoryDocumentStore::new();
        store.insert(Document::new("d1", "alice", "Notes", "old"));
        let updated = store
            .update_document(&DocumentId::new("d1"), DocumentPatch::content("new", "<p>new</p>"))
            .await
            .unwrap();
        assert_eq!(updated.plain_text, "new");
        assert_eq!(updated.title, "Notes");
    }
}
