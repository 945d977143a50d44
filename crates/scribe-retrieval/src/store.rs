//! Evidence store adapter
//!
//! [`EvidenceStore`] is the seam to whatever vector index backs the
//! deployment. [`InMemoryEvidenceStore`] is a lexical stand-in used by the
//! CLI and tests: documents are split into paragraph chunks and scored by
//! query term overlap.

use crate::error::RetrievalError;
use async_trait::async_trait;
use parking_lot::RwLock;
use scribe_types::{DocumentId, EvidenceChunk};
use std::collections::HashSet;
use std::sync::Arc;

/// Maximum characters per stored chunk
pub const MAX_CHUNK_CHARS: usize = 1200;

/// Which documents a search covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    /// One document
    Document(DocumentId),
    /// Every document the store holds
    All,
}

/// Search options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Maximum number of chunks to return
    pub top_k: usize,
    /// Documents to search
    pub scope: SearchScope,
}

impl SearchOptions {
    /// Search within one document
    #[inline]
    #[must_use]
    pub fn document(id: DocumentId, top_k: usize) -> Self {
        Self {
            top_k,
            scope: SearchScope::Document(id),
        }
    }

    /// Search across every document
    #[inline]
    #[must_use]
    pub fn all(top_k: usize) -> Self {
        Self {
            top_k,
            scope: SearchScope::All,
        }
    }
}

/// Similarity search over the user's documents
///
/// Implementations return chunks ranked by descending relevance score.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Search for chunks relevant to `query`
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<EvidenceChunk>, RetrievalError>;
}

#[async_trait]
impl<T: EvidenceStore + ?Sized> EvidenceStore for Arc<T> {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<EvidenceChunk>, RetrievalError> {
        (**self).search(query, options).await
    }
}

#[derive(Debug, Clone)]
struct StoredChunk {
    id: String,
    document_id: DocumentId,
    text: String,
    terms: HashSet<String>,
}

/// In-memory lexical evidence store
#[derive(Debug, Default)]
pub struct InMemoryEvidenceStore {
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryEvidenceStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a document, replacing any chunks previously stored for it
    ///
    /// Returns the number of chunks stored.
    pub fn index_document(&self, id: &DocumentId, text: &str) -> usize {
        let pieces = split_into_chunks(text, MAX_CHUNK_CHARS);
        let mut chunks = self.chunks.write();
        chunks.retain(|c| &c.document_id != id);
        let count = pieces.len();
        for (n, piece) in pieces.into_iter().enumerate() {
            chunks.push(StoredChunk {
                id: format!("{id}#{n}"),
                document_id: id.clone(),
                terms: terms(&piece).collect(),
                text: piece,
            });
        }
        tracing::debug!(document = %id, chunks = count, "indexed document");
        count
    }

    /// Drop every chunk of a document
    pub fn remove_document(&self, id: &DocumentId) {
        self.chunks.write().retain(|c| &c.document_id != id);
    }

    /// Number of stored chunks
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }
}

#[async_trait]
impl EvidenceStore for InMemoryEvidenceStore {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<EvidenceChunk>, RetrievalError> {
        let query_terms: HashSet<String> = terms(query).collect();
        if query_terms.is_empty() || options.top_k == 0 {
            return Ok(Vec::new());
        }

        let chunks = self.chunks.read();
        let mut hits: Vec<EvidenceChunk> = chunks
            .iter()
            .filter(|c| match &options.scope {
                SearchScope::Document(id) => &c.document_id == id,
                SearchScope::All => true,
            })
            .filter_map(|c| {
                let shared = query_terms.intersection(&c.terms).count();
                (shared > 0).then(|| {
                    #[allow(clippy::cast_precision_loss)]
                    let score = shared as f32 / query_terms.len() as f32;
                    EvidenceChunk::new(c.id.clone(), c.document_id.clone(), c.text.clone(), score)
                })
            })
            .collect();

        hits.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        hits.truncate(options.top_k);
        Ok(hits)
    }
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "her", "was", "one",
    "our", "out", "has", "have", "had", "this", "that", "with", "from", "what", "does", "about",
    "into", "than", "then", "them", "they", "there", "their", "which", "would", "could", "should",
    "will", "your", "yours", "say", "says", "said",
];

/// Lower-cased content terms of `text`
fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
}

/// Split text on blank lines, then hard-wrap paragraphs longer than `max_chars`
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > max_chars {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    out
}
