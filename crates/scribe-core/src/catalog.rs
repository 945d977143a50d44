//! Evidence catalog
//!
//! Numbers the sources of a bundle and gives every piece of evidence a short
//! alias. Prompts only ever show aliases (`D1`, `W1`) and numbered titles
//! (`[1] Q3 Report`); raw document identifiers and chunk ids stay on this
//! side of the model boundary.

use crate::document::DocumentStore;
use indexmap::IndexMap;
use scribe_types::{ContextRef, DocumentId, EvidenceBundle, RefKind};
use std::collections::HashMap;
use std::fmt::Write as _;

/// One numbered source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// 1-based source number
    pub number: usize,
    /// Human-readable title
    pub title: String,
    /// Evidence kind
    pub kind: RefKind,
}

/// Numbered sources and evidence aliases for one bundle
#[derive(Debug, Clone, Default)]
pub struct EvidenceCatalog {
    sources: Vec<Source>,
    documents: IndexMap<DocumentId, usize>,
    web: IndexMap<String, usize>,
    chunk_aliases: IndexMap<String, String>,
    web_aliases: IndexMap<String, String>,
}

impl EvidenceCatalog {
    /// Build a catalog from known document titles.
    ///
    /// Documents without a title are labelled "Document n".
    #[must_use]
    pub fn build(bundle: &EvidenceBundle, titles: &HashMap<DocumentId, String>) -> Self {
        let mut catalog = Self::default();

        for (index, chunk) in bundle.chunks.iter().enumerate() {
            if !catalog.documents.contains_key(&chunk.document_id) {
                let number = catalog.sources.len() + 1;
                let title = titles
                    .get(&chunk.document_id)
                    .filter(|t| !t.trim().is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("Document {number}"));
                catalog.sources.push(Source {
                    number,
                    title,
                    kind: RefKind::Doc,
                });
                catalog.documents.insert(chunk.document_id.clone(), number);
            }
            catalog
                .chunk_aliases
                .insert(format!("D{}", index + 1), chunk.id.clone());
        }

        for (index, result) in bundle.web_results.iter().enumerate() {
            if !catalog.web.contains_key(&result.url) {
                let number = catalog.sources.len() + 1;
                let title = if result.title.trim().is_empty() {
                    result.url.clone()
                } else {
                    result.title.clone()
                };
                catalog.sources.push(Source {
                    number,
                    title,
                    kind: RefKind::Web,
                });
                catalog.web.insert(result.url.clone(), number);
            }
            catalog
                .web_aliases
                .insert(format!("W{}", index + 1), result.url.clone());
        }

        catalog
    }

    /// Build a catalog, resolving titles through the document store
    pub async fn resolve(
        bundle: &EvidenceBundle,
        store: &dyn DocumentStore,
        user_id: &str,
    ) -> Self {
        let mut titles = HashMap::new();
        for chunk in &bundle.chunks {
            if titles.contains_key(&chunk.document_id) {
                continue;
            }
            match store.get_document(&chunk.document_id, user_id).await {
                Ok(document) => {
                    titles.insert(chunk.document_id.clone(), document.title);
                }
                Err(err) => {
                    tracing::warn!(
                        document_id = %chunk.document_id,
                        error = %err,
                        "title lookup failed, using a numbered label"
                    );
                }
            }
        }
        Self::build(bundle, &titles)
    }

    /// Numbered sources, in order
    #[must_use]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Number of sources
    #[inline]
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Source titles, in number order
    #[must_use]
    pub fn citations(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.title.clone()).collect()
    }

    /// Map an alias (`D2`, `W1`) back to a chunk id or url.
    ///
    /// Ids that are already real pass through unchanged.
    #[must_use]
    pub fn resolve_ref(&self, kind: RefKind, id: &str) -> String {
        let key = id.trim().to_ascii_uppercase();
        let aliases = match kind {
            RefKind::Doc => &self.chunk_aliases,
            RefKind::Web => &self.web_aliases,
        };
        aliases
            .get(&key)
            .cloned()
            .unwrap_or_else(|| id.trim().to_string())
    }

    /// Source number a context ref points at
    #[must_use]
    pub fn source_number(&self, bundle: &EvidenceBundle, context_ref: &ContextRef) -> Option<usize> {
        match context_ref.kind {
            RefKind::Doc => bundle
                .chunk(&context_ref.id)
                .and_then(|chunk| self.documents.get(&chunk.document_id))
                .copied(),
            RefKind::Web => self.web.get(&context_ref.id).copied(),
        }
    }

    /// Evidence listing for the planner: one aliased line per item
    #[must_use]
    pub fn render_aliased(&self, bundle: &EvidenceBundle) -> String {
        let mut out = String::new();
        for (index, chunk) in bundle.chunks.iter().enumerate() {
            let title = self.document_title(&chunk.document_id);
            let _ = writeln!(out, "D{} ({title}): {}", index + 1, one_line(&chunk.text));
        }
        for (index, result) in bundle.web_results.iter().enumerate() {
            let _ = writeln!(
                out,
                "W{} ({}): {}",
                index + 1,
                result.title,
                one_line(&result.snippet)
            );
        }
        out
    }

    /// Evidence listing for the generator, grouped under numbered titles
    #[must_use]
    pub fn render_numbered(&self, bundle: &EvidenceBundle) -> String {
        let mut out = String::new();
        for source in &self.sources {
            let _ = writeln!(out, "[{}] {}", source.number, source.title);
            match source.kind {
                RefKind::Doc => {
                    for chunk in bundle
                        .chunks
                        .iter()
                        .filter(|c| self.documents.get(&c.document_id) == Some(&source.number))
                    {
                        let _ = writeln!(out, "  - {}", one_line(&chunk.text));
                    }
                }
                RefKind::Web => {
                    for result in bundle
                        .web_results
                        .iter()
                        .filter(|r| self.web.get(&r.url) == Some(&source.number))
                    {
                        let _ = writeln!(out, "  - {}", one_line(&result.snippet));
                        if let Some(date) = result.published_date {
                            let _ = writeln!(out, "    published {}", date.format("%Y-%m-%d"));
                        }
                    }
                }
            }
        }
        out
    }

    fn document_title(&self, id: &DocumentId) -> &str {
        self.documents
            .get(id)
            .and_then(|n| self.sources.get(n - 1))
            .map_or("untitled", |s| s.title.as_str())
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
