//! # VectorStore
//!
//! In-memory document collection with brute-force cosine-similarity search.
//!
//! This module holds [`Document`]s in a plain id-keyed map and answers
//! nearest-neighbor queries by scanning every stored embedding. There is no
//! index: at the intended scale (hundreds to low thousands of documents) an
//! exact O(n·d) scan is fast, predictable, and has no build step. Embedding
//! generation is delegated to an injected [`Embedder`].
//!
//! ## Responsibilities
//! - **CRUD**: Insert-or-overwrite by id, lookup, content/metadata update,
//!   deletion, batch variants.
//! - **Search**: Cosine similarity against every stored document, filtered
//!   by a threshold and capped by a result limit.
//! - **Grouping**: A deliberately naive single-pass clustering utility.
//! - **Persistence**: Optional, caller-invoked YAML export/import of the
//!   document set. The store itself never touches the filesystem otherwise.
//!
//! ## Concurrency
//! A store instance expects one logical caller. Searches are pure reads
//! (scoring fans out across a rayon pool internally), mutation takes
//! `&mut self`, and nothing is locked. Driving one store from several
//! callers at once is out of contract.
//!
//! ## Quick Example
//! ```
//! use lorebook::document::Document;
//! use lorebook::embedding::{BoxError, Embedder};
//! use lorebook::vector_store::{SearchOptions, VectorStore};
//! use std::sync::Arc;
//!
//! struct StubEmbedder;
//!
//! #[async_trait::async_trait]
//! impl Embedder for StubEmbedder {
//!     async fn embed(&self, _text: &str) -> Result<Vec<f32>, BoxError> {
//!         Ok(vec![1.0, 0.0])
//!     }
//! }
//!
//! # async fn run() -> lorebook::error::Result<()> {
//! let mut store = VectorStore::new(Arc::new(StubEmbedder));
//! store.add(Document::new("Rust is great!", vec![1.0, 0.0]).with_id("doc-1"));
//!
//! let results = store.search_by_text("I love Rust!", SearchOptions::default()).await?;
//! assert_eq!(results[0].document.id, "doc-1");
//! # Ok(()) }
//! ```

use rayon::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::document::{Document, SearchResult};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};

/// Cosine similarity between two vectors: `dot(a,b) / (‖a‖·‖b‖)`.
///
/// By convention the result is 0.0 (never NaN, never an error) when
/// either vector has zero norm or the lengths differ.
///
/// # Examples
/// ```
/// use lorebook::vector_store::cosine_similarity;
///
/// assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
/// assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), 0.0);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let denominator = vector_norm(a) * vector_norm(b);
    if denominator <= f32::EPSILON {
        0.0
    } else {
        dot / denominator
    }
}

/// Euclidean norm of a vector: `sqrt(Σ v[i]^2)`.
pub fn vector_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Knobs for a similarity query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    /// Minimum cosine similarity for a result to be returned.
    pub threshold: f32,
    /// Maximum number of results.
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            limit: 10,
        }
    }
}

/// Observability snapshot of a store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    /// How many documents are held.
    pub documents: usize,
    /// Embedding length observed on a stored document, if any are held.
    pub dimension: Option<usize>,
    /// Mean Euclidean norm across stored embeddings (1.0 across the board
    /// for normalized embeddings).
    pub avg_norm: f32,
}

/// Mutable in-memory document collection with exact similarity search.
///
/// Documents live here until deleted, cleared, or the store is dropped;
/// there is no implicit persistence. The embedder supplied at construction
/// is used by [`search_by_text`](Self::search_by_text) and
/// [`embed`](Self::embed) and is awaited sequentially, never concurrently.
pub struct VectorStore {
    documents: HashMap<String, Document>,
    embedder: Arc<dyn Embedder>,
}

impl VectorStore {
    /// Create an empty store around an injected embedder.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            documents: HashMap::new(),
            embedder,
        }
    }

    /// Embed text through the injected embedder.
    ///
    /// # Errors
    /// The embedder's failure, wrapped as the source of
    /// [`RagError::Embedding`] with the original error untouched.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder
            .embed(text)
            .await
            .map_err(RagError::Embedding)
    }

    /// Insert a document, overwriting any existing document with the same
    /// id. The document is searchable immediately. No capacity limit is
    /// enforced here.
    pub fn add(&mut self, document: Document) {
        debug!("Adding document {}", document.id);
        self.documents.insert(document.id.clone(), document);
    }

    /// Sequential [`add`](Self::add) for each element.
    ///
    /// Not atomic: if a caller-side wrapper rejects a document partway
    /// through a prepared batch, the documents added before it stay added.
    /// Callers needing all-or-nothing semantics should build a fresh store
    /// and swap it in.
    pub fn add_batch(&mut self, documents: Vec<Document>) {
        for document in documents {
            self.add(document);
        }
    }

    /// Look up a document by id. Missing ids are `None`, not an error.
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    /// Replace a document's content, merge in metadata when given, and
    /// refresh its timestamp. Returns false when the id is unknown.
    ///
    /// The embedding is deliberately **not** recomputed: that would smuggle
    /// an async model call into a synchronous update. After a content edit
    /// the stored vector still describes the old text, so callers who care
    /// about search correctness must re-add the document with a fresh
    /// embedding.
    pub fn update_document(
        &mut self,
        id: &str,
        content: impl Into<String>,
        metadata: Option<Map<String, Value>>,
    ) -> bool {
        match self.documents.get_mut(id) {
            Some(document) => {
                document.content = content.into();
                if let Some(metadata) = metadata {
                    document.metadata.extend(metadata);
                }
                document.timestamp = chrono::Utc::now();
                true
            }
            None => false,
        }
    }

    /// Remove a document. Returns whether one was removed; an absent id is
    /// a no-op.
    pub fn delete(&mut self, id: &str) -> bool {
        let removed = self.documents.remove(id).is_some();
        if removed {
            debug!("Deleted document {id}");
        }
        removed
    }

    /// Remove several documents, returning how many were actually removed.
    pub fn delete_batch<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        ids.iter().filter(|id| self.delete(id.as_ref())).count()
    }

    /// Remove all documents.
    pub fn clear(&mut self) {
        debug!("Clearing {} documents", self.documents.len());
        self.documents.clear();
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterate over all stored documents, in no particular order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// Score every stored document against `embedding`, keep those at or
    /// above `options.threshold`, sort descending by similarity, and return
    /// at most `options.limit` results.
    ///
    /// Ties sort in an unspecified order. An empty store returns an empty
    /// vector.
    pub fn search(&self, embedding: &[f32], options: SearchOptions) -> Vec<SearchResult> {
        let results = self.scan(embedding, options, None);
        debug!(
            "Search matched {} of {} documents",
            results.len(),
            self.documents.len()
        );
        results
    }

    /// Embed `query` through the injected embedder, then delegate to
    /// [`search`](Self::search).
    ///
    /// # Errors
    /// Propagates the embedder's failure; no retry, no fallback.
    pub async fn search_by_text(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let embedding = self.embed(query).await?;
        Ok(self.search(&embedding, options))
    }

    /// Search with a stored document's own embedding, excluding that
    /// document from the results. Returns `None` for an unknown id.
    pub fn find_similar(&self, document_id: &str, options: SearchOptions) -> Option<Vec<SearchResult>> {
        let document = self.documents.get(document_id)?;
        Some(self.scan(&document.embedding, options, Some(document_id)))
    }

    /// Linear filter over all documents by a caller-supplied predicate on
    /// their metadata.
    pub fn documents_by_metadata<F>(&self, predicate: F) -> Vec<&Document>
    where
        F: Fn(&Map<String, Value>) -> bool,
    {
        self.documents
            .values()
            .filter(|document| predicate(&document.metadata))
            .collect()
    }

    /// Group documents by a single first-fit pass: each document joins the
    /// first cluster whose first member scores at or above `threshold`
    /// against it, or starts a new cluster.
    ///
    /// This is a rough grouping utility, O(n²) worst case, with no centroid
    /// recomputation. Cluster order and order within clusters are
    /// unspecified.
    pub fn cluster_documents(&self, threshold: f32) -> Vec<Vec<Document>> {
        let mut clusters: Vec<Vec<&Document>> = Vec::new();
        for document in self.documents.values() {
            let slot = clusters.iter_mut().find(|cluster| {
                cosine_similarity(&cluster[0].embedding, &document.embedding) >= threshold
            });
            match slot {
                Some(cluster) => cluster.push(document),
                None => clusters.push(vec![document]),
            }
        }
        clusters
            .into_iter()
            .map(|cluster| cluster.into_iter().cloned().collect())
            .collect()
    }

    /// Count, observed dimensionality, and mean embedding norm.
    pub fn stats(&self) -> StoreStats {
        let documents = self.documents.len();
        let dimension = self.documents.values().next().map(|d| d.embedding.len());
        let avg_norm = if documents == 0 {
            0.0
        } else {
            self.documents
                .values()
                .map(|d| vector_norm(&d.embedding))
                .sum::<f32>()
                / documents as f32
        };
        StoreStats {
            documents,
            dimension,
            avg_norm,
        }
    }

    /// Write the document set to `path` as YAML, sorted by id so repeated
    /// exports of the same store diff cleanly.
    ///
    /// This is the only write the store ever performs, and only when asked.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut documents: Vec<&Document> = self.documents.values().collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));

        let yaml = serde_yaml::to_string(&documents)?;
        fs::write(path, yaml).map_err(|source| RagError::WriteIo {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Saved {} documents to {}", documents.len(), path.display());
        Ok(())
    }

    /// Rebuild a store from a YAML document set written by
    /// [`save`](Self::save), around a freshly injected embedder.
    pub fn load(path: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| RagError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let documents: Vec<Document> = serde_yaml::from_str(&content)?;

        let mut store = Self::new(embedder);
        store.add_batch(documents);
        Ok(store)
    }

    /// Brute-force scoring pass shared by the search entry points. Scoring
    /// fans out over rayon; ordering and truncation happen after.
    fn scan(
        &self,
        embedding: &[f32],
        options: SearchOptions,
        exclude: Option<&str>,
    ) -> Vec<SearchResult> {
        let mut scored: Vec<(&Document, f32)> = self
            .documents
            .par_iter()
            .map(|(_, document)| (document, cosine_similarity(embedding, &document.embedding)))
            .filter(|(document, score)| {
                *score >= options.threshold && exclude != Some(document.id.as_str())
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(options.limit);

        scored
            .into_iter()
            .map(|(document, score)| SearchResult {
                document: document.clone(),
                score,
            })
            .collect()
    }
}
