//! # Document model
//!
//! Value types shared by the store and the RAG assembler.
//!
//! A [`Document`] is the unit of storage: some text, the embedding vector
//! that stands for it, and an open metadata map. [`SearchResult`] pairs a
//! document with the cosine score a query earned it. [`RagContext`] and
//! [`RagResult`] are the transient values produced per enhancement call and
//! never retained.
//!
//! All of these are plain serde-serializable data. Equality on [`Document`]
//! is field-for-field, which the store's round-trip contract relies on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use uuid::Uuid;

/// A stored document: text, its embedding, and caller-defined metadata.
///
/// The `id` is unique within one store; adding a second document with the
/// same id overwrites the first. Embedding length is decided by whatever
/// model produced it and is expected to be constant across a store; that
/// is the caller's responsibility and is not cross-checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier, caller-assigned or generated.
    pub id: String,

    /// Raw text associated with the document.
    pub content: String,

    /// Fixed-length embedding vector for `content`.
    pub embedding: Vec<f32>,

    /// Open key-value mapping: title, category, source, anything.
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Creation or last-update time, defaulted to now when absent.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Document {
    /// Create a document with a generated UUID v4 id, empty metadata, and
    /// the current time as its timestamp.
    pub fn new(content: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            embedding,
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Builder-style override of the generated id.
    ///
    /// ```
    /// use lorebook::document::Document;
    ///
    /// let doc = Document::new("Rust is great!", vec![1.0, 0.0]).with_id("doc-1");
    /// assert_eq!(doc.id, "doc-1");
    /// ```
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Builder-style metadata replacement.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Builder-style timestamp override, useful when ingesting documents
    /// that carry their own creation time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A document matched by a similarity query, with its cosine score.
///
/// Scores are in [-1, 1] in theory and [0, 1] in practice for normalized
/// embeddings. The matched document's metadata rides along inside
/// [`SearchResult::document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
}

/// What one retrieval produced, before it was spliced into a prompt.
///
/// `documents` is ordered best-first and `relevance_scores` runs parallel to
/// it, holding the scores the final ranking used (cosine similarity, or the
/// blended score when re-ranking is enabled). `context_text` is the
/// concatenated snippet text after the context budget was applied, so it may
/// cover fewer documents than were retrieved; `truncated` records whether
/// anything was dropped or cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagContext {
    /// The query text that drove retrieval.
    pub query: String,

    /// Retrieved documents, highest relevance first.
    pub documents: Vec<Document>,

    /// Concatenated, budget-capped context string.
    pub context_text: String,

    /// Ranking scores, parallel to `documents`.
    pub relevance_scores: Vec<f32>,

    /// cl100k token estimate for `context_text`.
    pub total_tokens: usize,

    /// True when the budget dropped or cut document content.
    pub truncated: bool,
}

impl RagContext {
    /// An empty context for pass-through results (RAG disabled, no query,
    /// or nothing retrieved).
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            documents: Vec::new(),
            context_text: String::new(),
            relevance_scores: Vec::new(),
            total_tokens: 0,
            truncated: false,
        }
    }
}

/// Outcome of one enhancement call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResult {
    /// The prompt as the caller supplied it.
    pub original_prompt: String,

    /// The prompt with retrieved context spliced in; equal to
    /// `original_prompt` when RAG was disabled or nothing was retrieved.
    pub enhanced_prompt: String,

    /// The retrieval behind the enhancement.
    pub context: RagContext,

    pub metadata: RagResultMetadata,
}

/// Bookkeeping attached to every [`RagResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResultMetadata {
    /// How many documents retrieval returned (before the context budget).
    pub documents_retrieved: usize,

    /// Character length of the injected context text.
    pub context_length: usize,

    /// Wall-clock time the enhancement took, embedding call included.
    pub processing_time: Duration,
}
