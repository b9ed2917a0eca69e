//! # RagEngine
//!
//! Turns a raw chat or completion request plus the current document
//! collection into an augmented request whose prompt carries retrieved
//! context, subject to configured budgets.
//!
//! The flow for one enhancement: take the latest user message as the query,
//! embed it through the store's injected embedder, retrieve the documents
//! that clear the similarity threshold (capped at `max_documents`),
//! optionally re-rank them with recency and metadata weighting, concatenate
//! their content under the `max_context_length` character budget, and
//! splice the result into the request: a synthesized system message ahead
//! of the user's message for chat, or text prepended with a separator for
//! a bare completion prompt.
//!
//! Every call is stateless given the current config and store snapshot.
//! The engine owns no retries and no timeouts; a slow embedder simply makes
//! enhancement slow, and an embedder failure surfaces unchanged.
//!
//! ## Quick Example
//! ```
//! use lorebook::chat::ChatMessage;
//! use lorebook::config::RagConfig;
//! use lorebook::document::Document;
//! use lorebook::embedding::{BoxError, Embedder};
//! use lorebook::rag::RagEngine;
//! use lorebook::vector_store::VectorStore;
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
//! store.add(Document::new("Lifetimes tie borrows to scopes.", vec![1.0, 0.0]));
//!
//! let engine = RagEngine::new(store, RagConfig::default());
//! let enhanced = engine
//!     .enhance_chat(&[ChatMessage::user("What is a lifetime?")])
//!     .await?;
//!
//! assert_eq!(enhanced.result.metadata.documents_retrieved, 1);
//! # Ok(()) }
//! ```

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::{Duration, Instant};
use tiktoken_rs::{CoreBPE, cl100k_base};
use tracing::{debug, info};

use crate::chat::{ChatMessage, latest_user_message};
use crate::chunk::chunk_text;
use crate::config::{RagConfig, RagConfigPatch};
use crate::document::{Document, RagContext, RagResult, RagResultMetadata, SearchResult};
use crate::error::Result;
use crate::scrub::scrub_pii;
use crate::template::PromptTemplate;
use crate::vector_store::{SearchOptions, StoreStats, VectorStore};

static BPE: Lazy<CoreBPE> = Lazy::new(|| cl100k_base().expect("embedded cl100k vocabulary"));

/// cl100k token estimate for a context string.
fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    BPE.encode_with_special_tokens(text).len()
}

/// A chat request after enhancement: the augmented message list plus the
/// [`RagResult`] describing what was retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedChat {
    pub messages: Vec<ChatMessage>,
    pub result: RagResult,
}

/// Store stats plus the engine's own counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagStats {
    pub store: StoreStats,
    /// Enhancement calls handled, pass-throughs included.
    pub enhancements: u64,
    /// Documents retrieved across all enhancements.
    pub documents_retrieved: u64,
    pub avg_processing_ms: f64,
    pub last_processing_ms: f64,
}

#[derive(Default)]
struct RagCounters {
    enhancements: AtomicU64,
    documents_retrieved: AtomicU64,
    total_processing_micros: AtomicU64,
    last_processing_micros: AtomicU64,
}

/// Retrieval-augmented prompt assembler over a [`VectorStore`].
///
/// Owns the store, a [`RagConfig`], and the [`PromptTemplate`] that phrases
/// injected context. Counters are atomic so the read-only enhancement calls
/// stay `&self`.
pub struct RagEngine {
    store: VectorStore,
    config: RagConfig,
    template: PromptTemplate,
    counters: RagCounters,
}

impl RagEngine {
    /// Create an engine around an existing store, phrasing context through
    /// the built-in template.
    pub fn new(store: VectorStore, config: RagConfig) -> Self {
        Self {
            store,
            config,
            template: PromptTemplate::context_default(),
            counters: RagCounters::default(),
        }
    }

    /// Builder-style template override.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Merge a partial config update; subsequent calls use the merged
    /// settings. See [`RagConfig::apply`] for the clamping rules.
    pub fn update_config(&mut self, patch: RagConfigPatch) {
        self.config.apply(patch);
        debug!("Config updated: {:?}", self.config);
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut VectorStore {
        &mut self.store
    }

    /// Store delegate, here for convenience.
    pub fn add_documents(&mut self, documents: Vec<Document>) {
        self.store.add_batch(documents);
    }

    /// Chunk `content`, embed each chunk sequentially, and add the chunks
    /// as documents carrying `metadata` plus a `chunk_index` key. Returns
    /// the generated document ids in chunk order.
    ///
    /// Not atomic: if the embedder fails on chunk N, chunks 0..N stay
    /// stored. Callers wanting all-or-nothing ingestion should index into a
    /// scratch store and swap.
    ///
    /// # Errors
    /// The embedder's failure, at whichever chunk it happened.
    pub async fn index_text(
        &mut self,
        content: &str,
        metadata: Map<String, Value>,
    ) -> Result<Vec<String>> {
        let chunks = chunk_text(content, self.config.chunk_size, self.config.chunk_overlap);
        let mut ids = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.into_iter().enumerate() {
            let embedding = self.store.embed(&chunk).await?;
            let mut document = Document::new(chunk, embedding).with_metadata(metadata.clone());
            document.metadata.insert("chunk_index".to_string(), json!(i));
            ids.push(document.id.clone());
            self.store.add(document);
        }
        debug!("Indexed {} chunks", ids.len());
        Ok(ids)
    }

    /// Enhance a chat request.
    ///
    /// The latest user message is the query. When RAG is disabled, or no
    /// user message exists, or nothing clears the similarity threshold, the
    /// messages come back unchanged and the result records zero retrieved
    /// documents with `enhanced_prompt == original_prompt`. Otherwise the
    /// rendered context is injected as a system message immediately ahead
    /// of the user's message.
    ///
    /// `context.relevance_scores` holds cosine similarities, or blended
    /// scores when `relevance_scoring` is enabled.
    ///
    /// # Errors
    /// Propagates the embedder's failure; no partial enhancement is
    /// attempted.
    pub async fn enhance_chat(&self, messages: &[ChatMessage]) -> Result<EnhancedChat> {
        let start = Instant::now();
        let query = latest_user_message(messages);

        let (query_index, original) = match query {
            Some((index, content)) if self.config.enabled => (index, content.to_string()),
            _ => {
                debug!("RAG disabled or no user message; passing chat through");
                let original = query.map(|(_, content)| content.to_string()).unwrap_or_default();
                let result = self.pass_through(original, start.elapsed());
                self.record(&result);
                return Ok(EnhancedChat {
                    messages: messages.to_vec(),
                    result,
                });
            }
        };

        let context = self.retrieve(&original).await?;

        let mut augmented = messages.to_vec();
        if !context.context_text.is_empty() {
            let system = self.template.render(&[
                ("context", context.context_text.as_str()),
                ("query", original.as_str()),
            ]);
            augmented.insert(query_index, ChatMessage::system(system));
        }

        let enhanced_prompt = self.splice(&original, &context.context_text);
        let result = RagResult {
            original_prompt: original,
            enhanced_prompt,
            metadata: RagResultMetadata {
                documents_retrieved: context.documents.len(),
                context_length: context.context_text.chars().count(),
                processing_time: start.elapsed(),
            },
            context,
        };
        self.record(&result);
        info!(
            "Enhanced chat request with {} documents, {} context chars, truncated: {}",
            result.metadata.documents_retrieved,
            result.metadata.context_length,
            result.context.truncated
        );

        Ok(EnhancedChat {
            messages: augmented,
            result,
        })
    }

    /// Enhance a bare completion prompt: same retrieval and budgeting as
    /// [`enhance_chat`](Self::enhance_chat), with the context prepended to
    /// the prompt behind a separator instead of a message-list edit.
    ///
    /// # Errors
    /// Propagates the embedder's failure.
    pub async fn enhance_completion(&self, prompt: &str) -> Result<RagResult> {
        let start = Instant::now();

        if !self.config.enabled {
            debug!("RAG disabled; passing completion through");
            let result = self.pass_through(prompt.to_string(), start.elapsed());
            self.record(&result);
            return Ok(result);
        }

        let context = self.retrieve(prompt).await?;
        let enhanced_prompt = self.splice(prompt, &context.context_text);
        let result = RagResult {
            original_prompt: prompt.to_string(),
            enhanced_prompt,
            metadata: RagResultMetadata {
                documents_retrieved: context.documents.len(),
                context_length: context.context_text.chars().count(),
                processing_time: start.elapsed(),
            },
            context,
        };
        self.record(&result);
        info!(
            "Enhanced completion with {} documents, {} context chars",
            result.metadata.documents_retrieved, result.metadata.context_length
        );
        Ok(result)
    }

    /// Store stats plus enhancement counters.
    pub fn stats(&self) -> RagStats {
        let enhancements = self.counters.enhancements.load(Relaxed);
        let total_micros = self.counters.total_processing_micros.load(Relaxed);
        RagStats {
            store: self.store.stats(),
            enhancements,
            documents_retrieved: self.counters.documents_retrieved.load(Relaxed),
            avg_processing_ms: if enhancements == 0 {
                0.0
            } else {
                total_micros as f64 / enhancements as f64 / 1000.0
            },
            last_processing_ms: self.counters.last_processing_micros.load(Relaxed) as f64 / 1000.0,
        }
    }

    /// Search, optionally re-rank, and assemble budgeted context text.
    async fn retrieve(&self, query: &str) -> Result<RagContext> {
        let options = SearchOptions {
            threshold: self.config.similarity_threshold,
            limit: self.config.max_documents,
        };
        let mut results = self.store.search_by_text(query, options).await?;
        self.rerank(&mut results, query);

        let (context_text, truncated) = self.assemble(&results);
        let total_tokens = estimate_tokens(&context_text);

        Ok(RagContext {
            query: query.to_string(),
            relevance_scores: results.iter().map(|r| r.score).collect(),
            documents: results.into_iter().map(|r| r.document).collect(),
            context_text,
            total_tokens,
            truncated,
        })
    }

    /// Secondary ranking pass: blend normalized similarity with recency
    /// decay and a metadata term-match score, then re-sort. No-op unless
    /// enabled in the config.
    fn rerank(&self, results: &mut [SearchResult], query: &str) {
        let weights = self.config.relevance_scoring;
        if !weights.enabled {
            return;
        }

        let now = Utc::now();
        let query_terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        for result in results.iter_mut() {
            let similarity = (result.score + 1.0) / 2.0;
            let recency = recency_factor(now, result.document.timestamp, weights.half_life_hours);
            let metadata = metadata_match(&result.document.metadata, &query_terms);
            result.score = weights.similarity_weight * similarity
                + weights.recency_weight * recency
                + weights.metadata_weight * metadata;
        }
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    }

    /// Concatenate numbered snippets under the character budget.
    ///
    /// Whole snippets are appended while they fit; assembly stops at the
    /// first one that does not, which keeps the cut on a document boundary.
    /// If the very first snippet already overflows the budget it is cut
    /// mid-document instead, so a lone oversized document still contributes
    /// something. Either way the cut is recorded as truncation.
    fn assemble(&self, results: &[SearchResult]) -> (String, bool) {
        let budget = self.config.max_context_length;
        let mut pieces: Vec<String> = Vec::new();
        let mut used = 0usize;
        let mut truncated = false;

        for (i, result) in results.iter().enumerate() {
            let content = if self.config.scrub_context {
                scrub_pii(&result.document.content).text
            } else {
                result.document.content.clone()
            };
            let snippet = format!("[{}] {}", i + 1, content);
            let snippet_len = snippet.chars().count();
            let separator_len = if pieces.is_empty() { 0 } else { 2 };

            if used + separator_len + snippet_len <= budget {
                used += separator_len + snippet_len;
                pieces.push(snippet);
            } else {
                truncated = true;
                if pieces.is_empty() {
                    let cut: String = snippet.chars().take(budget).collect();
                    if !cut.is_empty() {
                        pieces.push(cut);
                    }
                }
                break;
            }
        }

        (pieces.join("\n\n"), truncated)
    }

    /// Prepend context to the user's text with a separator, honoring the
    /// template's pre/post decoration. No context means no change.
    fn splice(&self, original: &str, context_text: &str) -> String {
        if context_text.is_empty() {
            return original.to_string();
        }
        let decorated = self.template.decorate_user_text(original);
        format!("{context_text}\n\n---\n\n{decorated}")
    }

    fn pass_through(&self, original: String, elapsed: Duration) -> RagResult {
        RagResult {
            enhanced_prompt: original.clone(),
            context: RagContext::empty(original.clone()),
            metadata: RagResultMetadata {
                documents_retrieved: 0,
                context_length: 0,
                processing_time: elapsed,
            },
            original_prompt: original,
        }
    }

    fn record(&self, result: &RagResult) {
        self.counters.enhancements.fetch_add(1, Relaxed);
        self.counters
            .documents_retrieved
            .fetch_add(result.metadata.documents_retrieved as u64, Relaxed);
        let micros = result.metadata.processing_time.as_micros() as u64;
        self.counters.total_processing_micros.fetch_add(micros, Relaxed);
        self.counters.last_processing_micros.store(micros, Relaxed);
    }
}

/// Exponential decay on document age: 1.0 at zero age, halving every
/// `half_life_hours`. A non-positive or non-finite half-life contributes
/// nothing rather than poisoning scores.
fn recency_factor(now: DateTime<Utc>, timestamp: DateTime<Utc>, half_life_hours: f32) -> f32 {
    if half_life_hours <= 0.0 || !half_life_hours.is_finite() {
        return 0.0;
    }
    let age_hours = now.signed_duration_since(timestamp).num_seconds().max(0) as f32 / 3600.0;
    (-(age_hours / half_life_hours)).exp2()
}

/// Fraction of query terms present among the document's metadata string
/// values, lowercased.
fn metadata_match(metadata: &Map<String, Value>, query_terms: &[String]) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let haystack = metadata
        .values()
        .filter_map(Value::as_str)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if haystack.is_empty() {
        return 0.0;
    }
    let hits = query_terms
        .iter()
        .filter(|term| haystack.contains(term.as_str()))
        .count();
    hits as f32 / query_terms.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;
    use crate::config::RelevanceWeights;
    use crate::embedding::{BoxError, Embedder};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    /// Embedder that returns the same vector for every text.
    struct ConstEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for ConstEmbedder {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, BoxError> {
            Ok(self.0.clone())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, BoxError> {
            Err("embedding service unavailable".into())
        }
    }

    /// Embedder with a limited number of successful calls.
    struct CountdownEmbedder {
        remaining: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountdownEmbedder {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, BoxError> {
            let left = self.remaining.load(Relaxed);
            if left == 0 {
                return Err("embedding quota exhausted".into());
            }
            self.remaining.store(left - 1, Relaxed);
            Ok(vec![1.0, 0.0])
        }
    }

    fn engine_with_docs(config: RagConfig, docs: Vec<Document>) -> RagEngine {
        let mut store = VectorStore::new(Arc::new(ConstEmbedder(vec![1.0, 0.0])));
        store.add_batch(docs);
        RagEngine::new(store, config)
    }

    fn matching_doc(id: &str, content: &str) -> Document {
        Document::new(content, vec![1.0, 0.0]).with_id(id)
    }

    #[tokio::test]
    async fn test_enhance_chat_disabled_is_pass_through() {
        let config = RagConfig {
            enabled: false,
            ..Default::default()
        };
        let engine = engine_with_docs(config, vec![matching_doc("d1", "relevant content")]);
        let messages = vec![
            ChatMessage::system("Be terse."),
            ChatMessage::user("What is ownership?"),
        ];

        let enhanced = engine.enhance_chat(&messages).await.unwrap();

        assert_eq!(enhanced.messages, messages);
        assert_eq!(enhanced.result.enhanced_prompt, enhanced.result.original_prompt);
        assert_eq!(enhanced.result.original_prompt, "What is ownership?");
        assert_eq!(enhanced.result.metadata.documents_retrieved, 0);
        assert!(enhanced.result.context.context_text.is_empty());
        assert!(!enhanced.result.context.truncated);
    }

    #[tokio::test]
    async fn test_enhance_completion_disabled_matches_original() {
        let config = RagConfig {
            enabled: false,
            ..Default::default()
        };
        let engine = engine_with_docs(config, vec![matching_doc("d1", "relevant content")]);

        let result = engine.enhance_completion("Explain X").await.unwrap();

        assert_eq!(result.original_prompt, "Explain X");
        assert_eq!(result.enhanced_prompt, "Explain X");
        assert_eq!(result.metadata.documents_retrieved, 0);
    }

    #[tokio::test]
    async fn test_enhance_chat_injects_system_message_before_user() {
        let engine = engine_with_docs(
            RagConfig::default(),
            vec![matching_doc("d1", "Ownership moves values between bindings.")],
        );
        let messages = vec![
            ChatMessage::system("Be terse."),
            ChatMessage::user("What is ownership?"),
        ];

        let enhanced = engine.enhance_chat(&messages).await.unwrap();

        assert_eq!(enhanced.messages.len(), 3);
        assert_eq!(enhanced.messages[0], messages[0]);
        assert_eq!(enhanced.messages[1].role, Role::System);
        assert!(
            enhanced.messages[1]
                .content
                .contains("Ownership moves values between bindings.")
        );
        assert_eq!(enhanced.messages[2], messages[1]);

        assert_eq!(enhanced.result.metadata.documents_retrieved, 1);
        assert!(enhanced.result.enhanced_prompt.contains("[1] Ownership moves"));
        assert!(enhanced.result.enhanced_prompt.ends_with("What is ownership?"));
        assert_eq!(enhanced.result.context.documents[0].id, "d1");
        assert_eq!(enhanced.result.context.relevance_scores.len(), 1);
        assert!(enhanced.result.context.total_tokens > 0);
    }

    #[tokio::test]
    async fn test_enhance_chat_without_user_message_passes_through() {
        let engine = engine_with_docs(
            RagConfig::default(),
            vec![matching_doc("d1", "relevant content")],
        );
        let messages = vec![ChatMessage::system("Only a system prompt.")];

        let enhanced = engine.enhance_chat(&messages).await.unwrap();

        assert_eq!(enhanced.messages, messages);
        assert_eq!(enhanced.result.metadata.documents_retrieved, 0);
        assert!(enhanced.result.original_prompt.is_empty());
    }

    #[tokio::test]
    async fn test_enhance_chat_nothing_retrieved_leaves_messages_unmodified() {
        // The only stored document is orthogonal to every query embedding.
        let engine = engine_with_docs(
            RagConfig::default(),
            vec![Document::new("chess openings", vec![0.0, 1.0]).with_id("far")],
        );
        let messages = vec![ChatMessage::user("What is ownership?")];

        let enhanced = engine.enhance_chat(&messages).await.unwrap();

        assert_eq!(enhanced.messages, messages);
        assert_eq!(enhanced.result.metadata.documents_retrieved, 0);
        assert_eq!(enhanced.result.enhanced_prompt, "What is ownership?");
        assert!(!enhanced.result.context.truncated);
    }

    #[tokio::test]
    async fn test_context_budget_cuts_lone_oversized_document() {
        // Two matching documents of 100 characters each against a 50-char
        // budget: the first is cut mid-document, the second dropped.
        let config = RagConfig {
            max_context_length: 50,
            ..Default::default()
        };
        let engine = engine_with_docs(
            config,
            vec![
                matching_doc("d1", &"a".repeat(100)),
                matching_doc("d2", &"b".repeat(100)),
            ],
        );

        let result = engine.enhance_completion("query").await.unwrap();

        assert!(result.context.context_text.chars().count() <= 50);
        assert!(result.context.truncated);
        assert_eq!(result.metadata.documents_retrieved, 2);
        assert_eq!(result.metadata.context_length, 50);
    }

    #[tokio::test]
    async fn test_context_budget_drops_at_document_boundary() {
        // The first snippet fits whole; the second would overflow and is
        // dropped entirely.
        let config = RagConfig {
            max_context_length: 40,
            ..Default::default()
        };
        let engine = engine_with_docs(
            config,
            vec![
                matching_doc("d1", &"a".repeat(20)),
                matching_doc("d2", &"b".repeat(100)),
            ],
        );

        let result = engine.enhance_completion("query").await.unwrap();

        assert!(result.context.context_text.starts_with("[1] "));
        assert!(!result.context.context_text.contains("[2]"));
        assert!(result.context.truncated);
        assert_eq!(result.metadata.documents_retrieved, 2);
    }

    #[tokio::test]
    async fn test_enhance_completion_splices_with_separator() {
        let engine = engine_with_docs(
            RagConfig::default(),
            vec![matching_doc("d1", "Borrowing lends access without moving.")],
        );

        let result = engine.enhance_completion("Explain borrowing").await.unwrap();

        assert!(result.enhanced_prompt.starts_with("[1] Borrowing lends"));
        assert!(result.enhanced_prompt.contains("\n\n---\n\n"));
        assert!(result.enhanced_prompt.ends_with("Explain borrowing"));
        assert_eq!(result.original_prompt, "Explain borrowing");
    }

    #[tokio::test]
    async fn test_embedder_failure_propagates() {
        let store = VectorStore::new(Arc::new(FailingEmbedder));
        let engine = RagEngine::new(store, RagConfig::default());

        let err = engine.enhance_completion("query").await.unwrap_err();
        assert!(matches!(err, crate::error::RagError::Embedding(_)));

        let err = engine
            .enhance_chat(&[ChatMessage::user("query")])
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::RagError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_rerank_recency_boost_reorders_equal_similarity() {
        let config = RagConfig {
            relevance_scoring: RelevanceWeights {
                enabled: true,
                similarity_weight: 0.5,
                recency_weight: 0.5,
                metadata_weight: 0.0,
                half_life_hours: 24.0,
            },
            ..Default::default()
        };

        let stale = Document::new("stale notes", vec![1.0, 0.0])
            .with_id("stale")
            .with_timestamp(Utc::now() - chrono::Duration::days(30));
        let fresh = Document::new("fresh notes", vec![0.999, 0.0447]).with_id("fresh");

        let engine = engine_with_docs(config, vec![stale, fresh]);
        let result = engine.enhance_completion("notes").await.unwrap();

        // Cosine alone ranks the stale document first; the recency term
        // flips the order.
        assert_eq!(result.context.documents[0].id, "fresh");
        assert_eq!(result.context.documents[1].id, "stale");
        assert!(result.context.relevance_scores[0] > result.context.relevance_scores[1]);
    }

    #[tokio::test]
    async fn test_rerank_metadata_match_boosts() {
        let config = RagConfig {
            relevance_scoring: RelevanceWeights {
                enabled: true,
                similarity_weight: 0.0,
                recency_weight: 0.0,
                metadata_weight: 1.0,
                half_life_hours: 24.0,
            },
            ..Default::default()
        };

        let mut tagged_meta = Map::new();
        tagged_meta.insert("category".to_string(), json!("rust language"));
        let tagged = Document::new("tagged", vec![1.0, 0.0])
            .with_id("tagged")
            .with_metadata(tagged_meta);
        let untagged = matching_doc("untagged", "untagged");

        let engine = engine_with_docs(config, vec![untagged, tagged]);
        let result = engine.enhance_completion("rust lifetimes").await.unwrap();

        assert_eq!(result.context.documents[0].id, "tagged");
        // One of two query terms matched the metadata.
        assert!((result.context.relevance_scores[0] - 0.5).abs() < 1e-6);
        assert_eq!(result.context.relevance_scores[1], 0.0);
    }

    #[tokio::test]
    async fn test_index_text_chunks_and_adds_documents() {
        let store = VectorStore::new(Arc::new(ConstEmbedder(vec![1.0, 0.0])));
        let config = RagConfig {
            chunk_size: 40,
            chunk_overlap: 0,
            ..Default::default()
        };
        let mut engine = RagEngine::new(store, config);

        let mut metadata = Map::new();
        metadata.insert("source".to_string(), json!("notes.md"));
        let content = "z".repeat(100);

        let ids = engine.index_text(&content, metadata).await.unwrap();

        assert_eq!(ids.len(), 3);
        assert_eq!(engine.store().len(), 3);
        for (i, id) in ids.iter().enumerate() {
            let document = engine.store().get(id).unwrap();
            assert_eq!(document.metadata["source"], json!("notes.md"));
            assert_eq!(document.metadata["chunk_index"], json!(i));
        }
    }

    #[tokio::test]
    async fn test_index_text_partial_failure_keeps_prior_chunks() {
        let store = VectorStore::new(Arc::new(CountdownEmbedder {
            remaining: AtomicUsize::new(1),
        }));
        let config = RagConfig {
            chunk_size: 40,
            chunk_overlap: 0,
            ..Default::default()
        };
        let mut engine = RagEngine::new(store, config);

        let err = engine
            .index_text(&"z".repeat(100), Map::new())
            .await
            .unwrap_err();

        assert!(matches!(err, crate::error::RagError::Embedding(_)));
        // The chunk embedded before the failure stays stored.
        assert_eq!(engine.store().len(), 1);
    }

    #[tokio::test]
    async fn test_update_config_changes_subsequent_retrieval() {
        let mut engine = engine_with_docs(
            RagConfig::default(),
            vec![
                matching_doc("d1", "first"),
                matching_doc("d2", "second"),
                matching_doc("d3", "third"),
            ],
        );

        engine.update_config(RagConfigPatch {
            max_documents: Some(1),
            similarity_threshold: Some(9.0),
            ..Default::default()
        });

        assert_eq!(engine.config().max_documents, 1);
        assert_eq!(engine.config().similarity_threshold, 1.0);

        let result = engine.enhance_completion("query").await.unwrap();
        assert_eq!(result.metadata.documents_retrieved, 1);
    }

    #[tokio::test]
    async fn test_zero_max_documents_retrieves_nothing() {
        let config = RagConfig {
            max_documents: 0,
            ..Default::default()
        };
        let engine = engine_with_docs(config, vec![matching_doc("d1", "content")]);

        let result = engine.enhance_completion("query").await.unwrap();

        assert_eq!(result.metadata.documents_retrieved, 0);
        assert_eq!(result.enhanced_prompt, "query");
    }

    #[tokio::test]
    async fn test_scrub_context_masks_pii() {
        let config = RagConfig {
            scrub_context: true,
            ..Default::default()
        };
        let engine = engine_with_docs(
            config,
            vec![matching_doc("d1", "Contact jane@example.com for access.")],
        );

        let result = engine.enhance_completion("access").await.unwrap();

        assert!(result.context.context_text.contains("[email]"));
        assert!(!result.context.context_text.contains("jane@example.com"));
    }

    #[tokio::test]
    async fn test_stats_counts_enhancements_and_documents() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let engine = engine_with_docs(
            RagConfig::default(),
            vec![matching_doc("d1", "first"), matching_doc("d2", "second")],
        );

        engine.enhance_completion("one").await.unwrap();
        engine.enhance_completion("two").await.unwrap();

        let stats = engine.stats();
        assert_eq!(stats.enhancements, 2);
        assert_eq!(stats.documents_retrieved, 4);
        assert_eq!(stats.store.documents, 2);
        assert!(stats.avg_processing_ms >= 0.0);
        assert!(stats.last_processing_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_custom_template_phrases_injection() {
        let template = PromptTemplate {
            system_prompt: "Docs for {query}:\n{context}".to_string(),
            pre_user_message_content: None,
            post_user_message_content: None,
        };
        let engine = engine_with_docs(
            RagConfig::default(),
            vec![matching_doc("d1", "Slices borrow part of a collection.")],
        )
        .with_template(template);

        let enhanced = engine
            .enhance_chat(&[ChatMessage::user("slices")])
            .await
            .unwrap();

        assert!(enhanced.messages[0].content.starts_with("Docs for slices:"));
        assert!(enhanced.messages[0].content.contains("[1] Slices borrow"));
    }
}
