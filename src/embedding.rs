//! # Embedding boundary
//!
//! The crate never talks to an embedding model itself. Callers inject
//! something that does (an HTTP client for a hosted embedding API, or a
//! local model) behind the [`Embedder`] trait, and the store awaits it
//! sequentially whenever text needs to become a vector.
//!
//! Because the implementation is opaque, its failures are too: an error
//! from [`Embedder::embed`] is carried through
//! [`search_by_text`](crate::vector_store::VectorStore::search_by_text) and
//! the enhancement calls without retry, fallback, or alteration. Retry and
//! timeout policy belong to the implementation, not to this crate.
//!
//! ## Implementing
//!
//! ```
//! use lorebook::embedding::{BoxError, Embedder};
//!
//! struct UnitEmbedder;
//!
//! #[async_trait::async_trait]
//! impl Embedder for UnitEmbedder {
//!     async fn embed(&self, text: &str) -> Result<Vec<f32>, BoxError> {
//!         // Toy embedding: length and vowel count, for illustration only.
//!         let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count();
//!         Ok(vec![text.len() as f32, vowels as f32])
//!     }
//! }
//! ```

use async_trait::async_trait;

/// Boxed error type produced by [`Embedder`] implementations.
///
/// Implementations are free to return whatever error type they like as long
/// as it boxes; the crate wraps it as an error source without inspecting it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Converts text into a fixed-length embedding vector.
///
/// A single store instance expects every call to return vectors of the same
/// dimensionality. That is not cross-checked here; mixing models mid-stream
/// is a caller bug, and mismatched vectors simply score 0 against each other.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text` into a dense vector.
    ///
    /// # Errors
    /// Whatever the underlying model or transport reports; the caller of the
    /// store sees it unchanged as the source of
    /// [`RagError::Embedding`](crate::error::RagError::Embedding).
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BoxError>;
}
