//! # Lorebook (library root)
//!
//! This crate provides in-memory retrieval-augmented generation plumbing for
//! chat and completion clients:
//! - Embedded document collection with brute-force cosine search
//!   (`vector_store`, `document`).
//! - Retrieval, context budgeting, and prompt splicing (`rag`).
//! - Chat message shapes and query selection (`chat`).
//! - Prompt/template handling for phrasing injected context (`template`).
//! - Text chunking for ingestion (`chunk`) and PII scrubbing (`scrub`).
//! - Runtime configuration with partial updates (`config`).
//!
//! The embedding model itself stays outside the crate: callers implement
//! [`Embedder`](embedding::Embedder) over whatever service or local model
//! they run, and the store calls it through an `Arc<dyn Embedder>`. Search
//! is an exact scan over every stored vector, so results never depend on
//! index tuning; collections up to the tens of thousands of documents stay
//! comfortably interactive.
//!
//! In addition, this module exposes a helper for discovering the
//! per-platform configuration directory ([`config_dir`]), which is where
//! [`load_template`](template::load_template) looks for custom prompt
//! templates and [`load_config`](config::load_config) callers typically
//! keep their YAML.
//!
//! ## Modules
//! - [`chat`], [`chunk`], [`config`], [`document`], [`embedding`],
//!   [`error`], [`rag`], [`scrub`], [`template`], [`vector_store`]

use directories::ProjectDirs;
use std::path::PathBuf;

pub mod chat;
pub mod chunk;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod rag;
pub mod scrub;
pub mod template;
pub mod vector_store;

pub use chat::ChatMessage;
pub use config::RagConfig;
pub use document::{Document, RagContext, RagResult, SearchResult};
pub use embedding::Embedder;
pub use error::{RagError, Result};
pub use rag::RagEngine;
pub use vector_store::{SearchOptions, VectorStore};

/// Return the per-platform configuration directory used by Lorebook.
///
/// This uses [`directories::ProjectDirs`] with the application triple
/// `("dev", "lorebook", "lorebook")`, so you get the right place on each OS
/// (e.g., `~/Library/Application Support/dev.lorebook.lorebook` on macOS).
///
/// The directory is **not** created by this function; callers that need it
/// should create it with `fs::create_dir_all`.
///
/// # Errors
/// Returns [`RagError::NoConfigDir`] if the platform configuration
/// directory cannot be determined (rare, but possible in heavily sandboxed
/// environments).
///
/// # Examples
/// ```rust
/// let cfg = lorebook::config_dir().expect("has a config dir");
/// println!("config at {}", cfg.display());
/// ```
pub fn config_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("dev", "lorebook", "lorebook").ok_or(RagError::NoConfigDir)?;

    Ok(proj_dirs.config_dir().to_path_buf())
}
