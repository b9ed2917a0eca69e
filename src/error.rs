//! Crate-wide error type and `Result` alias.
//!
//! The store itself never fails: missing ids are `Option`/`bool` returns and
//! in-memory mutation cannot error. What can fail is the injected embedder
//! and the YAML file helpers (config, templates, document export), and those
//! are the only variants here.

use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::BoxError;

/// Errors surfaced by the retrieval and file-loading paths.
#[derive(Debug, Error)]
pub enum RagError {
    /// The injected [`Embedder`](crate::embedding::Embedder) rejected a
    /// request. The embedder's own error is preserved untouched as the
    /// source; nothing is retried and no fallback embedding is attempted.
    #[error("embedding generation failed")]
    Embedding(#[source] BoxError),

    /// A configuration, template, or document file could not be read.
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration, template, or document file could not be written.
    #[error("failed to write {}", path.display())]
    WriteIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML content did not parse or serialize.
    #[error("malformed YAML")]
    Yaml(#[from] serde_yaml::Error),

    /// No per-user configuration directory could be determined on this
    /// platform.
    #[error("unable to determine a configuration directory")]
    NoConfigDir,
}

pub type Result<T> = std::result::Result<T, RagError>;
