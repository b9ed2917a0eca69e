//! This module provides the retrieval and assembly configuration.
//!
//! It defines the `RagConfig` struct consumed by
//! [`RagEngine`](crate::rag::RagEngine), the optional `RelevanceWeights`
//! re-ranking block, the all-`Option` `RagConfigPatch` used for partial
//! updates, and a `load_config` function to read a configuration from a
//! YAML file.
//!
//! # Examples
//!
//! Loading the configuration from a file:
//!
//! ```no_run
//! use lorebook::config::{RagConfig, load_config};
//!
//! # fn main() -> lorebook::error::Result<()> {
//! let config: RagConfig = load_config("/path/to/rag.yaml")?;
//! println!("{:?}", config);
//! # Ok(()) }
//! ```

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::*;

use crate::error::{RagError, Result};

/// Retrieval and context-assembly settings.
///
/// Every field has a default, and YAML files may supply any subset; missing
/// fields fall back to the defaults below.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct RagConfig {
    /// Master switch; when false the enhancement calls pass prompts through
    /// untouched and retrieve nothing.
    pub enabled: bool,

    /// Character budget for injected context text.
    pub max_context_length: usize,

    /// Cap on retrieved documents, regardless of how many clear the
    /// similarity threshold. Zero retrieves nothing.
    pub max_documents: usize,

    /// Minimum cosine similarity for a document to count as relevant.
    /// Held in [-1, 1]; partial updates clamp it there.
    pub similarity_threshold: f32,

    // Chunking applied by the ingestion helper before embedding.
    pub chunk_size: usize,
    pub chunk_overlap: usize,

    /// Secondary ranking over retrieved documents; off by default.
    pub relevance_scoring: RelevanceWeights,

    /// Mask PII-shaped spans in retrieved content before it is spliced
    /// into a prompt.
    pub scrub_context: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_context_length: 4096,
            max_documents: 5,
            similarity_threshold: 0.7,
            chunk_size: 512,
            chunk_overlap: 64,
            relevance_scoring: RelevanceWeights::default(),
            scrub_context: false,
        }
    }
}

impl RagConfig {
    /// Merge a partial update into this config. Only supplied fields
    /// change; the similarity threshold is clamped into [-1, 1].
    pub fn apply(&mut self, patch: RagConfigPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(max_context_length) = patch.max_context_length {
            self.max_context_length = max_context_length;
        }
        if let Some(max_documents) = patch.max_documents {
            self.max_documents = max_documents;
        }
        if let Some(threshold) = patch.similarity_threshold {
            self.similarity_threshold = threshold.clamp(-1.0, 1.0);
        }
        if let Some(chunk_size) = patch.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(chunk_overlap) = patch.chunk_overlap {
            self.chunk_overlap = chunk_overlap;
        }
        if let Some(relevance_scoring) = patch.relevance_scoring {
            self.relevance_scoring = relevance_scoring;
        }
        if let Some(scrub_context) = patch.scrub_context {
            self.scrub_context = scrub_context;
        }
    }
}

/// Weights for the optional secondary ranking pass.
///
/// The final rank of a retrieved document becomes
/// `similarity_weight * normalized_similarity + recency_weight * recency +
/// metadata_weight * metadata_match`, where similarity is mapped from
/// [-1, 1] to [0, 1], recency decays exponentially with `half_life_hours`,
/// and the metadata match is the fraction of query terms found among the
/// document's metadata string values. The weights are on whatever scale the
/// caller likes; they are not forced to sum to 1.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
#[serde(default)]
pub struct RelevanceWeights {
    pub enabled: bool,
    pub similarity_weight: f32,
    pub recency_weight: f32,
    pub metadata_weight: f32,

    // Age at which the recency factor halves.
    pub half_life_hours: f32,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            enabled: false,
            similarity_weight: 0.7,
            recency_weight: 0.2,
            metadata_weight: 0.1,
            half_life_hours: 168.0,
        }
    }
}

/// A partial [`RagConfig`]: every field optional, deserializable from the
/// same YAML shape.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(default)]
pub struct RagConfigPatch {
    pub enabled: Option<bool>,
    pub max_context_length: Option<usize>,
    pub max_documents: Option<usize>,
    pub similarity_threshold: Option<f32>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub relevance_scoring: Option<RelevanceWeights>,
    pub scrub_context: Option<bool>,
}

/// Loads a retrieval configuration from a YAML file.
///
/// This function reads the file at the given path, parses it as YAML, and
/// constructs a `RagConfig` from it. Fields absent from the file keep their
/// defaults.
///
/// # Parameters
///
/// - `path`: The path to the YAML configuration file.
///
/// # Returns
///
/// - `Ok(RagConfig)`: The loaded configuration.
/// - `Err(RagError)`: An error occurred while reading the file or parsing
///   the YAML.
pub fn load_config(path: impl AsRef<Path>) -> Result<RagConfig> {
    let path = path.as_ref();
    debug!("Loading config: {}", path.display());

    let content = fs::read_to_string(path).map_err(|source| RagError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: RagConfig = serde_yaml::from_str(&content)?;
    config.similarity_threshold = config.similarity_threshold.clamp(-1.0, 1.0);
    Ok(config)
}
