//! # Prompt templates
//!
//! Utilities for defining and loading the **prompt templates** that phrase
//! injected context.
//!
//! A template is a small YAML document that specifies:
//! - a `system_prompt` with `{placeholder}` slots (`{context}` and `{query}`
//!   are the ones the RAG engine fills),
//! - optional `pre_user_message_content` / `post_user_message_content`
//!   strings wrapped around the user's text when an enhanced prompt string
//!   is assembled.
//!
//! Templates are stored per-user under the application's configuration
//! directory, inside a `templates/` subfolder. The loader resolves
//! templates at:
//!
//! ```text
//! <config_dir>/templates/<name>.yaml
//! ```
//!
//! where `<config_dir>` is provided by [`crate::config_dir()`] and is
//! platform-specific (on Linux, `~/.config/lorebook/` via XDG).
//!
//! ## Minimal YAML example
//!
//! ```yaml
//! # ~/.config/lorebook/templates/support_answers.yaml
//! system_prompt: |
//!   Answer using only the documentation excerpts below.
//!
//!   {context}
//! # Optional fields:
//! # pre_user_message_content: "Customer question: "
//! # post_user_message_content: " (answer in two sentences)"
//! ```
//!
//! ## Behavior notes
//! - [`load_template`] *only* reads from the configuration directory; it
//!   does not look in the current working directory.
//! - Rendering is lenient: placeholders with no supplied value are left
//!   verbatim so a typo shows up in the output instead of vanishing.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A reusable prompt template.
///
/// Instances are typically created by deserializing YAML files with
/// [`load_template`], or built in code. The RAG engine renders one of these
/// into the synthesized system message that carries retrieved context.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PromptTemplate {
    /// Instruction text with `{placeholder}` slots.
    pub system_prompt: String,

    /// Extra text added **before** the user's text when an enhanced prompt
    /// string is assembled.
    pub pre_user_message_content: Option<String>,

    /// Extra text added **after** the user's text when an enhanced prompt
    /// string is assembled.
    pub post_user_message_content: Option<String>,
}

impl PromptTemplate {
    /// The built-in template the RAG engine uses when none is supplied.
    pub fn context_default() -> Self {
        Self {
            system_prompt: "Use the following retrieved context when answering. \
                            If the context does not cover the question, say so \
                            rather than inventing details.\n\n{context}"
                .to_string(),
            pre_user_message_content: None,
            post_user_message_content: None,
        }
    }

    /// Render `system_prompt`, substituting each `{name}` slot with its
    /// value from `vars`. Unknown slots stay verbatim.
    ///
    /// # Examples
    /// ```
    /// use lorebook::template::PromptTemplate;
    ///
    /// let tpl = PromptTemplate {
    ///     system_prompt: "Context for {query}:\n{context}".to_string(),
    ///     pre_user_message_content: None,
    ///     post_user_message_content: None,
    /// };
    /// let out = tpl.render(&[("query", "lifetimes"), ("context", "[1] ...")]);
    /// assert_eq!(out, "Context for lifetimes:\n[1] ...");
    /// ```
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = self.system_prompt.clone();
        for (name, value) in vars {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out
    }

    /// Wrap `text` with the pre/post user content, when set.
    pub fn decorate_user_text(&self, text: &str) -> String {
        let pre = self.pre_user_message_content.as_deref().unwrap_or("");
        let post = self.post_user_message_content.as_deref().unwrap_or("");
        format!("{pre}{text}{post}")
    }
}

/// Load a prompt template by name from the user's config directory.
///
/// Resolves `<config_dir>/templates/<name>.yaml`, reads the file, and
/// deserializes into a [`PromptTemplate`].
///
/// ### Errors
/// Returns an error if:
/// - the config directory cannot be determined,
/// - the template file does not exist or cannot be read,
/// - the YAML content cannot be deserialized into a `PromptTemplate`.
pub async fn load_template(name: &str) -> Result<PromptTemplate> {
    let path = crate::config_dir()?.join(format!("templates/{name}.yaml"));

    tracing::info!("Loading template: {}", path.display());

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| RagError::Io { path, source })?;
    let template: PromptTemplate = serde_yaml::from_str(&content)?;
    Ok(template)
}
