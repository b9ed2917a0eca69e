//! # PII and prompt-injection scrubbing
//!
//! Regex heuristics over text that is about to be spliced into a prompt.
//! Two concerns live here:
//!
//! - [`scrub_pii`] masks things that look like emails, phone numbers,
//!   SSN-shaped ids, card numbers, and API keys with typed placeholders.
//! - [`detect_injection`] flags retrieved content that reads like a prompt
//!   injection attempt ("ignore previous instructions" and friends).
//!
//! These are heuristics, not guarantees. They run over *retrieved document
//! content* when [`RagConfig::scrub_context`](crate::config::RagConfig) is
//! on, keeping leaked identifiers out of assembled prompts; they are also
//! usable standalone on any text.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

/// Masking pass result: the rewritten text and how many spans were masked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrubOutcome {
    pub text: String,
    pub redactions: usize,
}

// Order matters: longer digit shapes run first so a card number is not half
// consumed by the phone pattern.
static PII_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("valid regex"),
            "[email]",
        ),
        (
            Regex::new(r"\bAKIA[0-9A-Z]{16}\b").expect("valid regex"),
            "[api-key]",
        ),
        (
            Regex::new(r"\b(?:sk|pk)-[A-Za-z0-9]{16,}\b").expect("valid regex"),
            "[api-key]",
        ),
        (
            Regex::new(r"\b\d{4}[ \-]?\d{4}[ \-]?\d{4}[ \-]?\d{4}\b").expect("valid regex"),
            "[card]",
        ),
        (
            Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid regex"),
            "[ssn]",
        ),
        (
            Regex::new(r"(?:\+?\d{1,2}[ .\-]?)?\(?\d{3}\)?[ .\-]?\d{3}[ .\-]?\d{4}\b")
                .expect("valid regex"),
            "[phone]",
        ),
    ]
});

static INJECTION_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)ignore\s+(?:all\s+)?(?:previous|prior|above)\s+(?:instructions|prompts|messages)",
        r"(?i)disregard\s+(?:all\s+|the\s+)?(?:previous|prior|above)",
        r"(?i)forget\s+(?:everything|all)\s+(?:you|above|before)",
        r"(?i)reveal\s+(?:your\s+)?(?:hidden\s+|system\s+)?prompt",
        r"(?i)you\s+are\s+now\s+(?:an?\s+)?unrestricted",
        r"(?i)act\s+as\s+if\s+you\s+have\s+no\s+(?:rules|restrictions|guidelines)",
    ])
    .expect("valid regex")
});

/// Mask PII-shaped spans in `text` with placeholders like `[email]`.
///
/// # Examples
/// ```
/// use lorebook::scrub::scrub_pii;
///
/// let outcome = scrub_pii("Reach me at jane@example.com today.");
/// assert_eq!(outcome.text, "Reach me at [email] today.");
/// assert_eq!(outcome.redactions, 1);
/// ```
pub fn scrub_pii(text: &str) -> ScrubOutcome {
    let mut scrubbed = text.to_string();
    let mut redactions = 0;
    for (pattern, placeholder) in PII_PATTERNS.iter() {
        redactions += pattern.find_iter(&scrubbed).count();
        scrubbed = pattern.replace_all(&scrubbed, *placeholder).into_owned();
    }
    ScrubOutcome {
        text: scrubbed,
        redactions,
    }
}

/// Heuristic check for prompt-injection phrasing in `text`.
pub fn detect_injection(text: &str) -> bool {
    INJECTION_PATTERNS.is_match(text)
}
