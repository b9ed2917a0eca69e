//! # Text chunking
//!
//! Splits long source text into overlapping character windows ahead of
//! embedding and indexing. Window ends prefer a sentence boundary when one
//! falls in the tail of the window, so chunks tend to read as whole
//! sentences rather than cutting words mid-stream.
//!
//! The chunker runs upstream of the store: it produces the strings that
//! [`RagEngine::index_text`](crate::rag::RagEngine::index_text) embeds and
//! adds as documents, using the `chunk_size` / `chunk_overlap` settings from
//! [`RagConfig`](crate::config::RagConfig).

/// Split `text` into chunks of at most `chunk_size` characters, with
/// `chunk_overlap` characters carried over between consecutive chunks.
///
/// Counts are Unicode characters, not bytes. An overlap as large as the
/// chunk size degrades to contiguous windows rather than looping. Empty
/// input or a zero chunk size yields no chunks.
///
/// # Examples
/// ```
/// use lorebook::chunk::chunk_text;
///
/// let chunks = chunk_text("short text", 100, 10);
/// assert_eq!(chunks, vec!["short text".to_string()]);
/// ```
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || chunk_size == 0 {
        return Vec::new();
    }
    if chars.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end < chars.len() {
            sentence_boundary(&chars, start, hard_end).unwrap_or(hard_end)
        } else {
            hard_end
        };
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        // Overlap is carried from the actual end; if that would not move the
        // window forward, fall back to contiguous windows.
        let next = end.saturating_sub(chunk_overlap);
        start = if next > start { next } else { end };
    }
    chunks
}

/// Look for a sentence end in the last fifth of the window. Returns the
/// index one past the boundary character, so the boundary stays with the
/// chunk it closes.
fn sentence_boundary(chars: &[char], start: usize, end: usize) -> Option<usize> {
    let window = end - start;
    let tail_start = end - (window / 5).max(1);
    (tail_start..end)
        .rev()
        .find(|&i| matches!(chars[i], '.' | '!' | '?' | '\n'))
        .map(|i| i + 1)
}
