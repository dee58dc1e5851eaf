//! Slug engine
//!
//! Turns arbitrary text into a deterministic, URL-safe, lower-case token:
//!
//! 1. Unicode canonical decomposition (NFD), combining marks dropped
//! 2. Lower-cased
//! 3. Every run of characters outside `[a-z0-9]` collapses to one `-`
//! 4. Leading and trailing hyphens trimmed
//! 5. Bounded to `max_length`, preferring a hyphen boundary near the cut
//!
//! Text that produces nothing (e.g. only symbols) yields [`FALLBACK_SLUG`].

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Token returned when the input has no sluggable characters
pub const FALLBACK_SLUG: &str = "section";

/// Trailing window (in characters) searched for a hyphen before hard-truncating
const BREAK_WINDOW: usize = 12;

/// Slugifies `text`, bounded to `max_length` characters.
///
/// A `max_length` of zero disables truncation. The result is never empty.
pub fn slug(text: &str, max_length: usize) -> String {
    let normalized = normalize(text);
    let bounded = truncate(&normalized, max_length);

    if bounded.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        bounded.to_string()
    }
}

/// Normalizes `text` without truncation or fallback; may return an empty string.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.nfd().filter(|c| !is_combining_mark(*c)) {
        for lower in c.to_lowercase() {
            if lower.is_ascii_lowercase() || lower.is_ascii_digit() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(lower);
            } else {
                pending_hyphen = true;
            }
        }
    }

    out
}

/// Returns true if `token` is already in slug form: non-empty and unchanged by [`normalize`]
pub fn is_slug(token: &str) -> bool {
    !token.is_empty() && normalize(token) == token
}

/// Cuts a normalized token down to `max_length`.
///
/// Normalized tokens are pure ASCII, so byte offsets are character offsets.
fn truncate(token: &str, max_length: usize) -> &str {
    if max_length == 0 || token.len() <= max_length {
        return token;
    }

    // The cut lands exactly on a word boundary
    if token.as_bytes()[max_length] == b'-' {
        return token[..max_length].trim_end_matches('-');
    }

    let head = &token[..max_length];
    let window_start = max_length.saturating_sub(BREAK_WINDOW);

    match head.rfind('-') {
        Some(pos) if pos > 0 && pos >= window_start => &head[..pos],
        _ => head.trim_end_matches('-'),
    }
}
