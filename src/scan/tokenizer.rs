//! Whitespace tokenization of chat lines.

/// Split a chat line into whitespace-delimited tokens, preserving case.
///
/// Empty input yields an empty iterator and there is no token length
/// limit; IRC caps line length long before one would matter.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
}
