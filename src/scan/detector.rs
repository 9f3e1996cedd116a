//! Candidate URL classification.

const PREFIXES: [&str; 2] = ["http:", "https:"];

/// Returns true when the token begins with `http:` or `https:`, compared
/// case-insensitively so `HTTP://` and `Https://` links are not lost.
///
/// No further validation happens: a token passing this check is a
/// candidate, not a verified URL.
pub fn is_candidate_url(token: &str) -> bool {
    PREFIXES
        .iter()
        .any(|prefix| starts_with_ignore_ascii_case(token, prefix))
}

fn starts_with_ignore_ascii_case(token: &str, prefix: &str) -> bool {
    token.len() >= prefix.len()
        && token.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}
