/// Anchored full-string glob match: `*` matches any run of characters (including none),
/// `?` matches exactly one character (GLOSSARY, §4.2).
///
/// Hand-rolled rather than pulled from a filesystem-globbing crate: the semantics here are
/// narrow (two tokens, full-string anchored, no path-segment awareness) and precisely
/// specified, so a small recursive matcher is both simpler and more obviously correct than
/// adapting a general-purpose glob library.
#[must_use]
pub fn matches(pattern: &str, candidate: &str) -> bool {
    matches_bytes(pattern.as_bytes(), candidate.as_bytes())
}

fn matches_bytes(pattern: &[u8], candidate: &[u8]) -> bool {
    match pattern.first() {
        None => candidate.is_empty(),
        Some(b'*') => {
            matches_bytes(&pattern[1..], candidate)
                || (!candidate.is_empty() && matches_bytes(pattern, &candidate[1..]))
        }
        Some(b'?') => !candidate.is_empty() && matches_bytes(&pattern[1..], &candidate[1..]),
        Some(&c) => candidate.first() == Some(&c) && matches_bytes(&pattern[1..], &candidate[1..]),
    }
}
