/// Number of leading characters kept when a digest is shown in a log line.
pub const DIGEST_DISPLAY_LEN: usize = 8;

/// Abbreviate a transaction digest for display.
pub fn short_digest(digest: &str) -> &str {
    match digest.char_indices().nth(DIGEST_DISPLAY_LEN) {
        Some((end, _)) => &digest[..end],
        None => digest,
    }
}
