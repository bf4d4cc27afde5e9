/// Collapse internal whitespace runs to single spaces and trim the ends.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalization used for identity comparison: whitespace-collapsed,
/// trimmed, case-folded.
pub fn normalize_for_fingerprint(text: &str) -> String {
    clean_text(text).to_lowercase()
}
