//! Edit distance for "did you mean" suggestions

/// Levenshtein edit distance (insert, delete and substitute all cost 1).
///
/// Compares Unicode scalar values, not bytes.
pub fn levenshtein(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Normalized similarity in `[0, 1]`: `(max_len - distance) / max_len`.
///
/// Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}
