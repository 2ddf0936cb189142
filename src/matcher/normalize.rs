//! Text canonicalization shared by ingestion and querying.
//!
//! Stored word/segment text and search sentences must pass through the same
//! function, otherwise exact phrase lookups stop lining up.

use crate::error::MatchError;

/// ASCII punctuation removed from every token.
pub const PUNCTUATION: &str = r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##;

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
}

/// Normalize text into tokens, returning an empty list when nothing is left.
pub fn normalize_lenient(text: &str) -> Vec<String> {
    let cleaned: String = text
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !is_punctuation(*c))
        .collect();

    cleaned
        .split_whitespace()
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize text into comparable tokens.
///
/// Fails with [`MatchError::EmptyInput`] for blank or punctuation-only text.
pub fn normalize(text: &str) -> Result<Vec<String>, MatchError> {
    let tokens = normalize_lenient(text);
    if tokens.is_empty() {
        return Err(MatchError::EmptyInput);
    }
    Ok(tokens)
}

/// Normalized tokens joined by single spaces (the stored segment form).
pub fn normalize_to_string(text: &str) -> String {
    normalize_lenient(text).join(" ")
}
