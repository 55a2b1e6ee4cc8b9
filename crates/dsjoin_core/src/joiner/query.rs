//! Search pattern validation for joiner queries.

use crate::datasource::QueryPart;
use crate::joiner::JoinerError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Optional leading `*`, at least one non-`*` character, optional trailing `*`.
static SEARCH_PATTERN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\*?[^*]+\*?$").expect("valid search pattern regex"));

/// Returns `true` for patterns the joiner forwards to a datasource.
pub fn is_valid_search_pattern(pattern: &str) -> bool {
    SEARCH_PATTERN_RE.is_match(pattern)
}

/// Validates every part of a query.
///
/// # Errors
/// - `InvalidPattern` for the first part whose pattern is empty, consists
///   only of wildcards, or carries a `*` anywhere but at its ends.
pub fn validate_query(parts: &[QueryPart]) -> Result<(), JoinerError> {
    match parts
        .iter()
        .find(|part| !is_valid_search_pattern(&part.pattern))
    {
        Some(part) => Err(JoinerError::InvalidPattern {
            column: part.column.clone(),
            pattern: part.pattern.clone(),
        }),
        None => Ok(()),
    }
}
