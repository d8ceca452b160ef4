//! Identifier normalization and deduplication
//!
//! Normalization trims surrounding whitespace and drops everything from the
//! first `?` onward, so tracking parameters on otherwise identical URLs collapse
//! to one identifier. Entries that normalize to nothing are dropped.

use crate::types::Identifier;
use std::collections::HashSet;

/// Result of deduplicating a raw identifier list
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Deduplicated {
    /// Normalized identifiers in first-occurrence order
    pub unique: Vec<Identifier>,
    /// Normalized identifiers that repeated an earlier entry, in order of occurrence
    pub duplicates: Vec<Identifier>,
}

/// Normalize a raw identifier
pub fn normalize(raw: &str) -> Identifier {
    let trimmed = raw.trim();
    let without_query = match trimmed.find('?') {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    };
    Identifier::new(without_query)
}

/// Normalize and deduplicate `raw`, preserving first-seen order
///
/// Entries that are empty after normalization appear in neither list.
pub fn dedupe<I, S>(raw: I) -> Deduplicated
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut result = Deduplicated::default();

    for entry in raw {
        let id = normalize(entry.as_ref());
        if id.as_str().is_empty() {
            continue;
        }
        if seen.insert(id.clone()) {
            result.unique.push(id);
        } else {
            result.duplicates.push(id);
        }
    }

    result
}
