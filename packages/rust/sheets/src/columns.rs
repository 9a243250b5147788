//! Column resolution: maps human-readable header names to positional
//! indices.
//!
//! Sheets in the field rarely carry the exact header text a step expects —
//! casing, spacing, and suffixes drift — so resolution is fuzzy. Wanted
//! names are evaluated longest-first and each header index is claimed at
//! most once, so a specific name ("AI Comparable Price") cannot lose its
//! header to a shorter name ("Price") that would substring-match it.

use std::collections::{HashMap, HashSet};

/// Mapping from wanted column name to a resolved header index (or absent).
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    entries: HashMap<String, Option<usize>>,
}

impl ColumnMap {
    /// Resolved index for a wanted name, if the name was both requested and
    /// found.
    pub fn get(&self, name: &str) -> Option<usize> {
        self.entries.get(name).copied().flatten()
    }

    /// Wanted names from `required` that did not resolve to a header.
    pub fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.get(name).is_none())
            .map(|name| name.to_string())
            .collect()
    }
}

/// Resolve each wanted name (or regex pattern) against the header row.
///
/// Matching policy, per wanted name, restricted to unclaimed header indices:
/// 1. Names containing regex metacharacters are compiled case-insensitively
///    and take the first matching header.
/// 2. An exact match on the normalized form (lowercased, whitespace
///    stripped) wins immediately.
/// 3. Otherwise the best-scoring normalized substring match wins, scored by
///    how much of the header the name covers, with a bonus for headers that
///    start with the name.
pub fn resolve_columns(headers: &[String], wanted: &[&str]) -> ColumnMap {
    let mut entries = HashMap::new();
    let mut claimed: HashSet<usize> = HashSet::new();

    // Longest-first so specific names resolve before generic ones.
    let mut ordered: Vec<&str> = wanted.to_vec();
    ordered.sort_by_key(|name| std::cmp::Reverse(name.len()));

    for name in ordered {
        let index = resolve_one(headers, name, &claimed);
        if let Some(idx) = index {
            claimed.insert(idx);
        }
        entries.insert(name.to_string(), index);
    }

    ColumnMap { entries }
}

fn resolve_one(headers: &[String], name: &str, claimed: &HashSet<usize>) -> Option<usize> {
    if has_regex_meta(name) {
        if let Ok(pattern) = regex::RegexBuilder::new(name).case_insensitive(true).build() {
            for (idx, header) in headers.iter().enumerate() {
                if !header.is_empty() && !claimed.contains(&idx) && pattern.is_match(header) {
                    return Some(idx);
                }
            }
        }
        // Invalid or unmatched patterns fall through to fuzzy matching.
    }

    let norm_name = normalize(name);
    if norm_name.is_empty() {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for (idx, header) in headers.iter().enumerate() {
        if header.is_empty() || claimed.contains(&idx) {
            continue;
        }
        let norm_header = normalize(header);

        if norm_name == norm_header {
            return Some(idx);
        }

        if norm_header.contains(&norm_name) {
            let ratio = norm_name.len() as f64 / norm_header.len() as f64;
            let starts_with_bonus = if norm_header.starts_with(&norm_name) {
                10.0
            } else {
                0.0
            };
            let score = ratio * 100.0 + starts_with_bonus;
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((idx, score));
            }
        }
    }

    best.map(|(idx, _)| idx)
}

/// Lowercase and strip all whitespace.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

fn has_regex_meta(name: &str) -> bool {
    name.chars()
        .any(|c| matches!(c, '[' | '(' | '*' | '+' | '?' | '^' | '$'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_normalized_match() {
        let h = headers(&["Asset Name", "Raw Trusted Data", "Price"]);
        let map = resolve_columns(&h, &["raw trusted data"]);
        assert_eq!(map.get("raw trusted data"), Some(1));
    }

    #[test]
    fn longest_name_resolves_first() {
        let h = headers(&["Price", "AI Comparable Price"]);
        let map = resolve_columns(&h, &["AI Comparable Price", "Price"]);
        assert_eq!(map.get("AI Comparable Price"), Some(1));
        assert_eq!(map.get("Price"), Some(0));
    }

    #[test]
    fn substring_prefers_tighter_header() {
        // "Price" covers more of "Price" than of "Price (USD, est.)".
        let h = headers(&["Price (USD, estimated)", "Price"]);
        let map = resolve_columns(&h, &["Price"]);
        assert_eq!(map.get("Price"), Some(1));
    }

    #[test]
    fn prefix_bonus_breaks_ties() {
        let h = headers(&["Final AI Data", "AI Data Raw"]);
        let map = resolve_columns(&h, &["AI Data"]);
        assert_eq!(map.get("AI Data"), Some(1));
    }

    #[test]
    fn regex_pattern_matches_case_insensitively() {
        let h = headers(&["2015 > Caterpillar > 950M", "YOM > OEM > MODEL (edited)"]);
        let map = resolve_columns(&h, &[r"YOM > OEM > MODEL.*"]);
        assert_eq!(map.get(r"YOM > OEM > MODEL.*"), Some(1));
    }

    #[test]
    fn unresolved_name_reported_missing() {
        let h = headers(&["Price"]);
        let map = resolve_columns(&h, &["Price", "AI Data"]);
        assert_eq!(map.get("AI Data"), None);
        assert_eq!(map.missing(&["Price", "AI Data"]), vec!["AI Data"]);
    }

    #[test]
    fn claimed_index_not_reused() {
        let h = headers(&["AI Comparable Price"]);
        let map = resolve_columns(&h, &["AI Comparable Price", "Price"]);
        assert_eq!(map.get("AI Comparable Price"), Some(0));
        // The only header is claimed, so "Price" has nothing left to match.
        assert_eq!(map.get("Price"), None);
    }

    #[test]
    fn empty_headers_never_match() {
        let h = headers(&["", "Price"]);
        let map = resolve_columns(&h, &["Price"]);
        assert_eq!(map.get("Price"), Some(1));
    }
}
