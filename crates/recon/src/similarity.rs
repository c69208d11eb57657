use std::collections::HashSet;

use deunicode::deunicode;
use strsim::{jaro_winkler, normalized_levenshtein};

/// Legal-entity suffix tokens dropped during normalization.
const LEGAL_SUFFIXES: &[&str] = &[
    "pty", "ltd", "limited", "inc", "incorporated", "corp", "corporation", "llc", "plc", "co",
    "company", "group", "holdings", "enterprises",
];

/// Fuzzy scores are capped below 1.0: identity of normalized strings is the
/// only way to score exact.
const MAX_FUZZY: f64 = 0.99;

const EDIT_WEIGHT: f64 = 0.30;
const JARO_WEIGHT: f64 = 0.50;
const TOKEN_WEIGHT: f64 = 0.20;

/// Normalize a display name for comparison: transliterate, case-fold,
/// strip punctuation and legal-entity suffixes, collapse whitespace.
pub fn normalize(name: &str) -> String {
    let latin = deunicode(name);
    let mut cleaned = String::with_capacity(latin.len());
    for ch in latin.chars() {
        if ch.is_alphanumeric() {
            cleaned.extend(ch.to_lowercase());
        } else if ch == '&' {
            cleaned.push_str(" and ");
        } else {
            cleaned.push(' ');
        }
    }
    cleaned
        .split_whitespace()
        .filter(|token| !LEGAL_SUFFIXES.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of two display names in [0, 1]. Deterministic, symmetric,
/// total: unscoreable input (empty after normalization) yields 0.0, and
/// only identical normalized strings reach 1.0.
pub fn score(a: &str, b: &str) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    if na == nb {
        return 1.0;
    }
    let edit = normalized_levenshtein(&na, &nb);
    let jaro = jaro_winkler(&na, &nb);
    let tokens = token_overlap(&na, &nb);
    (EDIT_WEIGHT * edit + JARO_WEIGHT * jaro + TOKEN_WEIGHT * tokens).min(MAX_FUZZY)
}

/// Jaccard overlap of whitespace tokens.
fn token_overlap(a: &str, b: &str) -> f64 {
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    shared / union
}
