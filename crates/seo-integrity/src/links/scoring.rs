//! Fuzzy matching of anchor text against destination names.

use std::collections::HashSet;

use crate::types::{Destination, LinkDirectory};

/// Lowercased words longer than two characters.
pub fn significant_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Score how well `anchor` names `dest`.
///
/// +100 for an exact case-insensitive match, +60 when the name contains the
/// anchor, +50 when the anchor contains the name, plus the mean of the
/// shared-word ratios against each side (as percentages).
pub fn score(anchor: &str, dest: &Destination) -> f64 {
    let anchor_lc = anchor.trim().to_lowercase();
    let name_lc = dest.display_name.trim().to_lowercase();
    if anchor_lc.is_empty() || name_lc.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    if anchor_lc == name_lc {
        total += 100.0;
    }
    if name_lc.contains(&anchor_lc) {
        total += 60.0;
    }
    if anchor_lc.contains(&name_lc) {
        total += 50.0;
    }

    let anchor_words = significant_words(&anchor_lc);
    let name_words = significant_words(&name_lc);
    if !anchor_words.is_empty() && !name_words.is_empty() {
        let name_set: HashSet<&str> = name_words.iter().map(String::as_str).collect();
        let shared = anchor_words
            .iter()
            .filter(|w| name_set.contains(w.as_str()))
            .count() as f64;
        let anchor_ratio = shared / anchor_words.len() as f64 * 100.0;
        let name_ratio = shared / name_words.len() as f64 * 100.0;
        total += (anchor_ratio + name_ratio) / 2.0;
    }

    total
}

/// Highest-scoring destination for `anchor`; ties go to the earlier entry.
pub fn best_match<'a>(anchor: &str, directory: &'a LinkDirectory) -> Option<(&'a Destination, f64)> {
    let mut best: Option<(&Destination, f64)> = None;
    for dest in directory.iter() {
        let s = score(anchor, dest);
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((dest, s));
        }
    }
    best
}
