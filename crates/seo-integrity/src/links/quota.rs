//! Injecting extra placeholders when a document links too little.
//!
//! Candidates are destinations not yet linked. For each one a few literal
//! phrases are derived from its display name and searched for in plain text;
//! the first safe match becomes a new placeholder.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use crate::types::{LinkDirectory, LinkPlaceholder};

use super::placeholder;

/// Search phrases for a display name, longest first.
///
/// The full name, the name without its first word, and the name without its
/// last word; case-insensitive duplicates and phrases of `min_len`
/// characters or fewer are dropped.
pub fn derive_phrases(display_name: &str, min_len: usize) -> Vec<String> {
    let words: Vec<&str> = display_name.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut raw = vec![words.join(" ")];
    if words.len() > 1 {
        raw.push(words[1..].join(" "));
        raw.push(words[..words.len() - 1].join(" "));
    }

    let mut seen = HashSet::new();
    let mut phrases: Vec<String> = raw
        .into_iter()
        .filter(|p| p.chars().count() > min_len)
        // Quotes or brackets would break the directive syntax.
        .filter(|p| !p.contains('"') && !p.contains(']'))
        .filter(|p| seen.insert(p.to_lowercase()))
        .collect();
    phrases.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    phrases
}

fn protected_regex() -> &'static Regex {
    static PROTECTED: OnceLock<Regex> = OnceLock::new();
    PROTECTED.get_or_init(|| {
        Regex::new(concat!(
            r"(?is)<a\b[^>]*>.*?</a\s*>",
            r"|<[^>]*>",
            r"|\[INTERNAL_LINK\b[^\]]*\]",
            r"|&(?:#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);",
        ))
        .expect("protected-range regex is valid")
    })
}

/// Byte ranges where injection must never happen: anchors, tags,
/// placeholders and character entities.
pub fn protected_ranges(document: &str) -> Vec<Range<usize>> {
    protected_regex()
        .find_iter(document)
        .map(|m| m.range())
        .collect()
}

fn overlaps(range: &Range<usize>, protected: &[Range<usize>]) -> bool {
    protected
        .iter()
        .any(|p| range.start < p.end && p.start < range.end)
}

fn is_word_char(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// First case-insensitive, word-bounded occurrence of `phrase` in plain text.
pub fn find_unlinked(document: &str, phrase: &str) -> Option<Range<usize>> {
    let pattern = RegexBuilder::new(&regex::escape(phrase))
        .case_insensitive(true)
        .build()
        .ok()?;
    let protected = protected_ranges(document);

    let found = pattern
        .find_iter(document)
        .map(|m| m.range())
        .find(|r| {
            let before = document[..r.start].chars().next_back();
            let after = document[r.end..].chars().next();
            !is_word_char(before) && !is_word_char(after) && !overlaps(r, &protected)
        });
    found
}

/// Add placeholders until `min_links` placeholders exist or candidates run out.
///
/// Returns the new document and how many placeholders were injected.
pub fn enforce(
    document: &str,
    directory: &LinkDirectory,
    min_links: usize,
    min_phrase_len: usize,
    min_candidate_words: usize,
) -> (String, usize) {
    let existing = placeholder::scan(document);
    let mut linked: HashSet<String> = existing
        .iter()
        .map(|m| m.placeholder.target_key.clone())
        .collect();
    let mut count = existing.len();
    if count >= min_links {
        return (document.to_string(), 0);
    }

    let mut doc = document.to_string();
    let mut injected = 0;

    for dest in directory.iter() {
        if count >= min_links {
            break;
        }
        if linked.contains(&dest.key) {
            continue;
        }
        if dest.display_name.split_whitespace().count() < min_candidate_words {
            continue;
        }

        let hit = derive_phrases(&dest.display_name, min_phrase_len)
            .iter()
            .find_map(|phrase| find_unlinked(&doc, phrase));

        if let Some(range) = hit {
            let anchor = doc[range.clone()].to_string();
            let directive = LinkPlaceholder::new(&dest.key, &anchor).render();
            tracing::debug!(key = %dest.key, anchor = %anchor, "injecting link placeholder");
            doc.replace_range(range, &directive);
            linked.insert(dest.key.clone());
            count += 1;
            injected += 1;
        }
    }

    (doc, injected)
}
