//! Duplicate embedded-media detection and repair.
//!
//! Generated articles sometimes embed the same video twice where two
//! different items were intended. `MediaIntegrityGuardian::fix` detects the
//! case where every embed carries one identifier and rewrites only the
//! identifier of the second embed to the second intended item.
//!
//! `MediaLedger` remembers identifiers used recently so consecutive
//! documents do not keep embedding the same items.

use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cache::TtlCache;
use crate::error::ConfigError;
use crate::types::{MediaItem, MediaReference};

/// Default embed pattern: YouTube embed URLs, capturing the video id.
pub const DEFAULT_EMBED_PATTERN: &str =
    r"https?://(?:www\.)?youtube(?:-nocookie)?\.com/embed/([A-Za-z0-9_-]{6,})";

/// Media guardian settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Fewer intended items than this and the guardian does nothing.
    pub min_unique_items: usize,
    /// Regex for embed sources; capture group 1 is the identifier.
    pub embed_pattern: String,
    /// How long a used identifier stays in the ledger.
    pub used_id_ttl_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            min_unique_items: 2,
            embed_pattern: DEFAULT_EMBED_PATTERN.to_string(),
            used_id_ttl_secs: 7 * 24 * 3600,
        }
    }
}

/// Fixes duplicate embed identifiers in finished documents.
#[derive(Debug, Clone)]
pub struct MediaIntegrityGuardian {
    pattern: Regex,
    min_unique_items: usize,
}

impl MediaIntegrityGuardian {
    pub fn new(config: &MediaConfig) -> Result<Self, ConfigError> {
        let pattern = Regex::new(&config.embed_pattern)
            .map_err(|e| ConfigError::Invalid(format!("media.embed_pattern: {e}")))?;
        if pattern.captures_len() < 2 {
            return Err(ConfigError::Invalid(
                "media.embed_pattern needs a capture group for the identifier".to_string(),
            ));
        }
        Ok(Self {
            pattern,
            min_unique_items: config.min_unique_items,
        })
    }

    /// All embed identifiers in document order.
    pub fn scan(&self, document: &str) -> Vec<MediaReference> {
        self.pattern
            .captures_iter(document)
            .filter_map(|c| c.get(1))
            .map(|m| MediaReference {
                id: m.as_str().to_string(),
                position: m.start(),
            })
            .collect()
    }

    /// Rewrite the second embed when every embed repeats one identifier.
    ///
    /// Returns the document unchanged when there is nothing to fix.
    pub fn fix(&self, document: &str, intended: &[MediaItem]) -> String {
        if intended.len() < self.min_unique_items.max(2) {
            return document.to_string();
        }

        let refs = self.scan(document);
        if refs.len() < 2 {
            return document.to_string();
        }

        let duplicate = &refs[0].id;
        if !refs.iter().all(|r| &r.id == duplicate) {
            return document.to_string();
        }

        let replacement = &intended[1].id;
        if replacement == duplicate {
            return document.to_string();
        }

        let second = &refs[1];
        let end = second.position + second.id.len();
        tracing::info!(
            duplicate = %duplicate,
            replacement = %replacement,
            embeds = refs.len(),
            "rewriting duplicate media embed"
        );

        let mut fixed = String::with_capacity(document.len() + replacement.len());
        fixed.push_str(&document[..second.position]);
        fixed.push_str(replacement);
        fixed.push_str(&document[end..]);
        fixed
    }
}

/// Recently used media identifiers.
pub struct MediaLedger {
    used: TtlCache<String, ()>,
}

impl MediaLedger {
    pub fn new(ttl: Duration) -> Self {
        Self {
            used: TtlCache::new(ttl),
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(Duration::from_secs(config.used_id_ttl_secs))
    }

    pub fn is_used(&self, id: &str) -> bool {
        self.used.contains(&id.to_string())
    }

    /// Candidates whose identifiers have not been used within the TTL,
    /// in their original order.
    pub fn filter_unused(&self, candidates: &[MediaItem]) -> Vec<MediaItem> {
        candidates
            .iter()
            .filter(|item| !self.is_used(&item.id))
            .cloned()
            .collect()
    }

    /// Mark items as used.
    pub fn record<'a>(&mut self, items: impl IntoIterator<Item = &'a MediaItem>) {
        for item in items {
            self.used.insert(item.id.clone(), ());
        }
    }

    pub fn cleanup_expired(&mut self) -> usize {
        self.used.cleanup_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embed(id: &str) -> String {
        format!(
            "<iframe width=\"560\" height=\"315\" src=\"https://www.youtube.com/embed/{id}?rel=0\" \
             title=\"Video\" allowfullscreen></iframe>"
        )
    }

    fn guardian() -> MediaIntegrityGuardian {
        MediaIntegrityGuardian::new(&MediaConfig::default()).unwrap()
    }

    fn items(ids: &[&str]) -> Vec<MediaItem> {
        ids.iter().map(|id| MediaItem::new(id)).collect()
    }

    #[test]
    fn test_duplicate_second_embed_corrected() {
        let doc = format!("<p>A</p>{}<p>B</p>{}", embed("AAAAAAAAAAA"), embed("AAAAAAAAAAA"));
        let fixed = guardian().fix(&doc, &items(&["AAAAAAAAAAA", "BBBBBBBBBBB"]));

        let expected = format!("<p>A</p>{}<p>B</p>{}", embed("AAAAAAAAAAA"), embed("BBBBBBBBBBB"));
        assert_eq!(fixed, expected);
    }

    #[test]
    fn test_noop_cases() {
        let g = guardian();
        let dup = format!("{}{}", embed("AAAAAAAAAAA"), embed("AAAAAAAAAAA"));
        let distinct = format!("{}{}", embed("AAAAAAAAAAA"), embed("CCCCCCCCCCC"));
        let single = embed("AAAAAAAAAAA");

        // Fewer than two intended items
        assert_eq!(g.fix(&dup, &items(&["AAAAAAAAAAA"])), dup);
        // Embeds already distinct
        assert_eq!(g.fix(&distinct, &items(&["AAAAAAAAAAA", "BBBBBBBBBBB"])), distinct);
        // Only one embed
        assert_eq!(g.fix(&single, &items(&["AAAAAAAAAAA", "BBBBBBBBBBB"])), single);
        // Second intended item is the duplicate itself
        assert_eq!(g.fix(&dup, &items(&["ZZZZZZZZZZZ", "AAAAAAAAAAA"])), dup);
    }

    #[test]
    fn test_only_second_of_three_rewritten() {
        let doc = format!(
            "{}{}{}",
            embed("AAAAAAAAAAA"),
            embed("AAAAAAAAAAA"),
            embed("AAAAAAAAAAA")
        );
        let fixed = guardian().fix(&doc, &items(&["AAAAAAAAAAA", "BBBBBBBBBBB", "CCCCCCCCCCC"]));
        let ids: Vec<String> = guardian().scan(&fixed).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["AAAAAAAAAAA", "BBBBBBBBBBB", "AAAAAAAAAAA"]);
    }

    #[test]
    fn test_scan_positions() {
        let doc = embed("dQw4w9WgXcQ");
        let refs = guardian().scan(&doc);
        assert_eq!(refs.len(), 1);
        assert_eq!(&doc[refs[0].position..refs[0].position + 11], "dQw4w9WgXcQ");
    }

    #[test]
    fn test_min_unique_items_configurable() {
        let g = MediaIntegrityGuardian::new(&MediaConfig {
            min_unique_items: 3,
            ..Default::default()
        })
        .unwrap();
        let dup = format!("{}{}", embed("AAAAAAAAAAA"), embed("AAAAAAAAAAA"));
        assert_eq!(g.fix(&dup, &items(&["AAAAAAAAAAA", "BBBBBBBBBBB"])), dup);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let bad = MediaConfig {
            embed_pattern: "youtube.com/embed/[A-Z]+".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            MediaIntegrityGuardian::new(&bad),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ledger_filters_recent_ids() {
        let mut ledger = MediaLedger::new(Duration::from_secs(60));
        let all = items(&["a", "b", "c"]);
        ledger.record(&all[..2]);
        assert_eq!(ledger.filter_unused(&all), items(&["c"]));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(ledger.filter_unused(&all).len(), 3);
        assert_eq!(ledger.cleanup_expired(), 2);
    }
}
