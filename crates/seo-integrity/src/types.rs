//! Core data types shared by the integrity passes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A known valid link target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub key: String,
    #[serde(alias = "title", alias = "displayName")]
    pub display_name: String,
    /// Canonical location the resolved anchor points at.
    #[serde(alias = "url", alias = "canonicalLocationReference")]
    pub location: String,
}

impl Destination {
    pub fn new(key: &str, display_name: &str, location: &str) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            location: location.to_string(),
        }
    }
}

/// Read-only directory of destinations.
///
/// Iteration follows insertion order; when two entries share a key the first
/// one wins lookups.
#[derive(Debug, Clone, Default)]
pub struct LinkDirectory {
    entries: Vec<Destination>,
    index: HashMap<String, usize>,
}

impl LinkDirectory {
    pub fn new(entries: Vec<Destination>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, dest) in entries.iter().enumerate() {
            index.entry(dest.key.clone()).or_insert(i);
        }
        Self { entries, index }
    }

    /// Look up a destination by key.
    pub fn get(&self, key: &str) -> Option<&Destination> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Destination> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Destination> for LinkDirectory {
    fn from_iter<I: IntoIterator<Item = Destination>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// An embedded cross-reference directive awaiting resolution.
///
/// Rendered in documents as `[INTERNAL_LINK slug="<key>" text="<anchor>"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPlaceholder {
    pub target_key: String,
    pub anchor_text: String,
}

impl LinkPlaceholder {
    pub fn new(target_key: &str, anchor_text: &str) -> Self {
        Self {
            target_key: target_key.to_string(),
            anchor_text: anchor_text.to_string(),
        }
    }

    /// Both the key and the anchor text are non-empty.
    pub fn is_well_formed(&self) -> bool {
        !self.target_key.trim().is_empty() && !self.anchor_text.trim().is_empty()
    }

    /// Canonical directive syntax for this placeholder.
    pub fn render(&self) -> String {
        format!(
            "[INTERNAL_LINK slug=\"{}\" text=\"{}\"]",
            self.target_key, self.anchor_text
        )
    }
}

/// A media item the document is supposed to embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl MediaItem {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: None,
        }
    }
}

/// An embed identifier found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    pub id: String,
    /// Byte offset of the identifier within the document.
    pub position: usize,
}
