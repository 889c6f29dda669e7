//! Link integrity pipeline for finished documents.
//!
//! Five ordered passes over the `[INTERNAL_LINK slug=".." text=".."]`
//! directives a generator leaves behind:
//!
//! 1. **sanitize**: malformed directives become their anchor text (or vanish)
//! 2. **deduplicate**: only the first directive per key survives
//! 3. **repair**: unknown keys are fuzzy-matched against the directory by
//!    anchor text, else demoted; deduplication then runs again
//! 4. **quota**: too few links and plain-text mentions of unlinked
//!    destinations are turned into directives
//! 5. **resolve**: every directive becomes an `<a>` with tracking parameters
//!
//! Every pass is total. A document with nothing to fix comes back unchanged.

pub mod placeholder;
pub mod quota;
pub mod scoring;

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{LinkDirectory, LinkPlaceholder};

// ── Configuration ────────────────────────────────────────────────

/// Query parameters appended to every resolved link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingParams {
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            utm_source: "internal".to_string(),
            utm_medium: "article".to_string(),
            utm_campaign: "internal_link".to_string(),
        }
    }
}

impl TrackingParams {
    fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            ("utm_source", &self.utm_source),
            ("utm_medium", &self.utm_medium),
            ("utm_campaign", &self.utm_campaign),
        ]
    }
}

/// Link pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Quota: minimum number of resolved links.
    pub min_links: usize,
    /// Repair only when the best fuzzy score is strictly above this.
    pub repair_threshold: f64,
    /// Quota phrases must be longer than this many characters.
    pub min_phrase_len: usize,
    /// Quota candidates need at least this many words in their name.
    pub min_candidate_words: usize,
    pub tracking: TrackingParams,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            min_links: 8,
            repair_threshold: 50.0,
            min_phrase_len: 10,
            min_candidate_words: 3,
            tracking: TrackingParams::default(),
        }
    }
}

// ── Results ──────────────────────────────────────────────────────

/// Per-pass change counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReport {
    /// Malformed directives demoted or removed.
    pub sanitized: usize,
    /// Repeat directives demoted (both dedup runs).
    pub deduplicated: usize,
    /// Unknown keys rewritten to a directory key.
    pub repaired: usize,
    /// Unknown keys with no good match, demoted.
    pub demoted: usize,
    /// Directives added by quota enforcement.
    pub injected: usize,
    /// Anchors emitted by the resolve pass.
    pub resolved: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOutcome {
    pub document: String,
    pub report: LinkReport,
}

// ── Engine ───────────────────────────────────────────────────────

/// Runs the link passes with one configuration.
#[derive(Debug, Clone, Default)]
pub struct LinkIntegrityEngine {
    config: LinkConfig,
}

fn dangling_regex() -> &'static Regex {
    static DANGLING: OnceLock<Regex> = OnceLock::new();
    DANGLING.get_or_init(|| {
        // Complete attributes, then at most one cut-off attribute.
        Regex::new(concat!(
            r#"\[INTERNAL_LINK\b(?:\s*\w+\s*=\s*"[^"]*")*"#,
            r#"(?:\s*\w+\s*=\s*"[^"\]<\n]*|\s*\w+\s*=?)?\s*"#
        ))
        .expect("dangling directive regex is valid")
    })
}

impl LinkIntegrityEngine {
    pub fn new(config: LinkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// All five passes with the configured quota.
    pub fn run(&self, document: &str, directory: &LinkDirectory) -> LinkOutcome {
        self.run_with_quota(document, directory, self.config.min_links)
    }

    /// All five passes with an explicit quota.
    pub fn run_with_quota(
        &self,
        document: &str,
        directory: &LinkDirectory,
        min_links: usize,
    ) -> LinkOutcome {
        let mut report = LinkReport::default();

        let (doc, n) = self.sanitize(document);
        report.sanitized = n;

        let (doc, n) = self.deduplicate(&doc);
        report.deduplicated = n;

        let (doc, repaired, demoted) = self.repair(&doc, directory);
        report.repaired = repaired;
        report.demoted = demoted;

        let (doc, n) = self.deduplicate(&doc);
        report.deduplicated += n;

        let (doc, n) = self.enforce_quota(&doc, directory, min_links);
        report.injected = n;

        let (doc, n) = self.resolve(&doc, directory);
        report.resolved = n;

        tracing::info!(
            sanitized = report.sanitized,
            deduplicated = report.deduplicated,
            repaired = report.repaired,
            demoted = report.demoted,
            injected = report.injected,
            resolved = report.resolved,
            "link integrity passes complete"
        );

        LinkOutcome {
            document: doc,
            report,
        }
    }

    /// Demote directives without a key or anchor text.
    ///
    /// Unterminated directive fragments are stripped as well.
    pub fn sanitize(&self, document: &str) -> (String, usize) {
        let mut count = 0;
        let doc = placeholder::rewrite(document, |p| {
            if p.is_well_formed() {
                p.render()
            } else {
                count += 1;
                p.anchor_text.clone()
            }
        });

        if !placeholder::contains_directive(&doc) {
            return (doc, count);
        }
        // Well-formed directives end in `]` right after their attributes.
        let dangling: Vec<_> = dangling_regex()
            .find_iter(&doc)
            .filter(|m| !doc[m.end()..].starts_with(']'))
            .map(|m| m.range())
            .collect();
        if dangling.is_empty() {
            return (doc, count);
        }
        tracing::debug!(dangling = dangling.len(), "stripping unterminated link directives");
        let mut cleaned = String::with_capacity(doc.len());
        let mut cursor = 0;
        for range in &dangling {
            cleaned.push_str(&doc[cursor..range.start]);
            cursor = range.end;
        }
        cleaned.push_str(&doc[cursor..]);
        (cleaned, count + dangling.len())
    }

    /// Keep the first directive per key; demote the rest.
    pub fn deduplicate(&self, document: &str) -> (String, usize) {
        let mut seen = HashSet::new();
        let mut count = 0;
        let doc = placeholder::rewrite(document, |p| {
            if seen.insert(p.target_key.clone()) {
                p.render()
            } else {
                count += 1;
                p.anchor_text.clone()
            }
        });
        (doc, count)
    }

    /// Point unknown keys at the best-matching destination, or demote them.
    ///
    /// Returns the document, the repaired count and the demoted count.
    pub fn repair(&self, document: &str, directory: &LinkDirectory) -> (String, usize, usize) {
        let mut repaired = 0;
        let mut demoted = 0;
        let threshold = self.config.repair_threshold;

        let doc = placeholder::rewrite(document, |p| {
            if directory.contains(&p.target_key) {
                return p.render();
            }
            match scoring::best_match(&p.anchor_text, directory) {
                Some((dest, score)) if score > threshold => {
                    tracing::debug!(
                        from = %p.target_key,
                        to = %dest.key,
                        score,
                        "repairing link key"
                    );
                    repaired += 1;
                    LinkPlaceholder::new(&dest.key, &p.anchor_text).render()
                }
                best => {
                    tracing::debug!(
                        key = %p.target_key,
                        best_score = best.map(|(_, s)| s).unwrap_or(0.0),
                        "demoting unknown link key"
                    );
                    demoted += 1;
                    p.anchor_text.clone()
                }
            }
        });
        (doc, repaired, demoted)
    }

    /// Inject directives until `min_links` exist or candidates run out.
    pub fn enforce_quota(
        &self,
        document: &str,
        directory: &LinkDirectory,
        min_links: usize,
    ) -> (String, usize) {
        quota::enforce(
            document,
            directory,
            min_links,
            self.config.min_phrase_len,
            self.config.min_candidate_words,
        )
    }

    /// Replace every directive with a final anchor.
    ///
    /// A key missing from the directory, or already linked, yields its plain
    /// anchor text so no destination is referenced twice.
    pub fn resolve(&self, document: &str, directory: &LinkDirectory) -> (String, usize) {
        let mut linked = HashSet::new();
        let mut count = 0;
        let doc = placeholder::rewrite(document, |p| match directory.get(&p.target_key) {
            Some(dest) if linked.insert(dest.key.clone()) => {
                count += 1;
                format!(
                    "<a href=\"{}\">{}</a>",
                    tracked_href(&dest.location, &self.config.tracking),
                    escape_quotes(&p.anchor_text)
                )
            }
            _ => p.anchor_text.clone(),
        });
        (doc, count)
    }
}

/// Append tracking parameters to a location.
///
/// Absolute URLs go through `url`; relative paths get a hand-built query.
pub fn tracked_href(location: &str, tracking: &TrackingParams) -> String {
    if let Ok(mut url) = url::Url::parse(location) {
        {
            let mut query = url.query_pairs_mut();
            for (k, v) in tracking.pairs() {
                query.append_pair(k, v);
            }
        }
        return url.to_string();
    }

    let (base, fragment) = match location.split_once('#') {
        Some((b, f)) => (b, Some(f)),
        None => (location, None),
    };
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(tracking.pairs())
        .finish();
    let sep = if base.contains('?') { '&' } else { '?' };
    let mut href = format!("{}{}{}", base.replace('"', "%22"), sep, query);
    if let Some(f) = fragment {
        href.push('#');
        href.push_str(&f.replace('"', "%22"));
    }
    href
}

/// Escape quote characters for use inside HTML.
pub fn escape_quotes(text: &str) -> String {
    text.replace('"', "&quot;").replace('\'', "&#39;")
}
