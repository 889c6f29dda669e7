//! Offline document commands: extract, links, media, quality.

use anyhow::Context;

use seo_integrity::{
    check_length, extract_payload, Completeness, Destination, IntegrityConfig, LinkDirectory,
    LinkIntegrityEngine, LinkOutcome, MediaIntegrityGuardian, MediaItem,
};

/// Extract the JSON payload from noisy text.
pub fn extract_cmd(text: &str) -> anyhow::Result<String> {
    let payload = extract_payload(text)?;
    if payload.completeness == Completeness::AutoClosed {
        tracing::warn!("input was truncated; missing closers were appended");
    }
    Ok(payload.text)
}

/// Run the link passes. `directory_json` is a JSON array of destinations.
pub fn links_cmd(
    config: &IntegrityConfig,
    document: &str,
    directory_json: &str,
    min_links: Option<usize>,
) -> anyhow::Result<LinkOutcome> {
    let entries: Vec<Destination> =
        serde_json::from_str(directory_json).context("parsing destination directory")?;
    let directory = LinkDirectory::new(entries);
    let engine = LinkIntegrityEngine::new(config.links.clone());
    let quota = min_links.unwrap_or(config.links.min_links);
    Ok(engine.run_with_quota(document, &directory, quota))
}

/// Fix duplicate media embeds. `items_json` is a JSON array of items or of
/// bare identifier strings.
pub fn media_cmd(config: &IntegrityConfig, document: &str, items_json: &str) -> anyhow::Result<String> {
    let items = parse_media_items(items_json)?;
    let guardian = MediaIntegrityGuardian::new(&config.media)?;
    Ok(guardian.fix(document, &items))
}

fn parse_media_items(json: &str) -> anyhow::Result<Vec<MediaItem>> {
    if let Ok(items) = serde_json::from_str::<Vec<MediaItem>>(json) {
        return Ok(items);
    }
    let ids: Vec<String> = serde_json::from_str(json).context("parsing media items")?;
    Ok(ids.iter().map(|id| MediaItem::new(id)).collect())
}

/// Check the visible word count; returns it on success.
pub fn quality_cmd(config: &IntegrityConfig, document: &str, min_words: Option<usize>) -> anyhow::Result<usize> {
    let minimum = min_words.unwrap_or(config.quality.min_words);
    check_length(document, minimum)?;
    Ok(seo_integrity::quality::visible_word_count(document))
}
