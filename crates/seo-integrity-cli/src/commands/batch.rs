//! Many URLs through the bounded scheduler, stoppable with Ctrl-C.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use seo_integrity::{
    BackoffRetryController, BoundedConcurrencyScheduler, FetchRequest, MultiPathFetcher,
    ProgressObserver, SchedulerReport,
};

use super::fetch::fetch_with_retry;

/// Result line for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    /// Position in the input list.
    pub index: usize,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Non-empty, non-comment lines.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Fetch every URL; entries come back in input order.
///
/// URLs still queued when `stop` is set are skipped and do not appear.
pub async fn batch_fetch(
    fetcher: &MultiPathFetcher,
    controller: &BackoffRetryController,
    scheduler: &BoundedConcurrencyScheduler,
    urls: Vec<String>,
    observer: &dyn ProgressObserver,
    stop: Arc<AtomicBool>,
) -> (Vec<BatchEntry>, SchedulerReport) {
    let request = FetchRequest::get();
    let results: Mutex<Vec<BatchEntry>> = Mutex::new(Vec::with_capacity(urls.len()));

    let request = &request;
    let results = &results;

    let report = scheduler
        .run(
            urls.into_iter().enumerate(),
            |(index, url): (usize, String)| async move {
                let entry = match fetch_with_retry(fetcher, controller, &url, request, observer).await {
                    Ok(resp) => BatchEntry {
                        index,
                        status: Some(resp.status),
                        path: Some(resp.path.to_string()),
                        bytes: Some(resp.body.len()),
                        error: None,
                        url,
                    },
                    Err(e) => {
                        tracing::warn!(url = %url, "fetch failed: {e:#}");
                        BatchEntry {
                            index,
                            status: None,
                            path: None,
                            bytes: None,
                            error: Some(format!("{e:#}")),
                            url,
                        }
                    }
                };
                results
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(entry);
            },
            || stop.load(Ordering::SeqCst),
        )
        .await;

    let mut entries = std::mem::take(
        &mut *results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()),
    );
    entries.sort_by_key(|e| e.index);
    (entries, report)
}
