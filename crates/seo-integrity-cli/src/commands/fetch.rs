//! Single-URL fetch through the fallback paths, wrapped in retries.

use anyhow::Context;

use seo_integrity::{
    BackoffRetryController, FetchRequest, FetchResponse, MultiPathFetcher, ProgressObserver,
};

/// Parse `Name: value` header arguments.
pub fn parse_header(raw: &str) -> anyhow::Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("header '{raw}' is not in Name: value form"))?;
    let name = name.trim();
    anyhow::ensure!(!name.is_empty(), "header '{raw}' has an empty name");
    Ok((name.to_string(), value.trim().to_string()))
}

/// Build a request from command-line parts.
pub fn build_request(method: &str, headers: &[String], body: Option<String>) -> anyhow::Result<FetchRequest> {
    let mut request = FetchRequest {
        method: method.to_uppercase(),
        headers: Vec::with_capacity(headers.len()),
        body,
    };
    for raw in headers {
        request.headers.push(parse_header(raw)?);
    }
    Ok(request)
}

/// Fetch `url`, retrying each full round of paths on transient failures.
///
/// A non-2xx final response is an error so 429/5xx can be retried.
pub async fn fetch_with_retry(
    fetcher: &MultiPathFetcher,
    controller: &BackoffRetryController,
    url: &str,
    request: &FetchRequest,
    observer: &dyn ProgressObserver,
) -> anyhow::Result<FetchResponse> {
    controller
        .run(url, || async move {
            let response = fetcher.fetch(url, request, observer).await?;
            Ok::<_, anyhow::Error>(response.error_for_status()?)
        })
        .await
}
