use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Per-source fetch budget. A slow status page is skipped for this run
/// and picked up again on the next one.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Response body cap. Status feeds are a few hundred KB at most;
/// anything larger is not worth buffering.
const MAX_FEED_SIZE: usize = 4 * 1024 * 1024;

/// Errors that can occur while retrieving one source's feed bytes.
///
/// Every variant is isolated to its source by the orchestrator; a
/// failing fetch never aborts the run.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the fetch budget
    #[error("request timed out")]
    Timeout,
    /// Response body exceeded the size cap
    #[error("response too large")]
    ResponseTooLarge,
}

/// Fetch one feed's raw bytes over HTTP GET.
///
/// The whole request, headers through body, must finish within the
/// 10-second budget. No retry is performed here; retry, if any, is the
/// next scheduled run.
///
/// # Errors
///
/// [`FetchError::Timeout`] on budget exhaustion, [`FetchError::HttpStatus`]
/// for non-2xx responses, [`FetchError::Network`] for transport failures,
/// and [`FetchError::ResponseTooLarge`] when the body exceeds the cap.
pub async fn fetch_source(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    tokio::time::timeout(FETCH_TIMEOUT, fetch_inner(client, url))
        .await
        .map_err(|_| FetchError::Timeout)?
}

async fn fetch_inner(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await.map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    read_limited_bytes(response, MAX_FEED_SIZE).await
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: trust Content-Length when present.
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
