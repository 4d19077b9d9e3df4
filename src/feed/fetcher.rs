use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::FetchConfig;

/// Errors that can occur while downloading a feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed or is not http(s)
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Downloads the raw bytes of a feed.
///
/// # Behavior
///
/// - Only `http` and `https` URLs are accepted
/// - Each request is bounded by `config.timeout_secs`
/// - HTTP 429, 5xx and truncated bodies are retried up to `config.max_retries`
///   times with exponential backoff capped at `config.max_backoff_secs`
/// - Other non-2xx statuses fail immediately
/// - Bodies larger than `config.max_feed_bytes` are rejected
///
/// # Errors
///
/// See [`FetchError`].
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    config: &FetchConfig,
) -> Result<Vec<u8>, FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(format!(
            "unsupported scheme {} (only http/https allowed)",
            parsed.scheme()
        )));
    }

    let timeout = Duration::from_secs(config.timeout_secs);
    let mut retry_count = 0;

    loop {
        let response = tokio::time::timeout(
            timeout,
            client
                .get(parsed.as_str())
                .header(reqwest::header::USER_AGENT, config.user_agent.as_str())
                .send(),
        )
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if retry_count >= config.max_retries {
                return Err(FetchError::RateLimited(config.max_retries));
            }
            let delay = backoff(retry_count, config);
            tracing::warn!(
                url = %url,
                retry = retry_count,
                delay_secs = delay.as_secs(),
                "Rate limited, backing off"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        if status.is_server_error() {
            if retry_count >= config.max_retries {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }
            let delay = backoff(retry_count, config);
            tracing::warn!(
                url = %url,
                status = %status,
                retry = retry_count,
                delay_secs = delay.as_secs(),
                "Server error, retrying after delay"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        match read_limited_bytes(response, config.max_feed_bytes).await {
            Ok(bytes) => return Ok(bytes),
            Err(FetchError::IncompleteResponse { expected, received })
                if retry_count < config.max_retries =>
            {
                let delay = backoff(retry_count, config);
                tracing::debug!(
                    url = %url,
                    expected = expected,
                    received = received,
                    attempt = retry_count + 1,
                    "Retrying incomplete download"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// 1s, 2s, 4s... capped at `max_backoff_secs`.
fn backoff(retry_count: u32, config: &FetchConfig) -> Duration {
    let secs = 2u64
        .checked_pow(retry_count)
        .unwrap_or(u64::MAX)
        .min(config.max_backoff_secs);
    Duration::from_secs(secs)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
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

    // EDGE-005: a dropped connection can end the stream early
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
