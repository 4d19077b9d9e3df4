//! One poll of one feed on behalf of one user: fetch, parse, extract.

use thiserror::Error;
use tracing::Instrument;

use crate::config::FetchConfig;
use crate::delta::{extract_delta, DeltaError, DeltaResult, EventSink, Mode};
use crate::feed::{fetch_feed, parse_snapshot, FetchError};

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Delta(#[from] DeltaError),
}

/// Polls `url` and returns the entries updated after `last_reference`.
///
/// `user` is only used to label diagnostics. A source that downloads but is
/// not a feed is not an error: it yields an empty [`DeltaResult`] echoing
/// `last_reference`, with the reason reported to `sink`.
///
/// # Errors
///
/// - [`PollError::Fetch`] - the feed could not be downloaded
/// - [`PollError::Delta`] - an entry has no usable timestamp
pub async fn poll(
    client: &reqwest::Client,
    config: &FetchConfig,
    user: &str,
    url: &str,
    last_reference: i64,
    mode: Mode,
    sink: &dyn EventSink,
) -> Result<DeltaResult, PollError> {
    let span = tracing::debug_span!("poll", user = %user, url = %url);

    async move {
        tracing::debug!("Polling user's update URL");

        let bytes = fetch_feed(client, url, config).await?;
        let snapshot = parse_snapshot(url, &bytes);
        let result = extract_delta(&snapshot, last_reference, mode, sink)?;

        tracing::debug!(
            new = result.messages.len(),
            last_reference = result.last_reference,
            "Poll complete"
        );
        Ok::<_, PollError>(result)
    }
    .instrument(span)
    .await
}
