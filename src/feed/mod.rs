//! Feed retrieval and parsing.
//!
//! - [`fetcher`] - HTTP download with timeout, size limit and retry
//! - [`parser`] - Turns feed bytes into a [`FeedSnapshot`](crate::delta::FeedSnapshot)
//!   using the `feed-rs` crate, with a `quick-xml` well-formedness check
//!
//! # Example
//!
//! ```ignore
//! use feedelta::feed::{fetch_feed, parse_snapshot};
//!
//! let bytes = fetch_feed(&client, url, &config.fetch).await?;
//! let snapshot = parse_snapshot(url, &bytes);
//! ```

mod fetcher;
mod parser;

pub use fetcher::{fetch_feed, FetchError};
pub use parser::parse_snapshot;
