//! Extracts what is new in an RSS/Atom feed since the last poll.
//!
//! The entry point for callers that already hold a parsed feed is
//! [`delta::extract_delta`]. [`poll::poll`] adds the download and parsing
//! steps for callers that only have a URL.

pub mod config;
pub mod delta;
pub mod feed;
pub mod poll;

pub use config::{Config, ConfigError, FetchConfig};
pub use delta::{extract_delta, mine_links, DeltaError, DeltaResult, FeedSnapshot, Mode};
pub use poll::{poll, PollError};
