//! Feed-delta extraction.
//!
//! Given a parsed [`FeedSnapshot`] and the watermark of the previous poll,
//! [`extract_delta`] returns the entries updated since then as normalized
//! [`Message`]s, oldest first, together with the new watermark.
//!
//! - [`extractor`] - validation, filtering, sorting and watermark computation
//! - [`links`] - hyperlink extraction from entry body markup
//! - [`events`] - the diagnostics port the extractor reports through
//!
//! Everything here is synchronous and free of I/O; one extraction never
//! observes another, so polls for many feeds can run side by side.
//!
//! # Example
//!
//! ```
//! use feedelta::delta::{extract_delta, FeedSnapshot, Mode, TracingSink};
//!
//! let snapshot = FeedSnapshot {
//!     title: Some("Top Stories".to_string()),
//!     ..Default::default()
//! };
//! let result = extract_delta(&snapshot, 1_700_000_000, Mode::Basic, &TracingSink).unwrap();
//! assert!(result.messages.is_empty());
//! assert_eq!(result.last_reference, 1_700_000_000);
//! ```

mod events;
mod extractor;
mod links;
mod types;

pub use events::{CollectingSink, DeltaEvent, EventSink, Severity, TracingSink};
pub use extractor::extract_delta;
pub use links::mine_links;
pub use types::{
    BodyField, DeepLinks, DeltaError, DeltaResult, FeedSnapshot, Message, Mode, ParseDiagnostic,
    RawEntry,
};
