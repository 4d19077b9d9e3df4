//! Diagnostics emitted while extracting a delta.
//!
//! The extractor never logs directly. It reports [`DeltaEvent`]s to an
//! [`EventSink`] supplied by the caller, which keeps extraction a pure
//! function of its inputs. [`TracingSink`] is the production sink and forwards
//! each event to `tracing` at the event's [`Severity`].

use std::sync::{Mutex, PoisonError};

use super::types::{Mode, ParseDiagnostic};

/// Log level of a [`DeltaEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Something worth reporting about one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaEvent {
    /// Per-call trace.
    Extracting {
        url: String,
        entries: usize,
        last_reference: i64,
        mode: Mode,
    },
    /// The source has no feed title, so it is not treated as RSS/Atom.
    InvalidFeed { url: String },
    /// An entry carried no usable update time; the call fails.
    MalformedTimestamp { url: String, link: String },
    /// Nothing newer than the watermark in a well-formed feed.
    NoNewContent { feed_title: String },
    /// Nothing newer than the watermark, and the source was malformed.
    MalformedFeed {
        feed_title: String,
        diagnostic: ParseDiagnostic,
    },
}

impl DeltaEvent {
    pub fn severity(&self) -> Severity {
        match self {
            DeltaEvent::Extracting { .. } => Severity::Debug,
            DeltaEvent::NoNewContent { .. } => Severity::Info,
            DeltaEvent::MalformedFeed { .. } => Severity::Warning,
            DeltaEvent::InvalidFeed { .. } | DeltaEvent::MalformedTimestamp { .. } => {
                Severity::Error
            }
        }
    }
}

/// Receiver for extraction diagnostics.
///
/// Implementations must not panic; emission is a side channel and has no
/// influence on the extraction result.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DeltaEvent);
}

/// Forwards events to `tracing` with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: DeltaEvent) {
        match event {
            DeltaEvent::Extracting {
                url,
                entries,
                last_reference,
                mode,
            } => {
                tracing::debug!(
                    url = %url,
                    entries = entries,
                    last_reference = last_reference,
                    mode = ?mode,
                    "Extracting feed delta"
                );
            }
            DeltaEvent::InvalidFeed { url } => {
                tracing::error!(url = %url, "URL does not seem to be a valid RSS feed");
            }
            DeltaEvent::MalformedTimestamp { url, link } => {
                tracing::error!(
                    url = %url,
                    link = %link,
                    "Entry has a missing or unparsable update timestamp"
                );
            }
            DeltaEvent::NoNewContent { feed_title } => {
                tracing::info!(feed = %feed_title, "Feed has nothing new");
            }
            DeltaEvent::MalformedFeed {
                feed_title,
                diagnostic,
            } => {
                tracing::warn!(
                    feed = %feed_title,
                    error = %diagnostic.message,
                    line = ?diagnostic.line,
                    "Malformed data may have prevented a proper update"
                );
            }
        }
    }
}

/// Keeps every event in memory, in emission order.
///
/// Useful for callers that report diagnostics per poll instead of logging
/// them, and for tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<DeltaEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the collected events, leaving the sink empty.
    pub fn take(&self) -> Vec<DeltaEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *events)
    }

    /// Events at or above `severity`.
    pub fn at_least(&self, severity: Severity) -> Vec<DeltaEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.severity() >= severity)
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: DeltaEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        let invalid = DeltaEvent::InvalidFeed { url: "u".into() };
        let empty = DeltaEvent::NoNewContent {
            feed_title: "t".into(),
        };
        let bozo = DeltaEvent::MalformedFeed {
            feed_title: "t".into(),
            diagnostic: ParseDiagnostic {
                message: "m".into(),
                line: None,
            },
        };
        assert_eq!(invalid.severity(), Severity::Error);
        assert_eq!(empty.severity(), Severity::Info);
        assert_eq!(bozo.severity(), Severity::Warning);
    }

    #[test]
    fn test_collecting_sink_filters_and_drains() {
        let sink = CollectingSink::new();
        sink.emit(DeltaEvent::Extracting {
            url: "u".into(),
            entries: 0,
            last_reference: 0,
            mode: Mode::Basic,
        });
        sink.emit(DeltaEvent::InvalidFeed { url: "u".into() });

        assert_eq!(sink.at_least(Severity::Warning).len(), 1);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.take().is_empty());
    }
}
