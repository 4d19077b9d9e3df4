use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Failures that abort a delta extraction.
///
/// Invalid feeds and empty deltas are not errors: they come back as an empty
/// [`DeltaResult`] echoing the caller's watermark.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeltaError {
    /// An entry had no usable update time, so it cannot be placed
    /// relative to the watermark.
    #[error("Entry {link:?} has a missing or unparsable update timestamp")]
    MalformedTimestamp { link: String },
}

// ============================================================================
// Input Types
// ============================================================================

/// Body fields that may carry marked-up text worth mining for links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyField {
    Content,
    Summary,
    Subtitle,
    Description,
}

impl BodyField {
    /// Candidate fields in mining order. Deep-link numbering depends on this
    /// order, so it must not be derived from a map.
    pub const CANDIDATES: [BodyField; 4] = [
        BodyField::Content,
        BodyField::Summary,
        BodyField::Subtitle,
        BodyField::Description,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BodyField::Content => "content",
            BodyField::Summary => "summary",
            BodyField::Subtitle => "subtitle",
            BodyField::Description => "description",
        }
    }
}

impl fmt::Display for BodyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a feed source was not well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    pub message: String,
    /// 1-based line of the failure, when the parser could locate it
    pub line: Option<u64>,
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} on line {}", self.message, line),
            None => f.write_str(&self.message),
        }
    }
}

/// One feed item as handed over by the parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub link: String,
    /// `None` when the feed had no update time or it could not be parsed
    pub updated_at: Option<DateTime<Utc>>,
    pub title: String,
    /// Raw markup keyed by field. A missing key means the field is absent.
    pub body_fields: HashMap<BodyField, String>,
}

/// A parsed feed: feed-level metadata plus entries in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    /// Source URL, only used for diagnostics
    pub url: String,
    /// Absent title means the source is not a conformant RSS/Atom feed
    pub title: Option<String>,
    /// Set when the source was not well-formed (the "bozo" condition)
    pub malformed: Option<ParseDiagnostic>,
    pub entries: Vec<RawEntry>,
}

impl FeedSnapshot {
    pub fn is_malformed(&self) -> bool {
        self.malformed.is_some()
    }
}

/// Whether body fields are mined for links.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    Basic,
    DeepLink,
}

// ============================================================================
// Output Types
// ============================================================================

/// Links mined from one body field of an entry.
///
/// `index` always equals this value's position in [`Message::deep_links`];
/// the extractor assigns both from the same enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeepLinks {
    /// Rank of the field among the candidate fields present on this entry,
    /// which is also its position in the enclosing vector
    pub index: usize,
    pub source: BodyField,
    pub links: Vec<String>,
}

impl DeepLinks {
    /// Positional label, e.g. `deep_link0`.
    pub fn label(&self) -> String {
        format!("deep_link{}", self.index)
    }
}

/// A normalized new entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub url: String,
    /// UTC epoch seconds
    pub timestamp: i64,
    /// Entry title
    pub description: String,
    /// Feed title
    pub extra: String,
    /// Reserved, always empty
    pub refer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_links: Option<Vec<DeepLinks>>,
}

/// Outcome of one extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaResult {
    /// Ascending by timestamp
    pub messages: Vec<Message>,
    pub last_reference: i64,
    /// Reserved, always false
    pub protected: bool,
}

impl DeltaResult {
    /// An empty delta that hands the caller's watermark back unchanged.
    pub fn unchanged(last_reference: i64) -> Self {
        Self {
            messages: Vec::new(),
            last_reference,
            protected: false,
        }
    }
}
