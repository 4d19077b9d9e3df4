use feed_rs::model::Entry;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

use crate::delta::{BodyField, FeedSnapshot, ParseDiagnostic, RawEntry};

/// Builds a [`FeedSnapshot`] from raw feed bytes.
///
/// Never fails. Bytes that feed-rs cannot turn into a feed produce a snapshot
/// without a title, which the extractor reports as an invalid feed. Bytes that
/// parse but are not well-formed XML produce a normal snapshot carrying a
/// [`ParseDiagnostic`] in `malformed`.
///
/// Entry fields are mapped as follows:
///
/// - `link`: first link href, empty when the entry has none
/// - `updated_at`: `updated`, falling back to `published`
/// - `title`: entry title, empty when absent
/// - body fields: `content` from the content body, `summary` and
///   `description` both from the summary text (RSS `<description>` and Atom
///   `<summary>` are one field in the parsed model). `subtitle` is never set.
pub fn parse_snapshot(url: &str, bytes: &[u8]) -> FeedSnapshot {
    let trimmed = trim_leading_ascii_whitespace(bytes);

    // JSON Feed has no XML to check
    let xml_diagnostic = if trimmed.first() == Some(&b'{') {
        None
    } else {
        check_well_formed(trimmed)
    };

    match feed_rs::parser::parse(trimmed) {
        Ok(feed) => FeedSnapshot {
            url: url.to_owned(),
            title: feed.title.map(|t| t.content),
            malformed: xml_diagnostic,
            entries: feed.entries.into_iter().map(raw_entry).collect(),
        },
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Feed could not be parsed");
            FeedSnapshot {
                url: url.to_owned(),
                title: None,
                malformed: Some(xml_diagnostic.unwrap_or(ParseDiagnostic {
                    message: e.to_string(),
                    line: None,
                })),
                entries: Vec::new(),
            }
        }
    }
}

fn raw_entry(entry: Entry) -> RawEntry {
    let mut body_fields = HashMap::new();
    if let Some(body) = entry.content.and_then(|c| c.body) {
        body_fields.insert(BodyField::Content, body);
    }
    if let Some(summary) = entry.summary.map(|s| s.content) {
        body_fields.insert(BodyField::Description, summary.clone());
        body_fields.insert(BodyField::Summary, summary);
    }

    RawEntry {
        link: entry
            .links
            .into_iter()
            .next()
            .map(|l| l.href)
            .unwrap_or_default(),
        updated_at: entry.updated.or(entry.published),
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        body_fields,
    }
}

/// Scans `bytes` as XML and reports the first well-formedness problem.
///
/// Covers what quick-xml detects while reading (mismatched end tags, broken
/// markup) plus documents that end with elements still open or contain no
/// element at all.
fn check_well_formed(bytes: &[u8]) -> Option<ParseDiagnostic> {
    // SEC-002: quick-xml never expands <!ENTITY> declarations, so scanning
    // untrusted feeds cannot pull in external content.
    let mut reader = Reader::from_reader(bytes);
    let mut depth: usize = 0;
    let mut seen_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                depth += 1;
                seen_root = true;
            }
            Ok(Event::Empty(_)) => seen_root = true,
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Some(ParseDiagnostic {
                    message: e.to_string(),
                    line: Some(line_at(bytes, reader.error_position() as u64)),
                });
            }
            Ok(_) => {}
        }
    }

    if depth > 0 {
        return Some(ParseDiagnostic {
            message: format!("document ended with {} unclosed element(s)", depth),
            line: Some(line_at(bytes, bytes.len() as u64)),
        });
    }
    if !seen_root {
        return Some(ParseDiagnostic {
            message: "document has no root element".to_string(),
            line: None,
        });
    }
    None
}

/// 1-based line number of byte offset `pos`.
fn line_at(bytes: &[u8], pos: u64) -> u64 {
    let end = usize::try_from(pos).map_or(bytes.len(), |p| p.min(bytes.len()));
    bytes[..end].iter().filter(|&&b| b == b'\n').count() as u64 + 1
}

fn trim_leading_ascii_whitespace(raw: &[u8]) -> &[u8] {
    let start = raw
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(raw.len());
    &raw[start..]
}
