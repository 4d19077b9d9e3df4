use super::events::{DeltaEvent, EventSink};
use super::links::mine_links;
use super::types::{
    BodyField, DeepLinks, DeltaError, DeltaResult, FeedSnapshot, Message, Mode, RawEntry,
};

/// Computes the entries of `snapshot` that are newer than `last_reference`.
///
/// # Arguments
///
/// * `snapshot` - Parsed feed
/// * `last_reference` - Watermark in UTC epoch seconds; only entries updated
///   strictly after it are returned
/// * `mode` - [`Mode::DeepLink`] additionally mines entry bodies for links
/// * `sink` - Receives diagnostics; has no effect on the result
///
/// # Returns
///
/// A [`DeltaResult`] whose messages are sorted ascending by timestamp and
/// whose `last_reference` is the newest message timestamp. When the feed is
/// invalid (no title) or nothing is newer than the watermark, the result is
/// empty and echoes `last_reference`.
///
/// # Errors
///
/// [`DeltaError::MalformedTimestamp`] if any entry lacks a usable update
/// time. The whole call fails so that a corrupt entry is never silently
/// skipped.
pub fn extract_delta(
    snapshot: &FeedSnapshot,
    last_reference: i64,
    mode: Mode,
    sink: &dyn EventSink,
) -> Result<DeltaResult, DeltaError> {
    sink.emit(DeltaEvent::Extracting {
        url: snapshot.url.clone(),
        entries: snapshot.entries.len(),
        last_reference,
        mode,
    });

    let Some(feed_title) = snapshot.title.as_deref() else {
        sink.emit(DeltaEvent::InvalidFeed {
            url: snapshot.url.clone(),
        });
        return Ok(DeltaResult::unchanged(last_reference));
    };

    let mut messages = Vec::new();
    for entry in &snapshot.entries {
        let Some(updated_at) = entry.updated_at else {
            sink.emit(DeltaEvent::MalformedTimestamp {
                url: snapshot.url.clone(),
                link: entry.link.clone(),
            });
            return Err(DeltaError::MalformedTimestamp {
                link: entry.link.clone(),
            });
        };

        let timestamp = updated_at.timestamp();
        if timestamp <= last_reference {
            continue;
        }

        let deep_links = match mode {
            Mode::Basic => None,
            Mode::DeepLink => mine_entry(entry),
        };

        messages.push(Message {
            url: entry.link.clone(),
            timestamp,
            description: entry.title.clone(),
            extra: feed_title.to_owned(),
            refer: String::new(),
            deep_links,
        });
    }

    let Some(newest) = messages.iter().map(|m| m.timestamp).max() else {
        match &snapshot.malformed {
            None => sink.emit(DeltaEvent::NoNewContent {
                feed_title: feed_title.to_owned(),
            }),
            Some(diagnostic) => sink.emit(DeltaEvent::MalformedFeed {
                feed_title: feed_title.to_owned(),
                diagnostic: diagnostic.clone(),
            }),
        }
        return Ok(DeltaResult::unchanged(last_reference));
    };

    // Stable: entries sharing a timestamp keep feed order
    messages.sort_by_key(|m| m.timestamp);

    Ok(DeltaResult {
        messages,
        last_reference: newest,
        protected: false,
    })
}

/// Mines every candidate body field present on `entry`.
///
/// Fields are numbered by their rank among the fields present on this entry,
/// not by their position in [`BodyField::CANDIDATES`]. A present field without
/// links keeps its slot. Returns `None` unless at least one field yielded a link.
fn mine_entry(entry: &RawEntry) -> Option<Vec<DeepLinks>> {
    let mined: Vec<DeepLinks> = BodyField::CANDIDATES
        .iter()
        .filter_map(|&field| entry.body_fields.get(&field).map(|text| (field, text)))
        .enumerate()
        .map(|(index, (source, text))| DeepLinks {
            index,
            source,
            links: mine_links(text),
        })
        .collect();

    if mined.iter().all(|d| d.links.is_empty()) {
        None
    } else {
        Some(mined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::events::{CollectingSink, Severity};
    use crate::delta::types::ParseDiagnostic;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn entry(link: &str, updated: i64) -> RawEntry {
        RawEntry {
            link: link.to_string(),
            updated_at: Utc.timestamp_opt(updated, 0).single(),
            title: format!("title of {}", link),
            ..Default::default()
        }
    }

    fn snapshot(entries: Vec<RawEntry>) -> FeedSnapshot {
        FeedSnapshot {
            url: "https://example.com/feed.xml".to_string(),
            title: Some("Top Stories".to_string()),
            malformed: None,
            entries,
        }
    }

    #[test]
    fn test_filters_and_normalizes() {
        let feed = snapshot(vec![entry("/old", 100), entry("/new", 200)]);
        let sink = CollectingSink::new();

        let result = extract_delta(&feed, 150, Mode::Basic, &sink).unwrap();

        assert_eq!(
            result.messages,
            vec![Message {
                url: "/new".to_string(),
                timestamp: 200,
                description: "title of /new".to_string(),
                extra: "Top Stories".to_string(),
                refer: String::new(),
                deep_links: None,
            }]
        );
        assert_eq!(result.last_reference, 200);
        assert!(!result.protected);
    }

    #[test]
    fn test_entry_at_watermark_is_dropped() {
        let feed = snapshot(vec![entry("/edge", 150)]);
        let result = extract_delta(&feed, 150, Mode::Basic, &CollectingSink::new()).unwrap();
        assert!(result.messages.is_empty());
        assert_eq!(result.last_reference, 150);
    }

    #[test]
    fn test_sorted_and_stable() {
        let feed = snapshot(vec![
            entry("/c", 300),
            entry("/a1", 100),
            entry("/b", 200),
            entry("/a2", 100),
        ]);
        let result = extract_delta(&feed, 0, Mode::Basic, &CollectingSink::new()).unwrap();

        let urls: Vec<&str> = result.messages.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(urls, ["/a1", "/a2", "/b", "/c"]);
        assert_eq!(result.last_reference, 300);
    }

    #[test]
    fn test_missing_title_is_invalid() {
        let mut feed = snapshot(vec![entry("/new", 200)]);
        feed.title = None;
        let sink = CollectingSink::new();

        let result = extract_delta(&feed, 42, Mode::Basic, &sink).unwrap();

        assert_eq!(result, DeltaResult::unchanged(42));
        assert_eq!(
            sink.at_least(Severity::Error),
            vec![DeltaEvent::InvalidFeed {
                url: "https://example.com/feed.xml".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_timestamp_fails_call() {
        let mut broken = entry("/broken", 0);
        broken.updated_at = None;
        let feed = snapshot(vec![entry("/fine", 500), broken]);
        let sink = CollectingSink::new();

        let err = extract_delta(&feed, 0, Mode::Basic, &sink).unwrap_err();

        assert_eq!(
            err,
            DeltaError::MalformedTimestamp {
                link: "/broken".to_string()
            }
        );
        assert_eq!(sink.at_least(Severity::Error).len(), 1);
    }

    #[test]
    fn test_empty_well_formed_logs_info() {
        let feed = snapshot(vec![]);
        let sink = CollectingSink::new();

        let result = extract_delta(&feed, 7, Mode::Basic, &sink).unwrap();

        assert_eq!(result, DeltaResult::unchanged(7));
        assert_eq!(
            sink.at_least(Severity::Info),
            vec![DeltaEvent::NoNewContent {
                feed_title: "Top Stories".to_string()
            }]
        );
    }

    #[test]
    fn test_empty_malformed_logs_warning() {
        let mut feed = snapshot(vec![entry("/old", 10)]);
        let diagnostic = ParseDiagnostic {
            message: "mismatched end tag".to_string(),
            line: Some(3),
        };
        feed.malformed = Some(diagnostic.clone());
        let sink = CollectingSink::new();

        let result = extract_delta(&feed, 10, Mode::Basic, &sink).unwrap();

        assert_eq!(result, DeltaResult::unchanged(10));
        assert_eq!(
            sink.at_least(Severity::Info),
            vec![DeltaEvent::MalformedFeed {
                feed_title: "Top Stories".to_string(),
                diagnostic,
            }]
        );
    }

    #[test]
    fn test_malformed_feed_with_new_entries_still_returns_them() {
        let mut feed = snapshot(vec![entry("/new", 20)]);
        feed.malformed = Some(ParseDiagnostic {
            message: "junk after document element".to_string(),
            line: None,
        });
        let result = extract_delta(&feed, 10, Mode::Basic, &CollectingSink::new()).unwrap();
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.last_reference, 20);
    }

    #[test]
    fn test_deep_links_numbered_by_presence() {
        let mut e = entry("/post", 200);
        e.body_fields.insert(
            BodyField::Description,
            r#"<a href="/d">d</a>"#.to_string(),
        );
        e.body_fields.insert(
            BodyField::Summary,
            r#"<a href="/s1">1</a> <a href="/s2">2</a>"#.to_string(),
        );
        let feed = snapshot(vec![e]);

        let result = extract_delta(&feed, 0, Mode::DeepLink, &CollectingSink::new()).unwrap();

        assert_eq!(
            result.messages[0].deep_links,
            Some(vec![
                DeepLinks {
                    index: 0,
                    source: BodyField::Summary,
                    links: vec!["/s1".to_string(), "/s2".to_string()],
                },
                DeepLinks {
                    index: 1,
                    source: BodyField::Description,
                    links: vec!["/d".to_string()],
                },
            ])
        );
    }

    #[test]
    fn test_present_field_without_links_keeps_its_slot() {
        let mut e = entry("/post", 200);
        e.body_fields
            .insert(BodyField::Content, "no links here".to_string());
        e.body_fields
            .insert(BodyField::Subtitle, r#"<a href="/x">x</a>"#.to_string());

        let deep = mine_entry(&e).unwrap();

        assert_eq!(deep.len(), 2);
        assert!(deep[0].links.is_empty());
        assert_eq!(deep[1].label(), "deep_link1");
        assert_eq!(deep[1].source, BodyField::Subtitle);
        for (position, links) in deep.iter().enumerate() {
            assert_eq!(links.index, position);
        }
    }

    #[test]
    fn test_deep_links_absent_when_no_field_has_links() {
        let mut e = entry("/post", 200);
        e.body_fields
            .insert(BodyField::Summary, "plain text, no anchors".to_string());
        let feed = snapshot(vec![e]);

        let result = extract_delta(&feed, 0, Mode::DeepLink, &CollectingSink::new()).unwrap();

        assert_eq!(result.messages[0].deep_links, None);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["messages"][0].get("deepLinks").is_none());
    }

    #[test]
    fn test_deep_link_mode_without_body_fields() {
        let feed = snapshot(vec![entry("/bare", 200)]);
        let result = extract_delta(&feed, 0, Mode::DeepLink, &CollectingSink::new()).unwrap();
        assert_eq!(result.messages[0].deep_links, None);
    }

    #[test]
    fn test_basic_mode_ignores_body_fields() {
        let mut e = entry("/post", 200);
        e.body_fields
            .insert(BodyField::Summary, r#"<a href="/s">s</a>"#.to_string());
        let result =
            extract_delta(&snapshot(vec![e]), 0, Mode::Basic, &CollectingSink::new()).unwrap();
        assert_eq!(result.messages[0].deep_links, None);
    }
}
