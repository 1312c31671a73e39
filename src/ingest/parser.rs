// src/ingest/parser.rs
//! Tolerant RSS/Atom item extraction. Malformed documents yield whatever
//! items were completed before the reader gave up.

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::clean_text;
use crate::ingest::types::{RawItem, SUMMARY_MAX_CHARS, TITLE_MAX_CHARS, URL_MAX_CHARS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Summary,
    Content,
    Date,
}

impl Field {
    fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" | b"summary" => Some(Field::Summary),
            b"encoded" | b"content" => Some(Field::Content),
            b"pubDate" | b"published" | b"updated" | b"date" => Some(Field::Date),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Pending {
    title: String,
    link: String,
    summary: String,
    content: String,
    date: String,
    closed: Vec<Field>,
}

impl Pending {
    fn push(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Summary => &mut self.summary,
            Field::Content => &mut self.content,
            Field::Date => &mut self.date,
        };
        slot.push_str(text);
    }

    fn finish(self, now: DateTime<Utc>) -> Option<RawItem> {
        let title = clean_text(&self.title, TITLE_MAX_CHARS);
        if title.is_empty() {
            return None;
        }
        let summary_src = if self.summary.trim().is_empty() {
            &self.content
        } else {
            &self.summary
        };
        let url: String = self.link.trim().chars().take(URL_MAX_CHARS).collect();
        Some(RawItem {
            title,
            summary: clean_text(summary_src, SUMMARY_MAX_CHARS),
            url,
            published_at: parse_feed_date(&self.date).unwrap_or(now),
        })
    }
}

fn is_item(local: &[u8]) -> bool {
    local == b"item" || local == b"entry"
}

/// Atom `<link href=".."/>`: take `href` when rel is absent or "alternate".
fn atom_href(e: &BytesStart) -> Option<String> {
    let mut href = None;
    let mut rel_ok = true;
    for attr in e.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"href" => {
                href = attr
                    .unescape_value()
                    .ok()
                    .map(|v| v.into_owned())
                    .or_else(|| Some(String::from_utf8_lossy(&attr.value).into_owned()));
            }
            b"rel" => rel_ok = attr.value.as_ref() == b"alternate",
            _ => {}
        }
    }
    href.filter(|_| rel_ok)
}

/// Parse RFC 2822 (RSS) or RFC 3339 (Atom, dc:date) timestamps.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let unix = OffsetDateTime::parse(raw, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(raw, &Rfc3339))
        .map(|dt| dt.unix_timestamp())
        .ok()
        // `time` rejects obsolete zone names like "GMT"; chrono accepts them.
        .or_else(|| {
            DateTime::parse_from_rfc2822(raw)
                .ok()
                .map(|dt| dt.timestamp())
        })?;
    DateTime::from_timestamp(unix, 0)
}

/// Raw document → items in feed order, stamped with `now` when undated.
pub fn parse_feed(raw: &[u8], now: DateTime<Utc>) -> Vec<RawItem> {
    let t0 = std::time::Instant::now();
    let doc = String::from_utf8_lossy(raw);
    let mut reader = Reader::from_str(&doc);
    reader.config_mut().check_end_names = false;

    let mut items = Vec::new();
    let mut current: Option<Pending> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = e.local_name();
                if is_item(local.as_ref()) {
                    current = Some(Pending::default());
                    field = None;
                } else if let (Some(item), None) = (current.as_mut(), field) {
                    // First occurrence wins (e.g. ignore <media:title> after <title>).
                    field = Field::from_local_name(local.as_ref())
                        .filter(|f| !item.closed.contains(f));
                    if field == Some(Field::Link) {
                        if let Some(href) = atom_href(&e) {
                            if item.link.is_empty() {
                                item.link = href;
                            }
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(item) = current.as_mut() {
                    if field.is_none() && e.local_name().as_ref() == b"link" && item.link.is_empty()
                    {
                        if let Some(href) = atom_href(&e) {
                            item.link = href;
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                let local = e.local_name();
                if is_item(local.as_ref()) {
                    if let Some(item) = current.take().and_then(|p| p.finish(now)) {
                        items.push(item);
                    }
                    field = None;
                } else if field.is_some() && Field::from_local_name(local.as_ref()) == field {
                    if let (Some(item), Some(f)) = (current.as_mut(), field) {
                        item.closed.push(f);
                    }
                    field = None;
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(item), Some(f)) = (current.as_mut(), field) {
                    // Unknown HTML entities (&nbsp;) fail strict unescape; clean_text decodes them.
                    let text = t
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    item.push(f, &text);
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(item), Some(f)) = (current.as_mut(), field) {
                    item.push(f, &String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!(
                    target: "ingest",
                    error = %e,
                    position = reader.buffer_position(),
                    kept = items.len(),
                    "feed xml error, keeping items parsed so far"
                );
                break;
            }
            _ => {}
        }
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("news_parse_ms").record(ms);
    counter!("news_items_parsed_total").increment(items.len() as u64);
    items
}
