// src/ingest/mod.rs
pub mod categorize;
pub mod config;
pub mod dedup;
pub mod fetcher;
pub mod ingestor;
pub mod lang;
pub mod parser;
pub mod scheduler;
pub mod types;

pub use ingestor::{CycleReport, Ingestor};
pub use scheduler::{Scheduler, SchedulerState, SkipReason, TickOutcome};

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use regex::Regex;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("news_cycles_total", "Ingestion cycles that ran.");
        describe_counter!(
            "news_cycles_skipped_total",
            "Ingestion cycles skipped (flag off, flag unreadable, overlap)."
        );
        describe_counter!("news_fetch_errors_total", "Feed fetch failures.");
        describe_counter!("news_items_parsed_total", "Items extracted from feeds.");
        describe_histogram!("news_parse_ms", "Feed parse time in milliseconds.");
        describe_counter!(
            "news_dedup_dropped_total",
            "Items dropped because their title is in the dedup window."
        );
        describe_counter!(
            "news_translate_batches_total",
            "Translation batches by outcome."
        );
        describe_counter!("news_records_inserted_total", "News records persisted.");
        describe_counter!("news_insert_errors_total", "Failed news inserts.");
        describe_counter!("news_notify_sent_total", "Notifications delivered.");
        describe_counter!("news_notify_errors_total", "Notification failures.");
        describe_gauge!(
            "news_cycle_last_run_ts",
            "Unix ts when an ingestion cycle last finished."
        );
    });
}

/// Clean feed text: unwrap escaped CDATA, decode entities, strip tags,
/// collapse whitespace and cap at `max_chars` characters.
pub fn clean_text(s: &str, max_chars: usize) -> String {
    static RE_CDATA: OnceCell<Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();

    // 1) Escaped or doubled CDATA wrappers
    let re_cdata =
        RE_CDATA.get_or_init(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("cdata regex"));
    let mut out = re_cdata.replace_all(s, "$1").to_string();

    // 2) HTML entity decode (feeds often double-escape markup)
    out = html_escape::decode_html_entities(&out).to_string();

    // 3) Strip comments, doctypes and known HTML elements; a bare `<` in prose stays
    let re_tags = RE_TAGS.get_or_init(|| {
        Regex::new(
            r"(?is)<!--.*?-->|<![a-z][^>]*>|</?(?:a|abbr|article|b|blockquote|br|caption|center|code|col|colgroup|dd|del|div|dl|dt|em|figcaption|figure|font|footer|h[1-6]|header|hr|i|iframe|img|ins|li|ol|p|picture|pre|q|s|section|small|source|span|strong|sub|sup|table|tbody|td|tfoot|th|thead|tr|u|ul|video)(?:\s[^>]*)?/?>",
        )
        .expect("tag regex")
    });
    out = re_tags.replace_all(&out, " ").to_string();

    // 4) Collapse whitespace (incl. nbsp)
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"[\s\u{00A0}]+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    truncate_chars(out, max_chars)
}

/// Char-boundary safe truncation.
pub fn truncate_chars(s: String, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        s.chars().take(max_chars).collect()
    } else {
        s
    }
}
