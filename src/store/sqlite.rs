use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use super::schema::{NEWS_MIGRATIONS, SCHEMA};
use super::{NewsStore, SettingsStore};
use crate::ingest::types::{Category, NewNewsRecord, NewsRecord};

/// SQLite-backed news + settings store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub async fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating db dir {}", parent.display()))?;
            }
        }
        let conn = Connection::open(db_path)
            .await
            .with_context(|| format!("opening sqlite db {db_path}"))?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .context("opening in-memory sqlite db")?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            // Tables created by older deployments or admin tooling.
            let existing: Vec<String> = conn
                .prepare("SELECT name FROM pragma_table_info('news')")?
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<_, _>>()?;
            for (column, ddl) in NEWS_MIGRATIONS {
                if !existing.iter().any(|c| c == column) {
                    conn.execute_batch(ddl)?;
                }
            }
            Ok(())
        })
        .await
        .context("applying schema")?;
        Ok(Self { conn })
    }

    /// Admin-side write; the pipeline itself never calls this.
    pub async fn put_setting(
        &self,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        let description = description.map(str::to_string);
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO settings (key, value, description) VALUES (?1, ?2, ?3)
                       ON CONFLICT(key) DO UPDATE SET
                           value = excluded.value,
                           description = COALESCE(excluded.description, settings.description)"#,
                    params![key, value, description],
                )?;
                Ok(())
            })
            .await
            .context("writing setting")?;
        Ok(())
    }

    pub async fn count(&self) -> Result<usize> {
        let n = self
            .conn
            .call(|conn| {
                let n: i64 = conn.query_row("SELECT COUNT(*) FROM news", [], |row| row.get(0))?;
                Ok(n)
            })
            .await
            .context("counting news")?;
        Ok(n.max(0) as usize)
    }

    /// Newest records first.
    pub async fn latest(&self, limit: usize) -> Result<Vec<NewsRecord>> {
        let limit = limit as i64;
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, title, summary, source, url, category, is_pinned, is_active,
                              published_at, created_at, source_title
                       FROM news
                       ORDER BY julianday(created_at) DESC, id DESC
                       LIMIT ?1"#,
                )?;
                let rows = stmt
                    .query_map(params![limit], news_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .context("reading latest news")?;
        Ok(records)
    }
}

#[async_trait]
impl NewsStore for SqliteStore {
    async fn recent_titles(&self, limit: usize) -> Result<Vec<String>> {
        let limit = limit as i64;
        let titles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT title, source_title FROM news
                       ORDER BY julianday(created_at) DESC, id DESC
                       LIMIT ?1"#,
                )?;
                let rows = stmt
                    .query_map(params![limit], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows
                    .into_iter()
                    .flat_map(|(title, original)| std::iter::once(title).chain(original))
                    .collect::<Vec<_>>())
            })
            .await
            .context("reading recent titles")?;
        Ok(titles)
    }

    async fn insert(&self, record: NewNewsRecord) -> Result<NewsRecord> {
        let created_at = Utc::now();
        let row = record.clone();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO news (title, summary, source, url, category, published_at,
                                         created_at, source_title)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                    params![
                        row.title,
                        row.summary,
                        row.source,
                        row.url,
                        row.category.as_str(),
                        format_ts(&row.published_at),
                        format_ts(&created_at),
                        row.source_title,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .context("inserting news record")?;

        Ok(NewsRecord {
            id,
            title: record.title,
            source_title: record.source_title,
            summary: record.summary,
            source: record.source,
            url: record.url,
            category: record.category,
            is_pinned: false,
            is_active: true,
            published_at: record.published_at,
            created_at,
        })
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        let value = self
            .conn
            .call(move |conn| {
                let value = conn
                    .query_row(
                        "SELECT value FROM settings WHERE key = ?1",
                        params![key],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await
            .context("reading setting")?;
        Ok(value)
    }
}

// Millisecond RFC 3339 in UTC. Reads order through `julianday` so rows in
// SQLite's `YYYY-MM-DD HH:MM:SS` form interleave correctly.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Rows written by other tools may use SQLite's datetime('now') format.
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn news_from_row(row: &Row) -> rusqlite::Result<NewsRecord> {
    let published: String = row.get(8)?;
    let created: String = row.get(9)?;
    let created_at = parse_ts(&created).unwrap_or_else(Utc::now);
    Ok(NewsRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        source_title: row.get(10)?,
        summary: row.get(2)?,
        source: row.get(3)?,
        url: row.get(4)?,
        category: Category::parse(&row.get::<_, String>(5)?),
        is_pinned: row.get::<_, i64>(6)? != 0,
        is_active: row.get::<_, i64>(7)? != 0,
        published_at: parse_ts(&published).unwrap_or(created_at),
        created_at,
    })
}
