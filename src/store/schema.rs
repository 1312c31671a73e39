pub const SCHEMA: &str = r#"
-- news table (shared with admin tooling; this pipeline only appends)
CREATE TABLE IF NOT EXISTS news (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    source_title TEXT,
    summary TEXT,
    source TEXT NOT NULL,
    url TEXT,
    category TEXT NOT NULL DEFAULT 'market'
        CHECK (category IN ('market', 'policy', 'exchange', 'defi', 'nft', 'other')),
    is_pinned INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    published_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_news_created_at ON news(created_at DESC);

-- settings table (runtime flags, owned by the admin side)
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    description TEXT
);
"#;

/// Columns added after the first release; applied when missing.
pub const NEWS_MIGRATIONS: &[(&str, &str)] = &[(
    "source_title",
    "ALTER TABLE news ADD COLUMN source_title TEXT",
)];
