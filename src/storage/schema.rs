//! Schema Manager
//!
//! Two tables live in the database:
//!
//! ```text
//! links                                   analytics
//! ┌──────────────┬─────────────────┐      ┌────────────┬────────────────────┐
//! │ key          │ TEXT PK         │      │ id         │ INTEGER PK AUTOINC │
//! │ value        │ TEXT NOT NULL   │      │ link_slug  │ TEXT NOT NULL      │
//! │ expiration   │ INTEGER NULL    │      │ timestamp  │ INTEGER (now)      │
//! │ metadata     │ TEXT NULL       │      │ user_agent │ TEXT NULL          │
//! │ created_at   │ INTEGER (now)   │      │ ip .. os   │ TEXT NULL          │
//! └──────────────┴─────────────────┘      └────────────┴────────────────────┘
//! ```
//!
//! All statements are `IF NOT EXISTS`, so running them again is a no-op.

use rusqlite::Connection;
use tracing::debug;

/// Link records table.
pub const LINKS_TABLE: &str = "links";

/// Access log table.
pub const ANALYTICS_TABLE: &str = "analytics";

const LINKS_DDL: &str = "
    CREATE TABLE IF NOT EXISTS links (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        expiration INTEGER,
        metadata TEXT,
        created_at INTEGER DEFAULT (strftime('%s', 'now'))
    );

    CREATE INDEX IF NOT EXISTS idx_expiration ON links(expiration);
    CREATE INDEX IF NOT EXISTS idx_created_at ON links(created_at);
";

const ANALYTICS_DDL: &str = "
    CREATE TABLE IF NOT EXISTS analytics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        link_slug TEXT NOT NULL,
        timestamp INTEGER DEFAULT (strftime('%s', 'now')),
        user_agent TEXT,
        ip TEXT,
        referer TEXT,
        country TEXT,
        city TEXT,
        device TEXT,
        browser TEXT,
        os TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_link_slug ON analytics(link_slug);
    CREATE INDEX IF NOT EXISTS idx_timestamp ON analytics(timestamp);
";

/// Creates both tables and their indexes if they are missing.
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!("BEGIN;{LINKS_DDL}{ANALYTICS_DDL}COMMIT;"))?;
    debug!("Schema ensured for tables {} and {}", LINKS_TABLE, ANALYTICS_TABLE);
    Ok(())
}
