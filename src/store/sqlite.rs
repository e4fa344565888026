//! SQLite-backed pattern store.

use super::PatternStore;
use crate::pattern::SitePattern;
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Pattern store backed by a single SQLite table keyed by site identifier.
///
/// The connection mutex serializes all writes, which subsumes the per-site
/// ordering requirement for `save`.
pub struct SqlitePatternStore {
    conn: Mutex<Connection>,
}

impl SqlitePatternStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("opening pattern db: {}", path.display()))?;
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory pattern db")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS site_patterns (
                site_id TEXT PRIMARY KEY,
                record TEXT NOT NULL,
                learned_at TEXT NOT NULL
            );",
        )
        .context("creating site_patterns table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PatternStore for SqlitePatternStore {
    fn load(&self, site_id: &str) -> Option<SitePattern> {
        let conn = self.conn();
        let record: String = conn
            .query_row(
                "SELECT record FROM site_patterns WHERE site_id = ?1",
                [site_id],
                |row| row.get(0),
            )
            .optional()
            .unwrap_or_else(|e| {
                warn!("pattern row for {} unreadable: {}", site_id, e);
                None
            })?;
        match serde_json::from_str(&record) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!("pattern row for {} is corrupt: {}", site_id, e);
                None
            }
        }
    }

    fn save(&self, site_id: &str, pattern: &SitePattern) -> Result<()> {
        let record = serde_json::to_string(pattern).context("serializing site pattern")?;
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO site_patterns (site_id, record, learned_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![site_id, record, pattern.learned_at.to_rfc3339()],
        )
        .context("writing pattern row")?;
        Ok(())
    }

    fn exists(&self, site_id: &str) -> bool {
        let conn = self.conn();
        conn.query_row(
            "SELECT 1 FROM site_patterns WHERE site_id = ?1",
            [site_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|row| row.is_some())
        .unwrap_or(false)
    }
}
