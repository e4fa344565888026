//! Learned-pattern persistence.
//!
//! The pipeline only needs three operations, so the backing medium stays a
//! collaborator detail: an in-memory map for tests and embedding callers, a
//! JSON-file-per-site directory, or a SQLite database. All backends share
//! one contract: `load` on a missing *or corrupt* record answers `None`, so
//! a storage fault degrades to fresh learning instead of failing the page.

mod json;
mod sqlite;

pub use json::JsonPatternStore;
pub use sqlite::SqlitePatternStore;

use crate::pattern::SitePattern;
use anyhow::Result;
use dashmap::DashMap;

/// Keyed store of learned site patterns.
pub trait PatternStore: Send + Sync {
    /// Fetch the pattern for a site. Missing and corrupt records both read
    /// as `None`.
    fn load(&self, site_id: &str) -> Option<SitePattern>;

    /// Persist a pattern, replacing any existing record wholesale. Saves for
    /// the same site key must not interleave; different keys are
    /// independent.
    fn save(&self, site_id: &str, pattern: &SitePattern) -> Result<()>;

    fn exists(&self, site_id: &str) -> bool;
}

/// In-memory pattern store.
#[derive(Default)]
pub struct MemoryPatternStore {
    patterns: DashMap<String, SitePattern>,
}

impl MemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PatternStore for MemoryPatternStore {
    fn load(&self, site_id: &str) -> Option<SitePattern> {
        self.patterns.get(site_id).map(|entry| entry.value().clone())
    }

    fn save(&self, site_id: &str, pattern: &SitePattern) -> Result<()> {
        self.patterns.insert(site_id.to_string(), pattern.clone());
        Ok(())
    }

    fn exists(&self, site_id: &str) -> bool {
        self.patterns.contains_key(site_id)
    }
}
