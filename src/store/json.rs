//! File-backed pattern store: one JSON record per site identifier.

use super::PatternStore;
use crate::pattern::SitePattern;
use anyhow::{Context, Result};
use dashmap::DashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Pattern store that keeps one pretty-printed JSON file per site under a
/// directory.
///
/// `save` writes to a temp file and renames it into place, so a crashed or
/// raced writer never leaves a partial record behind. Saves for the same
/// site serialize on a per-key mutex; different sites do not contend.
pub struct JsonPatternStore {
    dir: PathBuf,
    save_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl JsonPatternStore {
    /// Open the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating pattern store dir: {}", dir.display()))?;
        Ok(Self {
            dir,
            save_locks: DashMap::new(),
        })
    }

    fn record_path(&self, site_id: &str) -> PathBuf {
        let name: String = site_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    fn save_lock(&self, site_id: &str) -> Arc<Mutex<()>> {
        self.save_locks
            .entry(site_id.to_string())
            .or_default()
            .clone()
    }
}

impl PatternStore for JsonPatternStore {
    fn load(&self, site_id: &str) -> Option<SitePattern> {
        let path = self.record_path(site_id);
        let data = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&data) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!("pattern record {} is corrupt: {}", path.display(), e);
                None
            }
        }
    }

    fn save(&self, site_id: &str, pattern: &SitePattern) -> Result<()> {
        let lock = self.save_lock(site_id);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let path = self.record_path(site_id);
        let data = serde_json::to_string_pretty(pattern).context("serializing site pattern")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data).with_context(|| format!("writing pattern record: {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("replacing pattern record: {}", path.display()))?;
        Ok(())
    }

    fn exists(&self, site_id: &str) -> bool {
        self.record_path(site_id).exists()
    }
}
