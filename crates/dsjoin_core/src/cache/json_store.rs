//! JSON file cache store.
//!
//! # Invariants
//! - A missing file means "never saved".
//! - `save` writes a sibling temp file and renames it over the target, so a
//!   crash never leaves a half-written cache behind.

use crate::cache::{CacheResult, CacheStore};
use crate::los::CacheSnapshot;
use log::info;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct JsonFileCacheStore {
    path: PathBuf,
}

impl JsonFileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CacheStore for JsonFileCacheStore {
    fn load(&self) -> CacheResult<Option<CacheSnapshot>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&mut self, snapshot: &CacheSnapshot) -> CacheResult<()> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path();
        let raw = serde_json::to_string_pretty(snapshot)?;
        fs::write(&temp_path, raw)?;
        fs::rename(&temp_path, &self.path)?;

        info!(
            "event=cache_save module=cache status=ok store=json records={} columns={}",
            snapshot.records.len(),
            snapshot.schema.len()
        );
        Ok(())
    }
}
