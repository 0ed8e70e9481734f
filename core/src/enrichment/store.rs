//! On-disk persistence for the organization cache.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::Affiliation;
use crate::error::CacheError;

const CACHE_FILE_NAME: &str = "organizations.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAffiliation {
    pub affiliation: Affiliation,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    entries: BTreeMap<String, CachedAffiliation>,
}

/// `<cache dir>/sc-log-monitor/organizations.json`, when a cache dir exists.
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("sc-log-monitor").join(CACHE_FILE_NAME))
}

/// Read persisted entries. A missing file is an empty cache.
pub fn load_cache_file(path: &Path) -> Result<BTreeMap<String, CachedAffiliation>, CacheError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };
    let file: CacheFile = serde_json::from_str(&contents)?;
    Ok(file.entries)
}

/// Write entries, replacing the previous file.
pub fn save_cache_file(
    path: &Path,
    entries: BTreeMap<String, CachedAffiliation>,
) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let count = entries.len();
    let json = serde_json::to_string_pretty(&CacheFile { entries })?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;

    info!(path = %path.display(), entries = count, "Saved organization cache");
    Ok(())
}
