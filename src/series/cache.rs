//! File-based series cache at ~/.cpi-compass/series.json.
//!
//! Keyed by series id and year window, case-insensitive. Entries expire after
//! the configured TTL (default 24 hours). An unreadable file is treated as empty.

use super::client::SeriesSource;
use super::types::{series_id, Observation, SeriesError, SeriesPair, YearWindow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

pub const DEFAULT_TTL_HOURS: u64 = 24;

#[derive(Serialize, Deserialize, Clone)]
struct CacheEntry {
    timestamp: i64,
    observations: Vec<Observation>,
}

/// The series cache.
pub struct SeriesCache {
    path: PathBuf,
    ttl_ms: i64,
    entries: HashMap<String, CacheEntry>,
}

impl SeriesCache {
    /// Load cache from the default location (~/.cpi-compass/series.json).
    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load cache from a specific path.
    pub fn load_from(path: PathBuf) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        Self {
            path,
            ttl_ms: ttl_ms(DEFAULT_TTL_HOURS),
            entries,
        }
    }

    pub fn with_ttl_hours(mut self, hours: u64) -> Self {
        self.ttl_ms = ttl_ms(hours);
        self
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cpi-compass")
            .join("series.json")
    }

    fn read_file(path: &Path) -> Option<HashMap<String, CacheEntry>> {
        let data = fs::read_to_string(path).ok()?;
        serde_json::from_str(&data).ok()
    }

    fn key(id: &str, window: YearWindow) -> String {
        format!("{}:{}", id.to_uppercase(), window)
    }

    /// Look up a series. Returns None if missing or expired.
    pub fn get(&self, id: &str, window: YearWindow) -> Option<Vec<Observation>> {
        let entry = self.entries.get(&Self::key(id, window))?;
        let now = chrono::Utc::now().timestamp_millis();
        if now - entry.timestamp > self.ttl_ms {
            return None;
        }
        Some(entry.observations.clone())
    }

    /// Store a series and persist to disk.
    pub fn put(&mut self, id: &str, window: YearWindow, observations: &[Observation]) {
        self.entries.insert(
            Self::key(id, window),
            CacheEntry {
                timestamp: chrono::Utc::now().timestamp_millis(),
                observations: observations.to_vec(),
            },
        );
        self.persist();
    }

    fn persist(&self) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Could not create cache directory {}: {}", parent.display(), e);
            }
        }
        match serde_json::to_string_pretty(&self.entries) {
            Ok(json) => {
                if let Err(e) = fs::write(&self.path, json) {
                    warn!("Could not write series cache {}: {}", self.path.display(), e);
                }
            }
            Err(e) => warn!("Could not serialize series cache: {}", e),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn ttl_ms(hours: u64) -> i64 {
    i64::try_from(hours.saturating_mul(3600 * 1000)).unwrap_or(i64::MAX)
}

/// A `SeriesSource` that answers from the cache when both series are fresh.
pub struct CachedSource<S> {
    inner: S,
    cache: Mutex<SeriesCache>,
    offline: bool,
}

impl<S: SeriesSource> CachedSource<S> {
    pub fn new(inner: S, cache: SeriesCache) -> Self {
        Self {
            inner,
            cache: Mutex::new(cache),
            offline: false,
        }
    }

    /// Offline mode — never call the inner source.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    fn cache(&self) -> MutexGuard<'_, SeriesCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: SeriesSource> SeriesSource for CachedSource<S> {
    fn fetch_series(
        &self,
        code_a: &str,
        code_b: &str,
        window: YearWindow,
    ) -> Result<SeriesPair, SeriesError> {
        let (id_a, id_b) = (series_id(code_a), series_id(code_b));

        {
            let cache = self.cache();
            if let (Some(a), Some(b)) = (cache.get(&id_a, window), cache.get(&id_b, window)) {
                debug!("Cache hit for {} and {} ({})", id_a, id_b, window);
                return Ok(SeriesPair { a, b });
            }
        }

        if self.offline {
            return Err(SeriesError::RemoteUnavailable(format!(
                "offline mode and no cached data for {} / {} ({})",
                id_a, id_b, window
            )));
        }

        let pair = self.inner.fetch_series(code_a, code_b, window)?;

        let mut cache = self.cache();
        cache.put(&id_a, window, &pair.a);
        cache.put(&id_b, window, &pair.b);
        Ok(pair)
    }
}
