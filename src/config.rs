//! Runtime settings.
//!
//! Layering: built-in defaults → optional TOML file → environment → CLI flags
//! (the last step is applied by the binary).
//!
//! ```toml
//! areas_path = "/srv/cpi/cu_area.tsv"
//! census_path = "/srv/cpi/census.csv"
//! api_key = "…"
//! timeout_secs = 5
//! strict = true
//! ```

use crate::area::{self, AreaResolver, MatchPolicy};
use crate::compare::ComparisonCoordinator;
use crate::series::{BlsClient, CachedSource, SeriesCache, BLS_V1_ENDPOINT, BLS_V2_ENDPOINT};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const ENV_API_KEY: &str = "CPI_COMPASS_API_KEY";
pub const ENV_ENDPOINT: &str = "CPI_COMPASS_ENDPOINT";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Area table; the bundled copy is used when unset.
    pub areas_path: Option<PathBuf>,
    /// State → division table; the bundled copy is used when unset.
    pub census_path: Option<PathBuf>,
    /// Overrides the BLS endpoint (v1 without a key, v2 with one).
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub cache_path: Option<PathBuf>,
    pub cache_ttl_hours: u64,
    pub strict: bool,
    pub offline: bool,
    pub host: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            areas_path: None,
            census_path: None,
            endpoint: None,
            api_key: None,
            timeout_secs: 10,
            cache_path: None,
            cache_ttl_hours: crate::series::cache::DEFAULT_TTL_HOURS,
            strict: false,
            offline: false,
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

impl Settings {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(settings)
    }

    /// Apply environment overrides from a lookup function.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.api_key = Some(key.trim().to_string());
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self.endpoint = Some(endpoint.trim().to_string());
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|k| std::env::var(k).ok());
    }

    pub fn endpoint(&self) -> &str {
        match (&self.endpoint, &self.api_key) {
            (Some(e), _) => e.as_str(),
            (None, Some(_)) => BLS_V2_ENDPOINT,
            (None, None) => BLS_V1_ENDPOINT,
        }
    }

    pub fn policy(&self) -> MatchPolicy {
        if self.strict {
            MatchPolicy::Strict
        } else {
            MatchPolicy::LastWins
        }
    }

    /// Load the reference tables and wire up a coordinator.
    /// Any reference-data error here should stop the process.
    pub fn build_coordinator(&self) -> Result<ComparisonCoordinator> {
        let directory = area::load_area_directory(self.areas_path.as_deref())
            .context("Failed to load area table")?;
        let divisions = area::load_state_divisions(self.census_path.as_deref())
            .context("Failed to load census division table")?;
        let resolver = AreaResolver::new(Arc::new(directory), Arc::new(divisions))
            .context("Reference tables are inconsistent")?
            .with_policy(self.policy());

        let client = BlsClient::new(
            self.endpoint(),
            self.api_key.clone(),
            Duration::from_secs(self.timeout_secs),
        );
        let cache = match &self.cache_path {
            Some(p) => SeriesCache::load_from(p.clone()),
            None => SeriesCache::load(),
        }
        .with_ttl_hours(self.cache_ttl_hours);
        let mut source = CachedSource::new(client, cache);
        source.set_offline(self.offline);

        info!(
            "Using {} (timeout {}s{})",
            self.endpoint(),
            self.timeout_secs,
            if self.offline { ", offline" } else { "" }
        );
        Ok(ComparisonCoordinator::new(resolver, Arc::new(source)))
    }
}
