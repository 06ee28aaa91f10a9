//! Address book configuration.
//!
//! Loaded from `<config_dir>/gcontact/config.json` when present, then
//! overridden by environment variables, then validated.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ContactError, Result};
use crate::feed::FeedFormat;
use crate::fingerprint::{default_hash_keys, HashKey, IndexSettings, DEFAULT_BITS};
use crate::normalize::{default_home_domains, HomeDomains};
use crate::reconcile::MergePolicy;

// Environment variable names
const ENV_HOME_DOMAINS: &str = "GCONTACT_HOME_DOMAINS";
const ENV_HASH_KEYS: &str = "GCONTACT_HASH_KEYS";
const ENV_MERGE_POLICY: &str = "GCONTACT_MERGE_POLICY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    /// Fields whose primary values join the title in fingerprint text.
    pub hash_keys: Vec<HashKey>,
    pub bits: u32,
    pub bands: u32,
    pub max_distance: u32,
    pub home_domains: HomeDomains,
    pub merge_policy: MergePolicy,
    pub format: FeedFormat,
}

impl Default for BookConfig {
    fn default() -> Self {
        let index = IndexSettings::default();
        Self {
            hash_keys: default_hash_keys(),
            bits: DEFAULT_BITS,
            bands: index.bands,
            max_distance: index.max_distance,
            home_domains: default_home_domains(),
            merge_policy: MergePolicy::default(),
            format: FeedFormat::default(),
        }
    }
}

impl BookConfig {
    /// Load from the default location plus environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            ContactError::InvalidConfiguration(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ContactError::InvalidConfiguration("could not find config directory".into())
        })?;
        Ok(config_dir.join("gcontact").join("config.json"))
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(domains) = lookup(ENV_HOME_DOMAINS) {
            self.home_domains = domains
                .split(',')
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect();
        }

        if let Some(keys) = lookup(ENV_HASH_KEYS) {
            self.hash_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::parse)
                .collect::<Result<Vec<HashKey>>>()?;
        }

        if let Some(policy) = lookup(ENV_MERGE_POLICY) {
            self.merge_policy = policy.parse()?;
        }

        Ok(())
    }

    pub fn index_settings(&self) -> IndexSettings {
        IndexSettings {
            bits: self.bits,
            bands: self.bands,
            max_distance: self.max_distance,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.index_settings().validate()
    }

    /// Same config with a different set of hash keys.
    pub fn with_hash_keys(mut self, hash_keys: Vec<HashKey>) -> Self {
        self.hash_keys = hash_keys;
        self
    }

    pub fn with_merge_policy(mut self, merge_policy: MergePolicy) -> Self {
        self.merge_policy = merge_policy;
        self
    }
}
