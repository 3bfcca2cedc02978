use crate::constants::{
    DEFAULT_CONFIG_PATH, DEFAULT_DATABASE_PATH, DEFAULT_FEED_BASE_URL, DEFAULT_MIRROR_DIR,
    DEFAULT_PROCESSED_DIR, ENV_API_KEY, ENV_DATABASE_PATH, ENV_FEED_BASE_URL, MAX_IMPACT_LEVEL,
    MAX_ONGOING_HORIZON_HOURS, MIN_IMPACT_LEVEL,
};
use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub feed: FeedConfig,
    pub mirror: MirrorConfig,
    pub cleaning: CleaningConfig,
    pub severity: SeverityConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    /// Where cleaned batches are snapshotted as CSV; unset disables it.
    pub processed_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Provisional end time for ongoing disruptions, in hours after the fetch.
    pub ongoing_horizon_hours: i64,
    /// Titles shorter than this (after trimming) are treated as noise.
    pub min_title_len: usize,
}

/// Policy for records whose type matches none of the severity rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeverityConfig {
    pub unknown_type_level: i32,
    pub reject_unknown_types: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            feed: FeedConfig::default(),
            mirror: MirrorConfig::default(),
            cleaning: CleaningConfig::default(),
            severity: SeverityConfig::default(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 10,
            max_retries: 3,
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(DEFAULT_MIRROR_DIR),
            processed_dir: Some(PathBuf::from(DEFAULT_PROCESSED_DIR)),
        }
    }
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            ongoing_horizon_hours: 2,
            min_title_len: 5,
        }
    }
}

impl Default for SeverityConfig {
    fn default() -> Self {
        Self {
            unknown_type_level: 2,
            reject_unknown_types: false,
        }
    }
}

impl Config {
    /// Load configuration from `path` (or `config.toml` when present), then
    /// apply `.env` and process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(p) => {
                let content = fs::read_to_string(p).map_err(|e| {
                    PipelineError::Config(format!(
                        "Failed to read config file '{}': {}",
                        p.display(),
                        e
                    ))
                })?;
                Self::from_toml_str(&content)?
            }
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                let content = fs::read_to_string(DEFAULT_CONFIG_PATH)?;
                Self::from_toml_str(&content)?
            }
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Overlay values from an environment-like lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY).filter(|k| !k.trim().is_empty()) {
            self.feed.api_key = Some(key);
        }
        if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|p| !p.trim().is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(url) = lookup(ENV_FEED_BASE_URL).filter(|u| !u.trim().is_empty()) {
            self.feed.base_url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let level = self.severity.unknown_type_level;
        if level < i32::from(MIN_IMPACT_LEVEL) || level > i32::from(MAX_IMPACT_LEVEL) {
            return Err(PipelineError::Config(format!(
                "severity.unknown_type_level must be between {} and {}, got {}",
                MIN_IMPACT_LEVEL, MAX_IMPACT_LEVEL, level
            )));
        }
        if self.feed.max_retries == 0 {
            return Err(PipelineError::Config(
                "feed.max_retries must be at least 1".to_string(),
            ));
        }
        if self.feed.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "feed.timeout_secs must be at least 1".to_string(),
            ));
        }
        let horizon = self.cleaning.ongoing_horizon_hours;
        if !(0..=MAX_ONGOING_HORIZON_HOURS).contains(&horizon) {
            return Err(PipelineError::Config(format!(
                "cleaning.ongoing_horizon_hours must be between 0 and {}, got {}",
                MAX_ONGOING_HORIZON_HOURS, horizon
            )));
        }
        Ok(())
    }

    /// API key, required only when fetching from the live feed.
    pub fn require_api_key(&self) -> Result<&str> {
        self.feed.api_key.as_deref().ok_or_else(|| {
            PipelineError::Config(format!("{} is not set (config or .env)", ENV_API_KEY))
        })
    }
}
