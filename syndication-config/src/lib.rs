//! # Syndication Config
//!
//! Configuration for the syndication consent and embed-token service.
//!
//! A [`SyndicationConfig`] can be built by hand, through
//! [`SyndicationConfigBuilder`], or loaded from a JSON file, a TOML file
//! (with the `toml` feature) or environment variables.
//!
//! ```
//! use syndication_config::SyndicationConfig;
//!
//! let config = SyndicationConfig::builder()
//!     .default_expiry_days(14)
//!     .max_expiry_days(90)
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.default_expiry_days, 14);
//! assert_eq!(config.storage_timeout_ms, 2_000);
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Upper bound accepted for `max_expiry_days`. Tokens never outlive a year.
pub const MAX_ALLOWED_EXPIRY_DAYS: u32 = 365;

/// Configuration for issuing and validating embed tokens
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyndicationConfig {
    /// Token lifetime used when an issue request does not name one
    #[serde(default = "default_expiry_days")]
    pub default_expiry_days: u32,
    /// Longest lifetime an issue request may ask for
    #[serde(default = "default_max_expiry_days")]
    pub max_expiry_days: u32,
    /// Deadline for each storage call on the validation path.
    ///
    /// A storage call that misses it fails validation closed.
    #[serde(default = "default_storage_timeout_ms")]
    pub storage_timeout_ms: u64,
    /// Leading characters left visible when a token is re-displayed
    #[serde(default = "default_mask_prefix_len")]
    pub mask_prefix_len: usize,
    /// Trailing characters left visible when a token is re-displayed
    #[serde(default = "default_mask_suffix_len")]
    pub mask_suffix_len: usize,
}

fn default_expiry_days() -> u32 {
    30
}

fn default_max_expiry_days() -> u32 {
    MAX_ALLOWED_EXPIRY_DAYS
}

fn default_storage_timeout_ms() -> u64 {
    2_000
}

fn default_mask_prefix_len() -> usize {
    8
}

fn default_mask_suffix_len() -> usize {
    4
}

impl Default for SyndicationConfig {
    fn default() -> Self {
        Self {
            default_expiry_days: default_expiry_days(),
            max_expiry_days: default_max_expiry_days(),
            storage_timeout_ms: default_storage_timeout_ms(),
            mask_prefix_len: default_mask_prefix_len(),
            mask_suffix_len: default_mask_suffix_len(),
        }
    }
}

/// Errors that can occur when working with syndication configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid expiry window: {0}")]
    InvalidExpiry(String),

    #[error("Storage timeout must be greater than zero")]
    InvalidStorageTimeout,

    #[error("Invalid mask lengths: {0}")]
    InvalidMask(String),

    #[error("I/O error occurred while reading configuration: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Failed to parse configuration data: {0}")]
    ParseError(String),

    #[error("Environment variable error: {0}")]
    EnvVarError(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

#[cfg(feature = "toml")]
impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

impl From<env::VarError> for ConfigError {
    fn from(error: env::VarError) -> Self {
        ConfigError::EnvVarError(error.to_string())
    }
}

/// Builder for SyndicationConfig
///
/// Unset fields fall back to the defaults of [`SyndicationConfig::default`].
#[derive(Default, Debug)]
pub struct SyndicationConfigBuilder {
    default_expiry_days: Option<u32>,
    max_expiry_days: Option<u32>,
    storage_timeout_ms: Option<u64>,
    mask_prefix_len: Option<usize>,
    mask_suffix_len: Option<usize>,
}

impl SyndicationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder seeded from an existing configuration
    pub fn from_config(config: &SyndicationConfig) -> Self {
        Self {
            default_expiry_days: Some(config.default_expiry_days),
            max_expiry_days: Some(config.max_expiry_days),
            storage_timeout_ms: Some(config.storage_timeout_ms),
            mask_prefix_len: Some(config.mask_prefix_len),
            mask_suffix_len: Some(config.mask_suffix_len),
        }
    }

    pub fn default_expiry_days(mut self, days: u32) -> Self {
        self.default_expiry_days = Some(days);
        self
    }

    pub fn max_expiry_days(mut self, days: u32) -> Self {
        self.max_expiry_days = Some(days);
        self
    }

    pub fn storage_timeout_ms(mut self, millis: u64) -> Self {
        self.storage_timeout_ms = Some(millis);
        self
    }

    /// Set how many leading and trailing characters a masked token keeps
    pub fn mask(mut self, prefix_len: usize, suffix_len: usize) -> Self {
        self.mask_prefix_len = Some(prefix_len);
        self.mask_suffix_len = Some(suffix_len);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<SyndicationConfig, ConfigError> {
        let defaults = SyndicationConfig::default();
        let config = SyndicationConfig {
            default_expiry_days: self
                .default_expiry_days
                .unwrap_or(defaults.default_expiry_days),
            max_expiry_days: self.max_expiry_days.unwrap_or(defaults.max_expiry_days),
            storage_timeout_ms: self
                .storage_timeout_ms
                .unwrap_or(defaults.storage_timeout_ms),
            mask_prefix_len: self.mask_prefix_len.unwrap_or(defaults.mask_prefix_len),
            mask_suffix_len: self.mask_suffix_len.unwrap_or(defaults.mask_suffix_len),
        };

        config.validate()?;
        Ok(config)
    }
}

impl SyndicationConfig {
    pub fn builder() -> SyndicationConfigBuilder {
        SyndicationConfigBuilder::new()
    }

    /// Convert this configuration to a builder for modification
    pub fn to_builder(&self) -> SyndicationConfigBuilder {
        SyndicationConfigBuilder::from_config(self)
    }

    /// Per-call storage deadline on the validation path
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    /// Create a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: SyndicationConfig = serde_json::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration from a TOML file
    #[cfg(feature = "toml")]
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: SyndicationConfig = toml::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration from environment variables
    ///
    /// Every variable is optional and falls back to its default:
    /// - `{PREFIX}_DEFAULT_EXPIRY_DAYS`
    /// - `{PREFIX}_MAX_EXPIRY_DAYS`
    /// - `{PREFIX}_STORAGE_TIMEOUT_MS`
    /// - `{PREFIX}_MASK_PREFIX_LEN`
    /// - `{PREFIX}_MASK_SUFFIX_LEN`
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a variable is set but cannot be parsed, or
    /// the resulting configuration is invalid.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let defaults = SyndicationConfig::default();

        let config = SyndicationConfig {
            default_expiry_days: env_number(prefix, "DEFAULT_EXPIRY_DAYS")?
                .unwrap_or(defaults.default_expiry_days),
            max_expiry_days: env_number(prefix, "MAX_EXPIRY_DAYS")?
                .unwrap_or(defaults.max_expiry_days),
            storage_timeout_ms: env_number(prefix, "STORAGE_TIMEOUT_MS")?
                .unwrap_or(defaults.storage_timeout_ms),
            mask_prefix_len: env_number(prefix, "MASK_PREFIX_LEN")?
                .unwrap_or(defaults.mask_prefix_len),
            mask_suffix_len: env_number(prefix, "MASK_SUFFIX_LEN")?
                .unwrap_or(defaults.mask_suffix_len),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_expiry_days == 0 || self.max_expiry_days > MAX_ALLOWED_EXPIRY_DAYS {
            return Err(ConfigError::InvalidExpiry(format!(
                "max_expiry_days must be between 1 and {MAX_ALLOWED_EXPIRY_DAYS}, got {}",
                self.max_expiry_days
            )));
        }

        if self.default_expiry_days == 0 || self.default_expiry_days > self.max_expiry_days {
            return Err(ConfigError::InvalidExpiry(format!(
                "default_expiry_days must be between 1 and {}, got {}",
                self.max_expiry_days, self.default_expiry_days
            )));
        }

        if self.storage_timeout_ms == 0 {
            return Err(ConfigError::InvalidStorageTimeout);
        }

        // 43 is the length of an encoded 256-bit token; the masked form must
        // leave at least a third of it hidden.
        if self.mask_prefix_len + self.mask_suffix_len > 28 {
            return Err(ConfigError::InvalidMask(format!(
                "{} + {} visible characters reveal too much of the token",
                self.mask_prefix_len, self.mask_suffix_len
            )));
        }

        Ok(())
    }
}

fn env_number<T: std::str::FromStr>(prefix: &str, name: &str) -> Result<Option<T>, ConfigError> {
    let key = format!("{prefix}_{name}");
    match env::var(&key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::ParseError(format!("{key} is not a valid number: {value}"))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(stripped) => dirs::home_dir().map(|home| home.join(stripped)),
        None => Some(Path::new(path).to_path_buf()),
    }
}

/// Try to load a configuration from standard locations
///
/// This function attempts, in order:
/// 1. Environment variables with the prefix "SYNDICATION", if any is set
/// 2. `./syndication.json`, `~/.syndication/config.json`, `/etc/syndication/config.json`
/// 3. With the "toml" feature, the same locations with a `.toml` extension
///
/// Returns None if no configuration could be found.
pub fn try_load_default_config() -> Option<SyndicationConfig> {
    let env_present = env::vars().any(|(key, _)| key.starts_with("SYNDICATION_"));
    if env_present {
        if let Ok(config) = SyndicationConfig::from_env("SYNDICATION") {
            return Some(config);
        }
    }

    let paths = [
        "./syndication.json",
        "~/.syndication/config.json",
        "/etc/syndication/config.json",
    ];

    for path in paths.iter() {
        let Some(expanded_path) = expand_home(path) else {
            continue;
        };
        if expanded_path.exists() {
            if let Ok(config) = SyndicationConfig::from_file(&expanded_path) {
                return Some(config);
            }
        }
    }

    #[cfg(feature = "toml")]
    {
        let toml_paths = [
            "./syndication.toml",
            "~/.syndication/config.toml",
            "/etc/syndication/config.toml",
        ];

        for path in toml_paths.iter() {
            let Some(expanded_path) = expand_home(path) else {
                continue;
            };
            if expanded_path.exists() {
                if let Ok(config) = SyndicationConfig::from_toml(&expanded_path) {
                    return Some(config);
                }
            }
        }
    }

    None
}
