//! Library configuration.
//!
//! Built with [`Config::default`] plus `with_*` setters, or read from a
//! `vuurmuur.conf` file in the usual `KEY="value"` format.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, VrmrError};
use crate::kv::parse_line;
use crate::types::BackendCategory;

/// Default configuration directory
pub const DEFAULT_CONFIG_DIR: &str = "/etc/vuurmuur";

/// Name of the main configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "vuurmuur.conf";

/// Backend plugin used for every category unless configured otherwise
pub const DEFAULT_BACKEND: &str = "textdir";

/// Lock file polls before giving up
pub const DEFAULT_LOCK_ATTEMPTS: u32 = 60;

/// Pause between lock file polls
pub const DEFAULT_LOCK_INTERVAL: Duration = Duration::from_secs(1);

/// Largest value `ask` hands back
pub const DEFAULT_MAX_VALUE_LEN: usize = 512;

/// Vuurmuur configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `vuurmuur.conf` and `plugins/`
    pub config_dir: PathBuf,
    pub services_backend: String,
    pub zones_backend: String,
    pub interfaces_backend: String,
    pub rules_backend: String,
    /// Root of the textdir object tree, overridden by `plugins/textdir.conf`
    pub textdir_location: PathBuf,
    pub lock_attempts: u32,
    pub lock_interval: Duration,
    pub max_value_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            services_backend: DEFAULT_BACKEND.to_string(),
            zones_backend: DEFAULT_BACKEND.to_string(),
            interfaces_backend: DEFAULT_BACKEND.to_string(),
            rules_backend: DEFAULT_BACKEND.to_string(),
            textdir_location: PathBuf::from(DEFAULT_CONFIG_DIR),
            lock_attempts: DEFAULT_LOCK_ATTEMPTS,
            lock_interval: DEFAULT_LOCK_INTERVAL,
            max_value_len: DEFAULT_MAX_VALUE_LEN,
        }
    }
}

impl Config {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration directory
    pub fn with_config_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the backend plugin for one category
    pub fn with_backend(mut self, category: BackendCategory, name: impl Into<String>) -> Self {
        let name = name.into();
        match category {
            BackendCategory::Services => self.services_backend = name,
            BackendCategory::Zones => self.zones_backend = name,
            BackendCategory::Interfaces => self.interfaces_backend = name,
            BackendCategory::Rules => self.rules_backend = name,
        }
        self
    }

    /// Set the textdir storage root
    pub fn with_textdir_location(mut self, dir: impl AsRef<Path>) -> Self {
        self.textdir_location = dir.as_ref().to_path_buf();
        self
    }

    /// Set how long writers wait for a lock file
    pub fn with_lock_wait(mut self, attempts: u32, interval: Duration) -> Self {
        self.lock_attempts = attempts;
        self.lock_interval = interval;
        self
    }

    /// Set the longest value `ask` accepts
    pub fn with_max_value_len(mut self, len: usize) -> Self {
        self.max_value_len = len;
        self
    }

    /// Backend plugin name for a category
    pub fn backend_for(&self, category: BackendCategory) -> &str {
        match category {
            BackendCategory::Services => &self.services_backend,
            BackendCategory::Zones => &self.zones_backend,
            BackendCategory::Interfaces => &self.interfaces_backend,
            BackendCategory::Rules => &self.rules_backend,
        }
    }

    /// Path of a plugin's own configuration file
    pub fn plugin_config_path(&self, plugin: &str) -> PathBuf {
        self.config_dir.join("plugins").join(format!("{}.conf", plugin))
    }

    /// Load `vuurmuur.conf` from `dir`, falling back to defaults for
    /// missing keys.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut config = Self::default().with_config_dir(dir);
        config.apply_file(dir.join(CONFIG_FILE_NAME))?;
        Ok(config)
    }

    /// Apply the keys of a config file on top of this config.
    pub fn apply_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| VrmrError::io_at(path, e))?;
        debug!(path = %path.display(), "reading config");
        self.apply_str(&text)
    }

    /// Apply `KEY="value"` lines on top of this config. Unknown keys are ignored.
    pub fn apply_str(&mut self, text: &str) -> Result<()> {
        for line in text.lines() {
            let Some((key, value)) = parse_line(line) else {
                continue;
            };
            match key.to_ascii_uppercase().as_str() {
                "SERVICES_BACKEND" => self.services_backend = value.to_string(),
                "ZONES_BACKEND" => self.zones_backend = value.to_string(),
                "INTERFACES_BACKEND" => self.interfaces_backend = value.to_string(),
                "RULES_BACKEND" => self.rules_backend = value.to_string(),
                "LOCK_ATTEMPTS" => self.lock_attempts = parse_number(key, value)?,
                "MAX_VALUE_LEN" => self.max_value_len = parse_number(key, value)?,
                _ => {}
            }
        }
        Ok(())
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, value: &str) -> Result<N> {
    value
        .trim()
        .parse()
        .map_err(|_| VrmrError::Config(format!("{}: not a number: '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend_for(BackendCategory::Rules), "textdir");
        assert_eq!(config.lock_attempts, 60);
        assert_eq!(config.lock_interval, Duration::from_secs(1));
        assert_eq!(
            config.plugin_config_path("textdir"),
            PathBuf::from("/etc/vuurmuur/plugins/textdir.conf")
        );
    }

    #[test]
    fn test_builder() {
        let config = Config::new()
            .with_backend(BackendCategory::Zones, "memory")
            .with_lock_wait(3, Duration::from_millis(5))
            .with_textdir_location("/srv/vrmr");
        assert_eq!(config.backend_for(BackendCategory::Zones), "memory");
        assert_eq!(config.backend_for(BackendCategory::Services), "textdir");
        assert_eq!(config.lock_attempts, 3);
        assert_eq!(config.textdir_location, PathBuf::from("/srv/vrmr"));
    }

    #[test]
    fn test_apply_str() {
        let mut config = Config::default();
        config
            .apply_str(
                "# vuurmuur config\nRULES_BACKEND=\"other\"\nLOCK_ATTEMPTS=\"5\"\nIPTABLES=\"/sbin/iptables\"\n",
            )
            .unwrap();
        assert_eq!(config.rules_backend, "other");
        assert_eq!(config.lock_attempts, 5);
    }

    #[test]
    fn test_apply_str_bad_number() {
        let mut config = Config::default();
        let err = config.apply_str("LOCK_ATTEMPTS=\"many\"").unwrap_err();
        assert!(matches!(err, VrmrError::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/vuurmuur").unwrap_err();
        assert!(matches!(err, VrmrError::IoAt { .. }));
    }
}
