//! Configuration Module
//!
//! Loads the store stack configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::crypto::KeyMaterial;
use crate::error::{Result, StoreError};

/// Store stack configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Clone)]
pub struct StoreConfig {
    /// Root directory of the durable store
    pub root: PathBuf,
    /// Cache high watermark; 0 disables the caching layer
    pub max_entries: usize,
    /// Cache low watermark, the target of batch eviction
    pub low_watermark: usize,
    /// Use a purgeable cache instead of a plain LRU cache
    pub purgeable: bool,
    /// Base64 encryption key; None disables the encryption layer
    pub encryption_key: Option<String>,
    /// Background trim interval in seconds
    pub pressure_interval: u64,
}

impl StoreConfig {
    /// Creates a new StoreConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `STORE_ROOT` - Root directory (default: ./data)
    /// - `CACHE_MAX_ENTRIES` - Cache high watermark (default: 1000)
    /// - `CACHE_LOW_WATERMARK` - Cache low watermark (default: same as high)
    /// - `CACHE_PURGEABLE` - `true` or `1` for a purgeable cache (default: false)
    /// - `STORE_ENCRYPTION_KEY` - Base64 32-byte key (default: unset)
    /// - `PRESSURE_INTERVAL` - Trim frequency in seconds (default: 30)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_entries = parse_var(&lookup, "CACHE_MAX_ENTRIES").unwrap_or(defaults.max_entries);

        Self {
            root: lookup("STORE_ROOT")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.root),
            max_entries,
            low_watermark: parse_var(&lookup, "CACHE_LOW_WATERMARK").unwrap_or(max_entries),
            purgeable: lookup("CACHE_PURGEABLE")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1"))
                .unwrap_or(defaults.purgeable),
            encryption_key: lookup("STORE_ENCRYPTION_KEY").filter(|v| !v.trim().is_empty()),
            pressure_interval: parse_var(&lookup, "PRESSURE_INTERVAL").unwrap_or(defaults.pressure_interval),
        }
    }

    /// Checks that the watermarks are ordered and the key is usable.
    pub fn validate(&self) -> Result<()> {
        if self.low_watermark > self.max_entries {
            return Err(StoreError::InvalidConfig(format!(
                "low watermark {} exceeds max entries {}",
                self.low_watermark, self.max_entries
            )));
        }
        if self.pressure_interval == 0 {
            return Err(StoreError::InvalidConfig(
                "pressure interval must be at least one second".to_string(),
            ));
        }
        self.key_material()?;
        Ok(())
    }

    /// Decodes the configured encryption key, if any.
    pub fn key_material(&self) -> Result<Option<KeyMaterial>> {
        self.encryption_key
            .as_deref()
            .map(KeyMaterial::from_base64)
            .transpose()
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))
    }

    pub fn caching_enabled(&self) -> bool {
        self.max_entries > 0
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data"),
            max_entries: 1000,
            low_watermark: 1000,
            purgeable: false,
            encryption_key: None,
            pressure_interval: 30,
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("root", &self.root)
            .field("max_entries", &self.max_entries)
            .field("low_watermark", &self.low_watermark)
            .field("purgeable", &self.purgeable)
            .field("encrypted", &self.encryption_key.is_some())
            .field("pressure_interval", &self.pressure_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.root, PathBuf::from("./data"));
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.low_watermark, 1000);
        assert!(!config.purgeable);
        assert!(config.encryption_key.is_none());
        assert_eq!(config.pressure_interval, 30);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for name in [
            "STORE_ROOT",
            "CACHE_MAX_ENTRIES",
            "CACHE_LOW_WATERMARK",
            "CACHE_PURGEABLE",
            "STORE_ENCRYPTION_KEY",
            "PRESSURE_INTERVAL",
        ] {
            env::remove_var(name);
        }

        let config = StoreConfig::from_env();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.low_watermark, 1000);
        assert_eq!(config.pressure_interval, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_lookup() {
        let key = KeyMaterial::generate().to_base64();
        let config = StoreConfig::from_lookup(lookup(&[
            ("STORE_ROOT", "/var/lib/records"),
            ("CACHE_MAX_ENTRIES", "10"),
            ("CACHE_LOW_WATERMARK", "5"),
            ("CACHE_PURGEABLE", "TRUE"),
            ("STORE_ENCRYPTION_KEY", &key),
            ("PRESSURE_INTERVAL", "2"),
        ]));

        assert_eq!(config.root, PathBuf::from("/var/lib/records"));
        assert_eq!(config.max_entries, 10);
        assert_eq!(config.low_watermark, 5);
        assert!(config.purgeable);
        assert_eq!(config.pressure_interval, 2);
        assert!(config.key_material().unwrap().is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_low_watermark_follows_max_entries() {
        let config = StoreConfig::from_lookup(lookup(&[("CACHE_MAX_ENTRIES", "64")]));
        assert_eq!(config.low_watermark, 64);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("CACHE_MAX_ENTRIES", "lots"),
            ("PRESSURE_INTERVAL", "-1"),
            ("STORE_ENCRYPTION_KEY", "  "),
        ]));
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.pressure_interval, 30);
        assert!(config.encryption_key.is_none());
    }

    #[test]
    fn test_zero_disables_caching() {
        let config = StoreConfig::from_lookup(lookup(&[("CACHE_MAX_ENTRIES", "0")]));
        assert!(!config.caching_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_watermarks() {
        let config = StoreConfig {
            max_entries: 5,
            low_watermark: 10,
            ..StoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(StoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_bad_key() {
        let config = StoreConfig {
            encryption_key: Some("c2hvcnQ=".to_string()),
            ..StoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(StoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let config = StoreConfig {
            encryption_key: Some(KeyMaterial::generate().to_base64()),
            ..StoreConfig::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains(config.encryption_key.as_deref().unwrap()));
    }
}
