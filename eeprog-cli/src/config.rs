//! Configuration file support for eeprog.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (EEPROG_*)
//! 3. Local config file (./eeprog.toml)
//! 4. Global config file (~/.config/eeprog/config.toml)
//!
//! ```toml
//! [connection]
//! serial = "/dev/ttyACM0"
//! framing = "cobs"
//! retries = 50
//! retry_delay_ms = 100
//!
//! [eeprom]
//! type = "microwire"
//! start_address = 0
//! skip_verify = false
//! ```

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Local config file name.
const LOCAL_CONFIG: &str = "eeprog.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyACM0" or "COM3").
    pub serial: Option<String>,
    /// Bridge framing ("cobs" or "line").
    pub framing: Option<String>,
    /// Read attempts per acknowledged exchange.
    pub retries: Option<u32>,
    /// Delay between read attempts in milliseconds.
    pub retry_delay_ms: Option<u64>,
}

/// EEPROM configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EepromConfig {
    /// EEPROM type ("microwire" or "i2c").
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Start address.
    pub start_address: Option<u32>,
    /// Skip read-back verification by default.
    #[serde(default)]
    pub skip_verify: bool,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// EEPROM configuration.
    #[serde(default)]
    pub eeprom: EepromConfig,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG)) {
            debug!("Loaded local config from {LOCAL_CONFIG}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "eeprog").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one. Values set in `other` win.
    fn merge(&mut self, other: Self) {
        let Self { connection, eeprom } = other;

        if connection.serial.is_some() {
            self.connection.serial = connection.serial;
        }
        if connection.framing.is_some() {
            self.connection.framing = connection.framing;
        }
        if connection.retries.is_some() {
            self.connection.retries = connection.retries;
        }
        if connection.retry_delay_ms.is_some() {
            self.connection.retry_delay_ms = connection.retry_delay_ms;
        }

        if eeprom.kind.is_some() {
            self.eeprom.kind = eeprom.kind;
        }
        if eeprom.start_address.is_some() {
            self.eeprom.start_address = eeprom.start_address;
        }
        if eeprom.skip_verify {
            self.eeprom.skip_verify = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.connection.serial.is_none());
        assert!(config.connection.framing.is_none());
        assert!(config.eeprom.kind.is_none());
        assert!(!config.eeprom.skip_verify);
    }

    #[test]
    fn test_config_merge_overrides() {
        let mut base = Config::default();
        base.connection.serial = Some("/dev/ttyUSB0".to_string());
        base.eeprom.kind = Some("microwire".to_string());

        let mut other = Config::default();
        other.connection.serial = Some("/dev/ttyACM0".to_string());
        other.connection.retries = Some(10);

        base.merge(other);
        assert_eq!(base.connection.serial.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(base.connection.retries, Some(10));
        // Untouched by the overlay
        assert_eq!(base.eeprom.kind.as_deref(), Some("microwire"));
    }

    #[test]
    fn test_config_merge_does_not_overwrite_with_none() {
        let mut base = Config::default();
        base.eeprom.start_address = Some(0x40);
        base.merge(Config::default());
        assert_eq!(base.eeprom.start_address, Some(0x40));
    }

    #[test]
    fn test_config_merge_skip_verify() {
        let mut base = Config::default();
        let mut other = Config::default();
        other.eeprom.skip_verify = true;
        base.merge(other);
        assert!(base.eeprom.skip_verify);
    }

    #[test]
    fn test_config_from_toml() {
        let config: Config = toml::from_str(
            r#"
[connection]
serial = "/dev/ttyACM0"
framing = "line"
retries = 20
retry_delay_ms = 50

[eeprom]
type = "i2c"
start_address = 16
skip_verify = true
"#,
        )
        .unwrap();

        assert_eq!(config.connection.serial.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.connection.framing.as_deref(), Some("line"));
        assert_eq!(config.connection.retries, Some(20));
        assert_eq!(config.connection.retry_delay_ms, Some(50));
        assert_eq!(config.eeprom.kind.as_deref(), Some("i2c"));
        assert_eq!(config.eeprom.start_address, Some(16));
        assert!(config.eeprom.skip_verify);
    }

    #[test]
    fn test_config_from_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.connection.serial.is_none());
        assert!(config.eeprom.start_address.is_none());
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let mut config = Config::default();
        config.connection.serial = Some("COM3".to_string());
        config.eeprom.kind = Some("microwire".to_string());

        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("type = \"microwire\""));
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.connection.serial.as_deref(), Some("COM3"));
        assert_eq!(parsed.eeprom.kind.as_deref(), Some("microwire"));
    }

    #[test]
    fn test_load_from_path_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eeprog.toml");
        fs::write(
            &path,
            r#"
[connection]
serial = "/dev/ttyUSB1"
[eeprom]
type = "i2c"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path);
        assert_eq!(config.connection.serial.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(config.eeprom.kind.as_deref(), Some("i2c"));
    }

    #[test]
    fn test_load_from_path_invalid_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[connection\nserial = ").unwrap();

        let config = Config::load_from_path(&path);
        assert!(config.connection.serial.is_none());
    }

    #[test]
    fn test_load_from_path_nonexistent() {
        let config = Config::load_from_path(Path::new("/nonexistent/path/config.toml"));
        assert!(config.connection.serial.is_none());
    }

    #[test]
    fn test_global_config_path() {
        if let Some(p) = Config::global_config_path() {
            let text = p.to_string_lossy();
            assert!(text.contains("eeprog"));
            assert!(text.ends_with("config.toml"));
        }
    }
}
