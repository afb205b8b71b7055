//! Configuration file management for adsb1090.
//!
//! Reads/writes `~/.adsb1090/config.toml` with store retention, registry
//! path, receiver reference position and output format. Every key is
//! optional; missing keys take their defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cpr::Position;
use crate::store::{default_cleanup_interval, DEFAULT_LIFETIME};
use crate::types::{DecodeError, Result};

/// Full configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub registry: RegistryConfig,
    pub receiver: ReceiverConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub lifetime_secs: u64,
    /// 0 means a third of the lifetime.
    pub cleanup_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            lifetime_secs: DEFAULT_LIFETIME.as_secs(),
            cleanup_interval_secs: default_cleanup_interval(DEFAULT_LIFETIME).as_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// Record serialization used by the CLI sinks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    #[default]
    Text,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Text => f.write_str("text"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "text" => Ok(OutputFormat::Text),
            other => Err(DecodeError::Config(format!("unknown output format: {other}"))),
        }
    }
}

impl Config {
    pub fn store_lifetime(&self) -> Duration {
        Duration::from_secs(self.store.lifetime_secs)
    }

    /// Eviction interval. A zero setting falls back to lifetime / 3.
    pub fn cleanup_interval(&self) -> Duration {
        match self.store.cleanup_interval_secs {
            0 => default_cleanup_interval(self.store_lifetime()),
            secs => Duration::from_secs(secs),
        }
    }

    /// Receiver reference position, when both coordinates are set.
    pub fn reference(&self) -> Option<Position> {
        match (self.receiver.lat, self.receiver.lon) {
            (Some(lat), Some(lon)) => Some(Position::new(lat, lon)),
            _ => None,
        }
    }
}

/// Get the config directory path (`~/.adsb1090/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".adsb1090")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.adsb1090/config.toml`.
///
/// Returns default config if the file doesn't exist.
pub fn load_config() -> Result<Config> {
    load_config_from(config_file())
}

pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|e| DecodeError::Config(format!("{}: {e}", path.display())))
}

/// Save config to `~/.adsb1090/config.toml`.
pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = config_file();
    save_config_to(&path, config)?;
    Ok(path)
}

/// Write `config` to `path`, creating parent directories.
pub fn save_config_to(path: impl AsRef<Path>, config: &Config) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| DecodeError::Config(e.to_string()))?;
    }
    std::fs::write(path, to_toml(config)?).map_err(|e| DecodeError::Config(e.to_string()))
}

/// Render `config` as the TOML text `save_config` writes.
pub fn to_toml(config: &Config) -> Result<String> {
    let text = toml::to_string_pretty(config).map_err(|e| DecodeError::Config(e.to_string()))?;
    Ok(format!("# adsb1090 configuration\n\n{text}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store_lifetime(), Duration::from_secs(60));
        assert_eq!(config.cleanup_interval(), Duration::from_secs(20));
        assert!(config.registry.path.is_none());
        assert!(config.reference().is_none());
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
[store]
lifetime_secs = 120
cleanup_interval_secs = 10

[registry]
path = "/var/lib/adsb1090/aircraft.csv"

[receiver]
lat = 52.3
lon = 4.76

[output]
format = "json"
"#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.store_lifetime(), Duration::from_secs(120));
        assert_eq!(config.cleanup_interval(), Duration::from_secs(10));
        assert_eq!(
            config.registry.path.as_deref(),
            Some(Path::new("/var/lib/adsb1090/aircraft.csv"))
        );
        assert_eq!(config.reference(), Some(Position::new(52.3, 4.76)));
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[store]\nlifetime_secs = 90\n").unwrap();
        assert_eq!(config.store_lifetime(), Duration::from_secs(90));
        assert_eq!(config.store.cleanup_interval_secs, 20);
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn test_zero_cleanup_interval_falls_back() {
        let config: Config =
            toml::from_str("[store]\nlifetime_secs = 90\ncleanup_interval_secs = 0\n").unwrap();
        assert_eq!(config.cleanup_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_reference_needs_both_coordinates() {
        let config: Config = toml::from_str("[receiver]\nlat = 52.3\n").unwrap();
        assert!(config.reference().is_none());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_to_toml_sections() {
        let text = to_toml(&Config::default()).unwrap();
        assert!(text.starts_with("# adsb1090 configuration"));
        assert!(text.contains("[store]"));
        assert!(text.contains("lifetime_secs = 60"));
        assert!(text.contains("format = \"text\""));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[store\nlifetime_secs = ").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, DecodeError::Config(_)));
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            store: StoreConfig {
                lifetime_secs: 30,
                cleanup_interval_secs: 5,
            },
            registry: RegistryConfig {
                path: Some("aircraft.csv".into()),
            },
            receiver: ReceiverConfig {
                lat: Some(35.5),
                lon: Some(-82.5),
            },
            output: OutputConfig {
                format: OutputFormat::Json,
            },
        };
        save_config_to(&path, &config).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }
}
