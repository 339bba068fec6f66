//! # Configuration
//!
//! One TOML file, deserialized into [`AppConfig`]. Every section falls back to
//! defaults, and a missing file means "all defaults" with a warning, so the
//! bridge still comes up on a fresh board.
//!
//! Lookup order: explicit path (first CLI argument), `$SHREDLINK_CONFIG`,
//! then `<config_dir>/shredlink/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};

use crate::acquisition::WiiExtensionBus;
use crate::delivery::DeliveryQueue;
use crate::report::Polarity;
use crate::tilt::{DebounceSettings, ProcessingContext};

pub const CONFIG_ENV: &str = "SHREDLINK_CONFIG";
const CONFIG_DIR: &str = "shredlink";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub acquisition: AcquisitionSettings,
    pub tilt: TiltSettings,
    pub report: Polarity,
    pub delivery: DeliverySettings,
    pub logging: LoggingSettings,
}

/// Poll cadence and the I2C binding of the extension controller
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AcquisitionSettings {
    pub poll_rate_hz: u32,
    pub i2c_bus: u8,
    pub i2c_address: u16,
    /// Delay between the register write and the frame read
    pub settle_delay_us: u64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            poll_rate_hz: 100,
            i2c_bus: 1,
            i2c_address: WiiExtensionBus::DEFAULT_ADDRESS,
            settle_delay_us: 200,
        }
    }
}

impl AcquisitionSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_micros(self.settle_delay_us)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TiltSettings {
    pub enabled: bool,
    pub gpio_pin: u8,
    /// Pin reads low while tilted
    pub active_low: bool,
    pub pull_up: bool,
    /// 0 disables hold-time filtering
    pub hold_time_ms: u64,
    pub processing: ProcessingContext,
}

impl Default for TiltSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            gpio_pin: 17,
            active_low: false,
            pull_up: true,
            hold_time_ms: 50,
            processing: ProcessingContext::Dedicated,
        }
    }
}

impl TiltSettings {
    pub fn hold_time(&self) -> Duration {
        Duration::from_millis(self.hold_time_ms)
    }

    pub fn debounce_settings(&self) -> DebounceSettings {
        DebounceSettings {
            hold_time: self.hold_time(),
            context: self.processing,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DeliverySettings {
    pub queue_capacity: usize,
    pub hid_device: PathBuf,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            queue_capacity: DeliveryQueue::DEFAULT_CAPACITY,
            hid_device: PathBuf::from("/dev/hidg0"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Explicit path, then `$SHREDLINK_CONFIG`, then the per-user config dir
    pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(Self::default_path)
    }

    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Loads and validates the file at `path`; a missing file yields defaults.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        if !exists {
            warn!(
                "Config file {} does not exist, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.acquisition.poll_rate_hz == 0 {
            return Err(ConfigError::Invalid(
                "acquisition.poll_rate_hz must be positive".to_string(),
            ));
        }
        if self.delivery.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "delivery.queue_capacity must be positive".to_string(),
            ));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<Level, ConfigError> {
        self.logging.level.parse().map_err(|_| {
            ConfigError::Invalid(format!("unknown log level '{}'", self.logging.level))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_hardware() {
        let config = AppConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.delivery.queue_capacity, 5);
        assert_eq!(config.acquisition.i2c_address, 0x52);
        assert!(config.report.invert_buttons);
        assert!(config.report.tilt_active_low);
        assert_eq!(config.log_level().unwrap(), Level::INFO);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [acquisition]
            poll_rate_hz = 250
            i2c_address = 0x53

            [tilt]
            hold_time_ms = 0
            processing = "shared"

            [report]
            invert_buttons = false
            "#,
        )
        .unwrap();

        assert_eq!(config.acquisition.poll_rate_hz, 250);
        assert_eq!(config.acquisition.i2c_address, 0x53);
        assert_eq!(config.acquisition.i2c_bus, 1);
        assert_eq!(config.tilt.hold_time(), Duration::ZERO);
        assert_eq!(config.tilt.debounce_settings().context, ProcessingContext::Shared);
        assert!(!config.report.invert_buttons);
        assert!(config.report.tilt_active_low);
        assert_eq!(config.delivery, DeliverySettings::default());
    }

    #[test]
    fn rejects_zero_rate_and_capacity() {
        let zero_rate = AppConfig::from_toml("[acquisition]\npoll_rate_hz = 0\n");
        assert!(matches!(zero_rate, Err(ConfigError::Invalid(_))));

        let zero_capacity = AppConfig::from_toml("[delivery]\nqueue_capacity = 0\n");
        assert!(matches!(zero_capacity, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_unknown_level_and_context() {
        let level = AppConfig::from_toml("[logging]\nlevel = \"loud\"\n");
        assert!(matches!(level, Err(ConfigError::Invalid(_))));

        let context = AppConfig::from_toml("[tilt]\nprocessing = \"isr\"\n");
        assert!(matches!(context, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn explicit_path_wins() {
        let explicit = PathBuf::from("/etc/shredlink.toml");
        assert_eq!(AppConfig::resolve_path(Some(explicit.clone())), explicit);
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("shredlink-does-not-exist.toml");
        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn loads_file_from_disk() {
        let path = std::env::temp_dir().join(format!("shredlink-config-{}.toml", std::process::id()));
        tokio::fs::write(&path, "[delivery]\nqueue_capacity = 8\n")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(config.delivery.queue_capacity, 8);
    }
}
