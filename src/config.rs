//! Program configuration
//!
//! Loaded once at startup from a TOML file. A missing file is not an error: every
//! section falls back to its defaults, which match a broker on localhost and the
//! stock Sense HAT topic and feed names. Selected values can be overridden from the
//! process environment.

use std::path::PathBuf;

use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cloud::CloudConfig;
use crate::csv_log::CsvConfig;
use crate::mqtt::{MqttConfig, TelemetryTopics};
use crate::router::RouterTopics;

pub const CONFIG_PATH_ENV: &str = "SENSEHAT_TELEMETRY_CONFIG";
const CONFIG_DIR: &str = "sensehat-telemetry";
const CONFIG_FILE: &str = "config.toml";

/// Loop periods in seconds.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct IntervalConfig {
    /// MQTT publisher and joystick logger
    pub live_secs: u64,
    /// Pause between two sensors on the LED display
    pub display_step_secs: u64,
    /// Pause after a full round on the LED display
    pub display_round_secs: u64,
    /// Cloud publisher and cloud display
    pub cloud_secs: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            live_secs: 1,
            display_step_secs: 1,
            display_round_secs: 5,
            cloud_secs: 15,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub mqtt: MqttConfig,
    pub telemetry_topics: TelemetryTopics,
    pub router_topics: RouterTopics,
    pub csv: CsvConfig,
    pub cloud: CloudConfig,
    pub intervals: IntervalConfig,
}

impl AppConfig {
    /// `$SENSEHAT_TELEMETRY_CONFIG`, else `<config dir>/sensehat-telemetry/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|mut path| {
            path.push(CONFIG_DIR);
            path.push(CONFIG_FILE);
            path
        })
    }

    pub async fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) => {
                let exists = tokio::fs::try_exists(&path)
                    .await
                    .map_err(|e| eyre!("Failed to check config file {}: {}", path.display(), e))?;
                if exists {
                    info!("Loading configuration from {}", path.display());
                    let content = tokio::fs::read_to_string(&path)
                        .await
                        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
                    Self::from_toml(&content)
                        .wrap_err_with(|| format!("Invalid configuration in {}", path.display()))?
                } else {
                    info!("No configuration at {}, using defaults", path.display());
                    Self::default()
                }
            }
            None => {
                warn!("Could not determine a configuration directory, using defaults");
                Self::default()
            }
        };

        config.apply_env(|name| std::env::var(name).ok());
        debug!("Effective configuration: {:?}", config.redacted());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Failed to parse configuration: {}", e))
    }

    /// Overrides broker address, CSV directory and cloud credentials from the
    /// environment. `lookup` returns the value of a variable if it is set.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MQTT_HOST") {
            self.mqtt.host = host;
        }
        if let Some(port) = lookup("MQTT_PORT") {
            match port.parse() {
                Ok(port) => self.mqtt.port = port,
                Err(e) => warn!("Ignoring invalid MQTT_PORT {:?}: {}", port, e),
            }
        }
        if let Some(directory) = lookup("SENSEHAT_CSV_DIR") {
            self.csv.directory = PathBuf::from(directory);
        }
        if let Some(username) = lookup("ADAFRUIT_IO_USERNAME") {
            self.cloud.username = Some(username);
        }
        if let Some(key) = lookup("ADAFRUIT_IO_KEY") {
            self.cloud.key = Some(key);
        }
    }

    /// Copy safe to log.
    fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.cloud.key.is_some() {
            copy.cloud.key = Some("***".to_string());
        }
        if copy.mqtt.password.is_some() {
            copy.mqtt.password = Some("***".to_string());
        }
        copy
    }
}
