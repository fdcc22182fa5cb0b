use serde::{Deserialize, Serialize};

use crate::reading::Channel;

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub keep_alive_secs: u64,
    /// Falls back to `<program>-<pid>` so several programs can share one broker
    pub client_id: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Capacity of the request channel between client and event loop
    pub request_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            keep_alive_secs: 60,
            client_id: None,
            user: None,
            password: None,
            request_capacity: 100,
        }
    }
}

/// Topics the telemetry publisher writes JSON readings to.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TelemetryTopics {
    pub temperature: String,
    pub pressure: String,
    pub humidity: String,
    pub magnetometer: String,
}

impl Default for TelemetryTopics {
    fn default() -> Self {
        Self {
            temperature: "home/sensors/temperature".to_string(),
            pressure: "home/sensors/pressure".to_string(),
            humidity: "home/sensors/humidity".to_string(),
            magnetometer: "home/sensors/magnetometer".to_string(),
        }
    }
}

impl TelemetryTopics {
    pub fn topic(&self, channel: Channel) -> &str {
        match channel {
            Channel::Temperature => &self.temperature,
            Channel::Pressure => &self.pressure,
            Channel::Humidity => &self.humidity,
            Channel::Magnetometer => &self.magnetometer,
        }
    }
}
