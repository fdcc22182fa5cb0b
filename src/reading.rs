//! Reading normalization
//!
//! Every sink (console, LED matrix, CSV file, MQTT payload, cloud feed) formats its
//! output from a [`SensorReading`]. Rounding to two decimals happens here, once, so
//! all sinks agree on the same values.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::sense_hat::{EnvironmentSensors, SensorError};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Measured quantity carried by a topic, feed or log file. Serializes as its
/// lowercase name, which is also the JSON payload key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Temperature,
    Pressure,
    Humidity,
    Magnetometer,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Temperature,
        Channel::Pressure,
        Channel::Humidity,
        Channel::Magnetometer,
    ];

    /// Key used in JSON payloads and cloud feed names.
    pub fn key(self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Pressure => "pressure",
            Channel::Humidity => "humidity",
            Channel::Magnetometer => "magnetometer",
        }
    }
}

/// One complete, normalized poll of the environmental sensors.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub timestamp: String,
    /// °C, mean of the humidity- and pressure-sensor temperatures
    pub temperature: f64,
    /// %
    pub humidity: f64,
    /// hPa
    pub pressure: f64,
    /// degrees in [0, 360)
    pub heading: f64,
}

impl SensorReading {
    pub fn value(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Temperature => self.temperature,
            Channel::Pressure => self.pressure,
            Channel::Humidity => self.humidity,
            Channel::Magnetometer => self.heading,
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Builds a reading stamped with the current local time.
///
/// The temperature is the mean of both sensor temperatures: each chip alone reads
/// high from self-heating, the mean compensates for it.
pub fn normalize(
    humidity_temperature: f64,
    pressure_temperature: f64,
    humidity: f64,
    pressure: f64,
    heading: f64,
) -> SensorReading {
    normalize_at(
        Local::now(),
        humidity_temperature,
        pressure_temperature,
        humidity,
        pressure,
        heading,
    )
}

pub fn normalize_at(
    at: DateTime<Local>,
    humidity_temperature: f64,
    pressure_temperature: f64,
    humidity: f64,
    pressure: f64,
    heading: f64,
) -> SensorReading {
    let mut heading = round2(heading);
    // 359.996 rounds up to a full turn
    if heading >= 360.0 {
        heading -= 360.0;
    }

    SensorReading {
        timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
        temperature: round2((humidity_temperature + pressure_temperature) / 2.0),
        humidity: round2(humidity),
        pressure: round2(pressure),
        heading,
    }
}

/// Reads all five raw values and normalizes them. Any failed read discards the
/// whole reading.
pub fn poll<S>(sensors: &mut S) -> Result<SensorReading, SensorError>
where
    S: EnvironmentSensors + ?Sized,
{
    let humidity_temperature = sensors.temperature()?;
    let pressure_temperature = sensors.temperature_from_pressure()?;
    let humidity = sensors.humidity()?;
    let pressure = sensors.pressure()?;
    let heading = sensors.compass()?;

    Ok(normalize(
        humidity_temperature,
        pressure_temperature,
        humidity,
        pressure,
        heading,
    ))
}
