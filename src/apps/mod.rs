//! # Telemetry Programs
//!
//! One module per binary. Each program is a fixed-period loop:
//! read sensors → format → push to one sink → wait.
//!
//! | Program           | Sink                         | Period |
//! |-------------------|------------------------------|--------|
//! | `sensor-display`  | LED matrix                   | 1 s per sensor, 5 s per round |
//! | `mqtt-publisher`  | MQTT, JSON per sensor topic  | 1 s    |
//! | `joystick-logger` | MQTT topic picked by joystick, echo to CSV | 1 s |
//! | `cloud-publisher` | Adafruit IO feeds            | 15 s   |
//! | `cloud-display`   | Adafruit IO feeds → LED matrix | 15 s |
//!
//! A failing tick is logged and dropped; the next tick starts fresh. Ctrl-C ends
//! the loop, after which every program releases its MQTT link.

pub mod cloud_display;
pub mod cloud_publisher;
pub mod joystick_logger;
pub mod mqtt_publisher;
pub mod sensor_display;

use std::future::Future;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::info;

use crate::cloud::FeedError;
use crate::csv_log::CsvLogError;
use crate::mqtt::MessagingError;
use crate::sense_hat::SensorError;

/// Everything that can spoil a single tick.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    #[error("Error reading sensors: {0}")]
    Sensor(#[from] SensorError),

    #[error("Error publishing data: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Error talking to cloud feed: {0}")]
    Feed(#[from] FeedError),

    #[error("Error writing CSV log: {0}")]
    Log(#[from] CsvLogError),

    #[error("Error encoding payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Fixed-period ticker. A slow tick delays the following ones instead of bursting.
pub fn ticker(period_secs: u64) -> Interval {
    let mut interval = tokio::time::interval(Duration::from_secs(period_secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Runs `work` until it finishes or the process receives Ctrl-C.
pub async fn until_interrupted<F>(work: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::select! {
        result = work => result,
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|e| eyre!("Failed to listen for Ctrl-C: {}", e))?;
            info!("Exiting...");
            Ok(())
        }
    }
}
