//! Sends every reading to the four cloud feeds.

use color_eyre::eyre::Result;
use tracing::{error, info};

use super::{ticker, until_interrupted, TickError};
use crate::cloud::{AdafruitIo, CloudFeed, FEEDS};
use crate::config::AppConfig;
use crate::reading::{self, SensorReading};
use crate::sense_hat::{EnvironmentSensors, SenseHatSensors};

/// Polls once and sends each channel to its feed. The first failed send drops the
/// rest of the reading.
pub async fn publish_once<S, F>(sensors: &mut S, feeds: &F) -> Result<SensorReading, TickError>
where
    S: EnvironmentSensors + ?Sized,
    F: CloudFeed + ?Sized,
{
    let reading = reading::poll(sensors)?;
    info!(
        "{} - barometric pressure: {:.2} hPa, temperature: {:.2} degree Celsius, \
         Magnetometer: {:.2} degrees, Humidity: {:.2} %",
        reading.timestamp, reading.pressure, reading.temperature, reading.heading, reading.humidity
    );

    for feed in FEEDS {
        feeds.send(feed, reading.value(feed)).await?;
    }
    Ok(reading)
}

async fn publish_loop<S, F>(sensors: &mut S, feeds: &F, period_secs: u64) -> Result<()>
where
    S: EnvironmentSensors + ?Sized,
    F: CloudFeed + ?Sized,
{
    let mut ticker = ticker(period_secs);
    loop {
        ticker.tick().await;
        if let Err(e) = publish_once(sensors, feeds).await {
            error!("Error reading sensors or sending data: {}", e);
        }
    }
}

pub async fn run(config: AppConfig) -> Result<()> {
    let feeds = AdafruitIo::new(&config.cloud)?;
    let mut sensors = SenseHatSensors::open()?;

    until_interrupted(publish_loop(&mut sensors, &feeds, config.intervals.cloud_secs)).await
}
