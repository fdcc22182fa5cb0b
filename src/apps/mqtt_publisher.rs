//! Publishes every reading as four small JSON documents, one per sensor topic.

use std::collections::HashMap;

use color_eyre::eyre::Result;
use rumqttc::QoS;
use tracing::{error, info};

use super::{ticker, until_interrupted, TickError};
use crate::config::AppConfig;
use crate::mqtt::{Messenger, MqttLink, TelemetryTopics};
use crate::reading::{self, Channel, SensorReading};
use crate::sense_hat::{EnvironmentSensors, SenseHatSensors};

pub const PROGRAM: &str = "mqtt-publisher";

const PUBLISH_ORDER: [Channel; 4] = [
    Channel::Pressure,
    Channel::Temperature,
    Channel::Magnetometer,
    Channel::Humidity,
];

/// `{"<channel>": <value>}`
pub fn payload(channel: Channel, reading: &SensorReading) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&HashMap::from([(channel, reading.value(channel))]))
}

/// Polls once and publishes all four channels. The first failure drops the rest
/// of the reading.
pub fn publish_reading<S, M>(
    sensors: &mut S,
    messenger: &mut M,
    topics: &TelemetryTopics,
) -> Result<SensorReading, TickError>
where
    S: EnvironmentSensors + ?Sized,
    M: Messenger + ?Sized,
{
    let reading = reading::poll(sensors)?;

    for channel in PUBLISH_ORDER {
        let topic = topics.topic(channel);
        messenger.publish(topic, payload(channel, &reading)?, QoS::AtMostOnce, false)?;
        info!(
            "Published to {}: {:.2} (QoS: 0, Retain: False)",
            topic,
            reading.value(channel)
        );
    }

    Ok(reading)
}

fn log_reading(iteration: u64, reading: &SensorReading) {
    info!(
        "Iteration {} at {}: Temperature: {:.2} degree celsius, Humidity: {:.2} %, \
         Pressure: {:.2} hPa, Magnetometer: {:.2} degrees",
        iteration,
        reading.timestamp,
        reading.temperature,
        reading.humidity,
        reading.pressure,
        reading.heading
    );
}

async fn publish_loop<S, M>(sensors: &mut S, messenger: &mut M, config: &AppConfig) -> Result<()>
where
    S: EnvironmentSensors + ?Sized,
    M: Messenger + ?Sized,
{
    let mut ticker = ticker(config.intervals.live_secs);
    let mut iteration: u64 = 0;
    loop {
        ticker.tick().await;
        match publish_reading(sensors, messenger, &config.telemetry_topics) {
            Ok(reading) => {
                iteration += 1;
                log_reading(iteration, &reading);
            }
            Err(e) => error!("Error reading sensors or publishing data: {}", e),
        }
    }
}

pub async fn run(config: AppConfig) -> Result<()> {
    let mut sensors = SenseHatSensors::open()?;
    let (mut link, _inbox) = MqttLink::create(&config.mqtt, PROGRAM).connect();

    let result = until_interrupted(publish_loop(&mut sensors, &mut link, &config)).await;

    link.shutdown().await;
    result
}
