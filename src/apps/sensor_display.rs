//! Scrolls each sensor value across the LED matrix, one after another.

use std::time::Duration;

use color_eyre::eyre::Result;
use tracing::{error, info};

use super::{until_interrupted, TickError};
use crate::config::AppConfig;
use crate::reading::{self, Channel, SensorReading};
use crate::sense_hat::{
    colors, EnvironmentSensors, LedMatrix, MatrixDisplay, Rgb, SenseHatSensors,
};

pub const SCROLL_SPEED: f32 = 0.07;

const STEPS: [Channel; 4] = [
    Channel::Pressure,
    Channel::Humidity,
    Channel::Temperature,
    Channel::Magnetometer,
];

pub fn trial_message(channel: Channel, trial: u64, reading: &SensorReading) -> (String, Rgb) {
    let value = reading.value(channel);
    match channel {
        Channel::Pressure => (
            format!("Trial {}: Barometric Pressure: {:.2} mb", trial, value),
            colors::GREEN,
        ),
        Channel::Humidity => (
            format!("Trial {}: Humidity: {:.2} %", trial, value),
            colors::BLUE,
        ),
        Channel::Temperature => (
            format!("Trial {}: temperature: {:.2} degree Celsius", trial, value),
            colors::RED,
        ),
        Channel::Magnetometer => (
            format!("Trial {}: Magnetometer: {:.2} degrees", trial, value),
            colors::ORANGE,
        ),
    }
}

/// Reads the sensors and shows one channel. Returns the text shown.
pub fn show_step<S, D>(
    sensors: &mut S,
    display: &mut D,
    channel: Channel,
    trial: u64,
) -> Result<String, TickError>
where
    S: EnvironmentSensors + ?Sized,
    D: MatrixDisplay + ?Sized,
{
    let reading = reading::poll(sensors)?;
    let (text, color) = trial_message(channel, trial, &reading);
    display.show_text(&text, SCROLL_SPEED, color);
    info!("{}", text);
    Ok(text)
}

async fn display_loop<S, D>(sensors: &mut S, display: &mut D, config: &AppConfig) -> Result<()>
where
    S: EnvironmentSensors + ?Sized,
    D: MatrixDisplay + ?Sized,
{
    let step_pause = Duration::from_secs(config.intervals.display_step_secs);
    let round_pause = Duration::from_secs(config.intervals.display_round_secs);
    let mut trial: u64 = 1;
    loop {
        for channel in STEPS {
            if let Err(e) = show_step(sensors, display, channel, trial) {
                error!("Error reading {} for trial {}: {}", channel.key(), trial, e);
            }
            tokio::time::sleep(step_pause).await;
        }
        tokio::time::sleep(round_pause).await;
        trial += 1;
    }
}

pub async fn run(config: AppConfig) -> Result<()> {
    let mut sensors = SenseHatSensors::open()?;
    let mut display = LedMatrix::open()?;
    display.clear();

    let result = until_interrupted(display_loop(&mut sensors, &mut display, &config)).await;
    display.clear();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::normalize;
    use crate::sense_hat::test_support::{FixedSensors, RecordingDisplay, Shown};

    #[test]
    fn formats_each_channel_with_its_colour() {
        let reading = normalize(21.0, 23.0, 45.678, 1013.254, 7.5);

        assert_eq!(
            trial_message(Channel::Pressure, 3, &reading),
            (
                "Trial 3: Barometric Pressure: 1013.25 mb".to_string(),
                colors::GREEN
            )
        );
        assert_eq!(
            trial_message(Channel::Humidity, 3, &reading),
            ("Trial 3: Humidity: 45.68 %".to_string(), colors::BLUE)
        );
        assert_eq!(
            trial_message(Channel::Temperature, 3, &reading),
            (
                "Trial 3: temperature: 22.00 degree Celsius".to_string(),
                colors::RED
            )
        );
        assert_eq!(
            trial_message(Channel::Magnetometer, 3, &reading),
            ("Trial 3: Magnetometer: 7.50 degrees".to_string(), colors::ORANGE)
        );
    }

    #[test]
    fn step_shows_text_on_display() {
        let mut sensors = FixedSensors::default();
        let mut display = RecordingDisplay::default();

        let text = show_step(&mut sensors, &mut display, Channel::Humidity, 1).unwrap();

        assert_eq!(text, "Trial 1: Humidity: 45.68 %");
        assert_eq!(display.shown, vec![Shown::Text(text, colors::BLUE)]);
    }

    #[test]
    fn failed_read_leaves_display_untouched() {
        let mut sensors = FixedSensors {
            fail_compass: true,
            ..FixedSensors::default()
        };
        let mut display = RecordingDisplay::default();

        assert!(show_step(&mut sensors, &mut display, Channel::Pressure, 1).is_err());
        assert!(display.shown.is_empty());
    }
}
