//! Pick an MQTT topic with the joystick and log the echo to CSV.

use color_eyre::Result;
use sensehat_telemetry::apps::joystick_logger;
use sensehat_telemetry::config::AppConfig;
use sensehat_telemetry::setup;

#[tokio::main]
async fn main() -> Result<()> {
    setup::init()?;
    let config = AppConfig::load().await?;
    joystick_logger::run(config).await
}
