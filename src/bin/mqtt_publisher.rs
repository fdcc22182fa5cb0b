//! Publish sensor readings to MQTT as JSON.

use color_eyre::Result;
use sensehat_telemetry::apps::mqtt_publisher;
use sensehat_telemetry::config::AppConfig;
use sensehat_telemetry::setup;

#[tokio::main]
async fn main() -> Result<()> {
    setup::init()?;
    let config = AppConfig::load().await?;
    mqtt_publisher::run(config).await
}
