//! Send sensor readings to the cloud feeds.

use color_eyre::Result;
use sensehat_telemetry::apps::cloud_publisher;
use sensehat_telemetry::config::AppConfig;
use sensehat_telemetry::setup;

#[tokio::main]
async fn main() -> Result<()> {
    setup::init()?;
    let config = AppConfig::load().await?;
    cloud_publisher::run(config).await
}
