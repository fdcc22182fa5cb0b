//! Show the latest cloud feed values on the LED matrix.

use color_eyre::Result;
use sensehat_telemetry::apps::cloud_display;
use sensehat_telemetry::config::AppConfig;
use sensehat_telemetry::setup;

#[tokio::main]
async fn main() -> Result<()> {
    setup::init()?;
    let config = AppConfig::load().await?;
    cloud_display::run(config).await
}
