//! Shows the latest value of every cloud feed on the LED matrix.

use color_eyre::eyre::Result;
use tracing::{error, info};

use super::{ticker, until_interrupted};
use crate::cloud::{parse_value, AdafruitIo, CloudFeed, FeedError, FEEDS};
use crate::config::AppConfig;
use crate::reading::{Channel, TIMESTAMP_FORMAT};
use crate::sense_hat::{colors, LedMatrix, MatrixDisplay, Rgb};

/// Seconds per scroll step; the Sense HAT library default used by `show_message`.
pub const SCROLL_SPEED: f32 = 0.1;

pub fn feed_message(feed: Channel, value: f64) -> (String, Rgb) {
    match feed {
        Channel::Pressure => (format!("BP: {:.2} hPa", value), colors::RED),
        Channel::Temperature => (format!("Temp: {:.2} degree celsius", value), colors::GREEN),
        Channel::Magnetometer => (format!("Mag: {:.2} degrees", value), colors::BLUE),
        Channel::Humidity => (format!("Hum: {:.2} %", value), colors::YELLOW),
    }
}

/// Fetches the latest value of `feed` and shows it. Nothing is shown unless the
/// value parses as a number.
pub async fn fetch_and_display<F, D>(
    feeds: &F,
    display: &mut D,
    feed: Channel,
) -> Result<f64, FeedError>
where
    F: CloudFeed + ?Sized,
    D: MatrixDisplay + ?Sized,
{
    let received = feeds.receive(feed).await?;
    let value = parse_value(feed, &received)?;

    info!(
        "{} - The value of {} from the cloud is: {:.2}",
        chrono::Local::now().format(TIMESTAMP_FORMAT),
        feed.key(),
        value
    );
    let (text, color) = feed_message(feed, value);
    display.show_text(&text, SCROLL_SPEED, color);
    Ok(value)
}

/// One pass over all feeds. A failing feed is logged and skipped.
pub async fn refresh_all<F, D>(feeds: &F, display: &mut D)
where
    F: CloudFeed + ?Sized,
    D: MatrixDisplay + ?Sized,
{
    for feed in FEEDS {
        match fetch_and_display(feeds, display, feed).await {
            Ok(_) => {}
            Err(e @ FeedError::InvalidValue { .. }) => error!("{}", e),
            Err(e) => error!("Error receiving data from {}: {}", feed.key(), e),
        }
    }
}

async fn display_loop<F, D>(feeds: &F, display: &mut D, period_secs: u64) -> Result<()>
where
    F: CloudFeed + ?Sized,
    D: MatrixDisplay + ?Sized,
{
    let mut ticker = ticker(period_secs);
    loop {
        ticker.tick().await;
        refresh_all(feeds, display).await;
    }
}

pub async fn run(config: AppConfig) -> Result<()> {
    let feeds = AdafruitIo::new(&config.cloud)?;
    let mut display = LedMatrix::open()?;
    display.clear();

    let result =
        until_interrupted(display_loop(&feeds, &mut display, config.intervals.cloud_secs)).await;
    display.clear();
    result
}
