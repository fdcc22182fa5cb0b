//! # Cloud Feeds
//!
//! Push/pull telemetry channels on a hosted IoT platform. A feed is addressed by
//! its key and always carries the latest value as a string.
//!
//! ```text
//! cloud/
//! ├── mod.rs       - Feed keys, the CloudFeed trait, value parsing
//! └── adafruit.rs  - Adafruit IO REST client
//! ```

pub mod adafruit;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::reading::Channel;

pub use adafruit::AdafruitIo;

/// Feeds in the order the programs visit them.
pub const FEEDS: [Channel; 4] = [
    Channel::Pressure,
    Channel::Temperature,
    Channel::Magnetometer,
    Channel::Humidity,
];

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CloudConfig {
    pub base_url: String,
    /// Read from `ADAFRUIT_IO_USERNAME` when unset
    pub username: Option<String>,
    /// Read from `ADAFRUIT_IO_KEY` when unset
    pub key: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: "https://io.adafruit.com".to_string(),
            username: None,
            key: None,
            request_timeout_secs: 30,
        }
    }
}

/// Latest value of a feed as delivered by the platform.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct FeedValue {
    pub value: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("HTTP request for feed {feed} failed: {source}")]
    Http {
        feed: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Feed {feed} answered with status {status}")]
    Status {
        feed: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("Invalid data format for {feed}: {raw}")]
    InvalidValue { feed: &'static str, raw: String },

    #[error("Missing cloud credential: {0}")]
    MissingCredentials(&'static str),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

#[async_trait]
pub trait CloudFeed: Send + Sync {
    async fn send(&self, feed: Channel, value: f64) -> Result<(), FeedError>;

    async fn receive(&self, feed: Channel) -> Result<FeedValue, FeedError>;
}

/// Interprets a received feed value as a number.
pub fn parse_value(feed: Channel, received: &FeedValue) -> Result<f64, FeedError> {
    received
        .value
        .trim()
        .parse()
        .map_err(|_| FeedError::InvalidValue {
            feed: feed.key(),
            raw: received.value.clone(),
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{CloudFeed, FeedError, FeedValue};
    use crate::reading::Channel;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory feeds; feeds listed in `unreachable` fail every request.
    #[derive(Debug, Default)]
    pub struct MemoryFeeds {
        pub values: Mutex<HashMap<Channel, String>>,
        pub sent: Mutex<Vec<(Channel, f64)>>,
        pub unreachable: Vec<Channel>,
    }

    impl MemoryFeeds {
        pub fn with_values(values: &[(Channel, &str)]) -> Self {
            let feeds = Self::default();
            {
                let mut map = feeds.values.lock().unwrap();
                for (channel, value) in values {
                    map.insert(*channel, value.to_string());
                }
            }
            feeds
        }
    }

    #[async_trait]
    impl CloudFeed for MemoryFeeds {
        async fn send(&self, feed: Channel, value: f64) -> Result<(), FeedError> {
            if self.unreachable.contains(&feed) {
                return Err(FeedError::Status {
                    feed: feed.key(),
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                });
            }
            self.sent.lock().unwrap().push((feed, value));
            self.values
                .lock()
                .unwrap()
                .insert(feed, value.to_string());
            Ok(())
        }

        async fn receive(&self, feed: Channel) -> Result<FeedValue, FeedError> {
            if self.unreachable.contains(&feed) {
                return Err(FeedError::Status {
                    feed: feed.key(),
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                });
            }
            let value = self
                .values
                .lock()
                .unwrap()
                .get(&feed)
                .cloned()
                .unwrap_or_default();
            Ok(FeedValue { value })
        }
    }
}
