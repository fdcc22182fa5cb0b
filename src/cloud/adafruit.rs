//! Adafruit IO REST client (API v2)
//!
//! `POST {base}/api/v2/{user}/feeds/{key}/data` appends a value,
//! `GET {base}/api/v2/{user}/feeds/{key}/data/last` returns the newest one.
//! Requests authenticate with the `X-AIO-Key` header.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{CloudConfig, CloudFeed, FeedError, FeedValue};
use crate::reading::Channel;

const KEY_HEADER: &str = "X-AIO-Key";

pub struct AdafruitIo {
    http: reqwest::Client,
    base_url: String,
    username: String,
    key: String,
}

impl AdafruitIo {
    pub fn new(config: &CloudConfig) -> Result<Self, FeedError> {
        let username = config
            .username
            .clone()
            .ok_or(FeedError::MissingCredentials("ADAFRUIT_IO_USERNAME"))?;
        let key = config
            .key
            .clone()
            .ok_or(FeedError::MissingCredentials("ADAFRUIT_IO_KEY"))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(FeedError::Client)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username,
            key,
        })
    }

    fn data_url(&self, feed: Channel) -> String {
        format!(
            "{}/api/v2/{}/feeds/{}/data",
            self.base_url,
            self.username,
            feed.key()
        )
    }
}

#[async_trait]
impl CloudFeed for AdafruitIo {
    async fn send(&self, feed: Channel, value: f64) -> Result<(), FeedError> {
        let url = self.data_url(feed);
        debug!("Sending {} to {}", value, url);

        let response = self
            .http
            .post(&url)
            .header(KEY_HEADER, &self.key)
            .json(&json!({ "value": value }))
            .send()
            .await
            .map_err(|source| FeedError::Http {
                feed: feed.key(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FeedError::Status {
                feed: feed.key(),
                status: response.status(),
            });
        }
        Ok(())
    }

    async fn receive(&self, feed: Channel) -> Result<FeedValue, FeedError> {
        let url = format!("{}/last", self.data_url(feed));
        debug!("Fetching {}", url);

        let response = self
            .http
            .get(&url)
            .header(KEY_HEADER, &self.key)
            .send()
            .await
            .map_err(|source| FeedError::Http {
                feed: feed.key(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FeedError::Status {
                feed: feed.key(),
                status: response.status(),
            });
        }

        response
            .json::<FeedValue>()
            .await
            .map_err(|source| FeedError::Http {
                feed: feed.key(),
                source,
            })
    }
}
