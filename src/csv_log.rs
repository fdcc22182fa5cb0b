//! Append-only CSV files, one per channel
//!
//! Each line is `<YYYY-mm-dd HH:MM:SS>, <value with 2 decimals>`. The file is
//! opened, appended to and closed for every message.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::reading::{Channel, TIMESTAMP_FORMAT};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CsvConfig {
    pub directory: PathBuf,
}

impl Default for CsvConfig {
    fn default() -> Self {
        let mut directory = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        directory.push("sensehat-telemetry");
        directory.push("csv");
        Self { directory }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CsvLogError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Payload is not a number: {raw:?}")]
    InvalidPayload { raw: String },
}

pub fn file_name(channel: Channel) -> &'static str {
    match channel {
        Channel::Temperature => "Temperature.csv",
        Channel::Pressure => "Barometric pressure.csv",
        Channel::Humidity => "Humidity.csv",
        Channel::Magnetometer => "Magnetometer.csv",
    }
}

/// Formats one CSV line. An empty payload is recorded as zero.
pub fn format_line(payload: &[u8], at: &NaiveDateTime) -> Result<String, CsvLogError> {
    let raw = String::from_utf8_lossy(payload);
    let trimmed = raw.trim();
    let value: f64 = if trimmed.is_empty() {
        0.0
    } else {
        trimmed.parse().map_err(|_| CsvLogError::InvalidPayload {
            raw: raw.to_string(),
        })?
    };
    Ok(format!("{}, {:.2}\n", at.format(TIMESTAMP_FORMAT), value))
}

#[derive(Debug, Clone)]
pub struct CsvLogger {
    directory: PathBuf,
}

impl CsvLogger {
    /// Makes sure `directory` exists.
    pub async fn create(directory: &Path) -> Result<Self, CsvLogError> {
        let exists = tokio::fs::try_exists(directory)
            .await
            .map_err(|source| CsvLogError::Io {
                path: directory.to_path_buf(),
                source,
            })?;

        if exists {
            info!("Directory already exists: {}", directory.display());
        } else {
            tokio::fs::create_dir_all(directory)
                .await
                .map_err(|source| CsvLogError::Io {
                    path: directory.to_path_buf(),
                    source,
                })?;
            info!("Directory created: {}", directory.display());
        }

        Ok(Self {
            directory: directory.to_path_buf(),
        })
    }

    pub fn path(&self, channel: Channel) -> PathBuf {
        self.directory.join(file_name(channel))
    }

    /// Appends one line for `payload` to the channel's file and returns its path.
    pub async fn append(
        &self,
        channel: Channel,
        payload: &[u8],
        at: &NaiveDateTime,
    ) -> Result<PathBuf, CsvLogError> {
        let line = format_line(payload, at)?;
        let path = self.path(channel);
        debug!("Writing data to {}", path.display());

        let io_error = |source: std::io::Error| CsvLogError::Io {
            path: path.clone(),
            source,
        };
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_error)?;
        file.write_all(line.as_bytes()).await.map_err(io_error)?;
        file.flush().await.map_err(io_error)?;

        Ok(path)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;

    /// Fresh directory under the system temp dir, unique per test.
    pub fn scratch_dir(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        std::env::temp_dir().join(format!(
            "sensehat-telemetry-{}-{}-{}",
            name,
            std::process::id(),
            nanos
        ))
    }
}
