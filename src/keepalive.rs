//! Periodic keep-alive ping
//!
//! Hosting platforms that idle out quiet services can be kept awake by having
//! the service request its own public URL on an interval. Failures are logged
//! and broadcast, never fatal.

use crate::config::KeepAliveConfig;
use crate::error::{Error, Result};
use crate::types::Event;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Background pinger for a single URL
pub struct KeepAlive {
    client: reqwest::Client,
    url: String,
    interval: Duration,
    event_tx: broadcast::Sender<Event>,
}

impl KeepAlive {
    /// Create a pinger, or `None` when no URL is configured
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn from_config(
        config: &KeepAliveConfig,
        event_tx: broadcast::Sender<Event>,
    ) -> Result<Option<Self>> {
        let Some(url) = config.url.clone() else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Some(Self {
            client,
            url,
            interval: config.interval.max(Duration::from_millis(1)),
            event_tx,
        }))
    }

    /// Ping once
    pub async fn ping(&self) -> std::result::Result<(), String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("keep-alive target returned HTTP {}", status))
        }
    }

    /// Ping every interval until `cancel` fires; the first ping happens after one interval
    pub async fn run(self, cancel: CancellationToken) {
        info!(url = %self.url, interval_secs = self.interval.as_secs_f64(), "Keep-alive started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Keep-alive shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            match self.ping().await {
                Ok(()) => debug!(url = %self.url, "Keep-alive ping ok"),
                Err(error) => {
                    warn!(url = %self.url, error = %error, "Keep-alive ping failed");
                    self.event_tx.send(Event::KeepAliveFailed { error }).ok();
                }
            }
        }
    }
}
