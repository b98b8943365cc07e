//! Reachability check against the submission server

use std::sync::Arc;

use reqwest::Method;
use shiftsync_core::NetworkMonitor;
use shiftsync_domain::{Result, ShiftSyncError, SubmissionConfig};
use tracing::debug;

use crate::http::HttpClient;

/// GETs a health URL; any HTTP response counts as reachable
#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
    client: HttpClient,
    url: String,
}

impl ConnectivityProbe {
    pub fn new(client: HttpClient, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }

    /// Probe built from `submission.health_path`
    ///
    /// # Errors
    ///
    /// Returns `ShiftSyncError::Config` if no health path is configured.
    pub fn from_config(config: &SubmissionConfig) -> Result<Self> {
        let path = config.health_path.as_deref().ok_or_else(|| {
            ShiftSyncError::Config("submission.health_path is not configured".to_string())
        })?;
        let url = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Ok(Self::new(HttpClient::from_config(config)?, url))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn check(&self) -> bool {
        match self.client.send(self.client.request(Method::GET, &self.url)).await {
            Ok(response) => {
                debug!(status = %response.status(), "connectivity probe answered");
                true
            }
            Err(err) => {
                debug!(error = %err, "connectivity probe failed");
                false
            }
        }
    }

    /// Probe and publish the result; returns the observed state
    pub async fn refresh(&self, monitor: &Arc<NetworkMonitor>) -> bool {
        let online = self.check().await;
        monitor.set_online(online);
        online
    }
}
