//! Distance-matrix API client used by `/api/distance`

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DistanceConfig;

#[derive(Error, Debug)]
pub enum DistanceError {
    #[error("Distance API key is not configured")]
    MissingApiKey,
    #[error("Distance API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Distance API returned {status}")]
    Upstream { status: u16, body: String },
    #[error("Could not determine distance: {0}")]
    Unparseable(String),
}

/// Proxies origin/destination pairs to a Google-style distance-matrix API
#[derive(Clone)]
pub struct DistanceClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl DistanceClient {
    pub fn new(config: &DistanceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.resolved_api_key(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Driving distance in kilometers between two addresses.
    pub async fn distance_km(&self, origin: &str, destination: &str) -> Result<f64, DistanceError> {
        let api_key = self.api_key.as_deref().ok_or(DistanceError::MissingApiKey)?;

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("origins", origin),
                ("destinations", destination),
                ("key", api_key),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Distance API returned an error status");
            return Err(DistanceError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| DistanceError::Unparseable(e.to_string()))?;

        let km = parse_distance_km(&body)?;
        debug!(km = km, "Distance resolved");
        Ok(km)
    }
}

/// `rows[0].elements[0].distance.value` (meters) → kilometers.
pub fn parse_distance_km(body: &Value) -> Result<f64, DistanceError> {
    let element = body
        .pointer("/rows/0/elements/0")
        .ok_or_else(|| DistanceError::Unparseable(upstream_status(body)))?;

    element
        .pointer("/distance/value")
        .and_then(Value::as_f64)
        .map(|meters| meters / 1000.0)
        .ok_or_else(|| {
            let status = element
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("no distance in response");
            DistanceError::Unparseable(status.to_string())
        })
}

fn upstream_status(body: &Value) -> String {
    let status = body.get("status").and_then(Value::as_str).unwrap_or("no rows in response");
    match body.get("error_message").and_then(Value::as_str) {
        Some(message) => format!("{}: {}", status, message),
        None => status.to_string(),
    }
}
