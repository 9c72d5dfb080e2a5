//! ==============================================================================
//! api.rs - inspection HTTP API client
//! ==============================================================================
//!
//! purpose:
//!     request construction and JSON decoding for the Solvex inspection API.
//!     the polling core only sees Result<T, FetchError>:
//!     - 2xx with a body   -> Ok(Some(value))
//!     - 204 No Content    -> Ok(None) ("no data yet", not an error)
//!     - any other status  -> FetchError::Status
//!     - network/timeout   -> FetchError::Transport
//!     - unexpected body   -> FetchError::Decode
//!
//! ==============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::config::{ApiConfig, EndpointsConfig};
use crate::domain::{Advisory, HistoryEntry, ImageCapture, Reading};
use crate::error::{ConfigError, FetchError};
use crate::source::InspectionSource;

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    endpoints: EndpointsConfig,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ConfigError::Invalid {
                message: format!("failed to build http client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            endpoints: config.endpoints.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path`, mapping 204 to `None`
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::trace!("[API] GET {}", url);

        let res = self
            .client
            .get(&url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(FetchError::transport)?;

        let status = res.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        res.json::<T>().await.map(Some).map_err(FetchError::decode)
    }
}

#[async_trait]
impl InspectionSource for ApiClient {
    async fn latest_reading(&self) -> Result<Option<Reading>, FetchError> {
        self.get(&self.endpoints.latest).await
    }

    async fn previous_reading(&self) -> Result<Option<Reading>, FetchError> {
        self.get(&self.endpoints.previous).await
    }

    async fn latest_image(&self) -> Result<Option<ImageCapture>, FetchError> {
        self.get(&self.endpoints.image).await
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, FetchError> {
        Ok(self.get(&self.endpoints.history).await?.unwrap_or_default())
    }

    async fn advisory(&self) -> Result<Option<Advisory>, FetchError> {
        self.get(&self.endpoints.advisory).await
    }
}
