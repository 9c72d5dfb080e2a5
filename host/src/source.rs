//! ==============================================================================
//! source.rs - Inspection Data Sources
//! ==============================================================================
//!
//! purpose:
//!     one interface for "where inspection data comes from", so the pollers
//!     don't care whether they talk to the real API or to in-memory mocks.
//!
//! implementations:
//!     - ApiClient (api.rs): the inspection HTTP API
//!     - MockSource: canned values after an artificial delay
//!     - FallbackSource: the API, falling back to the mock when a call fails
//!
//! relationships:
//!     - used by: dashboard.rs (each poller's fetch function calls one method)
//!     - built by: build_source() from [mocks] / [api] config
//!
//! ==============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::api::ApiClient;
use crate::config::HostConfig;
use crate::domain::{Advisory, HistoryEntry, ImageCapture, Reading};
use crate::error::{ConfigError, FetchError};

/// Fetch operations the dashboard polls. `Ok(None)` means "no data yet".
#[async_trait]
pub trait InspectionSource: Send + Sync {
    async fn latest_reading(&self) -> Result<Option<Reading>, FetchError>;
    /// the reading before the latest one
    async fn previous_reading(&self) -> Result<Option<Reading>, FetchError>;
    async fn latest_image(&self) -> Result<Option<ImageCapture>, FetchError>;
    async fn history(&self) -> Result<Vec<HistoryEntry>, FetchError>;
    async fn advisory(&self) -> Result<Option<Advisory>, FetchError>;
}

// ==============================================================================================
// MOCK IMPLEMENTATION
// ==============================================================================================

pub const MOCK_IMAGE_URL: &str = "https://via.placeholder.com/800x600?text=Inspeccion";

#[derive(Debug, Clone)]
pub struct MockSource {
    delay: Duration,
}

impl MockSource {
    pub fn new(delay: Duration) -> Self {
        tracing::info!(delay_ms = delay.as_millis() as u64, "[SOURCE] Using MOCK inspection data");
        Self { delay }
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn reading() -> Reading {
        Reading {
            humidity: 30.58,
            temperature: 28.0,
            luminosity: 120.0,
            passed: true,
            image_url: Some(MOCK_IMAGE_URL.to_string()),
            confidence: Some(0.97),
            captured_at: Utc::now(),
            detected_label: None,
        }
    }
}

#[async_trait]
impl InspectionSource for MockSource {
    async fn latest_reading(&self) -> Result<Option<Reading>, FetchError> {
        self.pause().await;
        let reading = Self::reading();
        tracing::debug!("[MOCK] Reading at {}", reading.captured_at);
        Ok(Some(reading))
    }

    async fn previous_reading(&self) -> Result<Option<Reading>, FetchError> {
        self.pause().await;
        Ok(Some(Reading {
            humidity: 31.2,
            temperature: 27.5,
            luminosity: 118.0,
            captured_at: Utc::now() - chrono::Duration::seconds(15),
            ..Self::reading()
        }))
    }

    async fn latest_image(&self) -> Result<Option<ImageCapture>, FetchError> {
        self.pause().await;
        Ok(Some(ImageCapture {
            url: MOCK_IMAGE_URL.to_string(),
            prediction: Some("Componente detectado".to_string()),
            confidence: Some(0.97),
            captured_at: Utc::now(),
        }))
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, FetchError> {
        self.pause().await;
        let now = Utc::now();
        Ok(vec![
            HistoryEntry {
                id: 1,
                title: "Componente 1".to_string(),
                subtitle: "Componente correcto".to_string(),
                captured_at: now - chrono::Duration::days(2),
                ok: true,
                thumbnail_url: None,
            },
            HistoryEntry {
                id: 2,
                title: "Componente 2".to_string(),
                subtitle: "Componente defectuoso".to_string(),
                captured_at: now - chrono::Duration::days(1),
                ok: false,
                thumbnail_url: None,
            },
        ])
    }

    async fn advisory(&self) -> Result<Option<Advisory>, FetchError> {
        self.pause().await;
        Ok(Some(Advisory {
            title: Some("Advertencia".to_string()),
            description: None,
            action: Some("Acción Recomendada".to_string()),
        }))
    }
}

// ==============================================================================================
// FALLBACK (real source first, mock on failure)
// ==============================================================================================

pub struct FallbackSource<P> {
    primary: P,
    mock: MockSource,
}

impl<P: InspectionSource> FallbackSource<P> {
    pub fn new(primary: P, mock: MockSource) -> Self {
        Self { primary, mock }
    }
}

macro_rules! with_fallback {
    ($self:ident, $op:ident) => {
        match $self.primary.$op().await {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(error = %e, "[SOURCE] {} failed, serving mock data", stringify!($op));
                $self.mock.$op().await
            }
        }
    };
}

#[async_trait]
impl<P: InspectionSource> InspectionSource for FallbackSource<P> {
    async fn latest_reading(&self) -> Result<Option<Reading>, FetchError> {
        with_fallback!(self, latest_reading)
    }

    async fn previous_reading(&self) -> Result<Option<Reading>, FetchError> {
        with_fallback!(self, previous_reading)
    }

    async fn latest_image(&self) -> Result<Option<ImageCapture>, FetchError> {
        with_fallback!(self, latest_image)
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, FetchError> {
        with_fallback!(self, history)
    }

    async fn advisory(&self) -> Result<Option<Advisory>, FetchError> {
        with_fallback!(self, advisory)
    }
}

/// Pick the source described by `[mocks]` and `[api]`.
pub fn build_source(config: &HostConfig) -> Result<Arc<dyn InspectionSource>, ConfigError> {
    let mock = || MockSource::new(Duration::from_millis(config.mocks.delay_ms));

    if config.mocks.enabled {
        return Ok(Arc::new(mock()));
    }

    let client = ApiClient::new(&config.api)?;
    if config.mocks.fallback {
        Ok(Arc::new(FallbackSource::new(client, mock())))
    } else {
        Ok(Arc::new(client))
    }
}
