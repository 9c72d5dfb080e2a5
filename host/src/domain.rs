use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::Captured;

/// one inspection sample as served by `/api/sensores/ultimo`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Reading {
    /// relative humidity (0-100%)
    pub humidity: f64,

    /// temperature in celsius
    pub temperature: f64,

    /// ambient light in lux
    #[serde(alias = "lux")]
    pub luminosity: f64,

    /// pass/fail verdict for the inspected component
    #[serde(alias = "ok")]
    pub passed: bool,

    /// captured image, if the inspection produced one
    #[serde(default, alias = "imageUrl")]
    pub image_url: Option<String>,

    /// classifier confidence (0.0-1.0)
    #[serde(default)]
    pub confidence: Option<f64>,

    /// capture time (ISO-8601)
    #[serde(alias = "timestamp", alias = "capturedAt")]
    pub captured_at: DateTime<Utc>,

    /// replaces the banner's detected / not detected wording when present
    #[serde(default, alias = "detectedLabel")]
    pub detected_label: Option<String>,
}

impl Captured for Reading {
    fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

/// latest inspection image and the classifier verdict for it
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ImageCapture {
    pub url: String,
    #[serde(default)]
    pub prediction: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// the image endpoint may omit it; the receive time stands in then
    #[serde(default = "Utc::now", alias = "timestamp", alias = "capturedAt")]
    pub captured_at: DateTime<Utc>,
}

impl Captured for ImageCapture {
    fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

/// one row of the inspection history
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct HistoryEntry {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(alias = "dateISO", alias = "date_iso")]
    pub captured_at: DateTime<Utc>,
    pub ok: bool,
    #[serde(default, alias = "thumbnailUrl")]
    pub thumbnail_url: Option<String>,
}

/// warning banner plus the recommended action
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Advisory {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "label")]
    pub action: Option<String>,
}
