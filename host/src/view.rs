//! ==============================================================================
//! view.rs - dashboard view-state
//! ==============================================================================
//!
//! purpose:
//!     turns poll states and snapshot pairs into the data a renderer needs:
//!     status banner, stat cards, image panel, advisory, history rows, error
//!     chips. pure functions only; nothing here holds state between calls.
//!
//! stale-while-revalidate:
//!     banner and stats come from the snapshot's `current`, i.e. the last good
//!     reading, so a failed tick shows an error chip but keeps the numbers.
//!
//! ==============================================================================

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use crate::domain::{Advisory, HistoryEntry, ImageCapture, Reading};
use crate::poller::{FetchState, PollState};
use crate::snapshot::SnapshotPair;

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusBanner {
    pub ok: bool,
    pub label: String,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatCard {
    pub label: &'static str,
    pub value: Option<String>,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagePanel {
    pub url: Option<String>,
    pub prediction: Option<String>,
    pub confidence: Option<f64>,
    /// the current capture shows a different image than the previous one
    pub changed: bool,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisoryPanel {
    pub title: String,
    pub action: String,
    pub description: Option<String>,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub id: u64,
    pub title: String,
    pub subtitle: String,
    pub ok: bool,
    pub thumbnail_url: Option<String>,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub any_loading: bool,
    pub status: StatusBanner,
    pub stats: Vec<StatCard>,
    pub previous_stats: Vec<StatCard>,
    pub image: ImagePanel,
    pub advisory: AdvisoryPanel,
    pub history: Vec<HistoryRow>,
    /// first history fetch still running, nothing to list yet
    pub history_loading: bool,
    pub history_error: Option<String>,
    pub errors: Vec<String>,
    pub readings: SnapshotPair<Reading>,
}

/// Everything the view is derived from.
pub struct ViewInputs<'a> {
    pub latest: &'a PollState<Option<Reading>>,
    pub image: &'a PollState<Option<ImageCapture>>,
    pub history: &'a PollState<Vec<HistoryEntry>>,
    pub advisory: &'a PollState<Option<Advisory>>,
    pub readings: &'a SnapshotPair<Reading>,
    pub images: &'a SnapshotPair<ImageCapture>,
}

impl DashboardView {
    pub fn build(inputs: &ViewInputs<'_>) -> Self {
        let current = inputs.readings.current.as_ref();
        let waiting = inputs.latest.state.is_loading() && current.is_none();

        let errors = [
            inputs.latest.state.error(),
            inputs.image.state.error(),
            inputs.history.state.error(),
            inputs.advisory.state.error(),
        ]
        .into_iter()
        .enumerate()
        .filter_map(|(i, err)| err.map(|e| format!("Err {}: {}", i + 1, e)))
        .collect();

        Self {
            any_loading: inputs.latest.state.is_loading()
                || inputs.image.state.is_loading()
                || inputs.history.state.is_loading()
                || inputs.advisory.state.is_loading(),
            status: status_banner(current, waiting),
            stats: stat_cards(current, waiting),
            previous_stats: stat_cards(inputs.readings.previous.as_ref(), false),
            image: image_panel(inputs.image, inputs.images),
            advisory: advisory_panel(inputs.advisory),
            history: history_rows(inputs.history),
            history_loading: inputs.history.state.is_loading()
                && inputs.history.last_success.is_none(),
            history_error: inputs.history.state.error().map(str::to_string),
            errors,
            readings: inputs.readings.clone(),
        }
    }
}

fn status_banner(reading: Option<&Reading>, loading: bool) -> StatusBanner {
    let ok = reading.map(|r| r.passed).unwrap_or(false);
    let label = match reading.and_then(|r| r.detected_label.as_deref()) {
        Some(custom) => custom.to_string(),
        None if ok => "Componente detectado".to_string(),
        None => "No detectado".to_string(),
    };
    StatusBanner { ok, label, loading }
}

fn stat_cards(reading: Option<&Reading>, loading: bool) -> Vec<StatCard> {
    vec![
        StatCard {
            label: "Humedad",
            value: reading.map(|r| format_stat(r.humidity, "%")),
            loading,
        },
        StatCard {
            label: "Temperatura",
            value: reading.map(|r| format_stat(r.temperature, "°C")),
            loading,
        },
        StatCard {
            label: "Luz ambiental",
            value: reading.map(|r| format_stat(r.luminosity, " lx")),
            loading,
        },
    ]
}

fn image_panel(
    poll: &PollState<Option<ImageCapture>>,
    images: &SnapshotPair<ImageCapture>,
) -> ImagePanel {
    let current = images.current.as_ref();
    let changed = match (current, images.previous.as_ref()) {
        (Some(now), Some(before)) => now.url != before.url,
        _ => false,
    };

    ImagePanel {
        url: current.map(|c| c.url.clone()),
        prediction: current.and_then(|c| c.prediction.clone()),
        confidence: current.and_then(|c| c.confidence),
        changed,
        loading: poll.state.is_loading() && current.is_none(),
        error: poll.state.error().map(str::to_string),
    }
}

fn advisory_panel(poll: &PollState<Option<Advisory>>) -> AdvisoryPanel {
    let advisory = poll.last_success.as_ref().and_then(|a| a.as_ref());
    AdvisoryPanel {
        title: advisory
            .and_then(|a| a.title.clone())
            .unwrap_or_else(|| "Advertencia".to_string()),
        action: advisory
            .and_then(|a| a.action.clone())
            .unwrap_or_else(|| "Acción Recomendada".to_string()),
        description: advisory.and_then(|a| a.description.clone()),
        loading: poll.state.is_loading() && advisory.is_none(),
    }
}

fn history_rows(poll: &PollState<Vec<HistoryEntry>>) -> Vec<HistoryRow> {
    // a failed refresh shows history_error instead of a stale list
    if let FetchState::Failure { .. } = poll.state {
        return Vec::new();
    }

    poll.last_success
        .iter()
        .flatten()
        .map(|entry| HistoryRow {
            id: entry.id,
            title: entry.title.clone(),
            subtitle: entry.subtitle.clone(),
            ok: entry.ok,
            thumbnail_url: entry.thumbnail_url.clone(),
            date: format_date(entry.captured_at),
            time: format_time(entry.captured_at),
        })
        .collect()
}

/// `30.58` + `"%"` -> `"30.58%"`; whole numbers print without decimals.
pub fn format_stat(value: f64, unit: &str) -> String {
    format!("{}{}", value, unit)
}

/// `"02 de enero de 2025"`
pub fn format_date(at: DateTime<Utc>) -> String {
    format!(
        "{:02} de {} de {}",
        at.day(),
        MONTHS_ES[at.month0() as usize],
        at.year()
    )
}

/// 24-hour `"HH:MM:SS"`
pub fn format_time(at: DateTime<Utc>) -> String {
    at.format("%H:%M:%S").to_string()
}
