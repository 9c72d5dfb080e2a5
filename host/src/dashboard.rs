//! ==============================================================================
//! dashboard.rs - the inspection dashboard's pollers and snapshots
//! ==============================================================================
//!
//! purpose:
//!     starts one poller per inspection resource and keeps the two snapshot
//!     trackers (reading, image) fed from their pollers.
//!
//! architecture:
//!
//! ```text
//!     ┌────────────────── Dashboard ──────────────────┐
//!     │  previous (once) ──────► SnapshotTracker<Reading>
//!     │  latest ──► follower ──► SnapshotTracker<Reading>
//!     │  image  ──► follower ──► SnapshotTracker<ImageCapture>
//!     │  history                                      │
//!     │  advisory                                     │
//!     └──────────────────────┬────────────────────────┘
//!                            │ view()
//!                            ▼
//!                      DashboardView (view.rs)
//! ```
//!
//! teardown:
//!     stop() (or dropping the Dashboard) stops every poller and aborts the
//!     followers. a failure while starting drops the pollers already started,
//!     which stops them as well.
//!
//! ==============================================================================

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::PollingConfig;
use crate::domain::{Advisory, HistoryEntry, ImageCapture, Reading};
use crate::error::ConfigError;
use crate::poller::{FetchState, Poller};
use crate::snapshot::{Captured, SnapshotPair, SnapshotTracker, UpdateOutcome};
use crate::source::InspectionSource;
use crate::view::{DashboardView, ViewInputs};

pub struct Dashboard {
    latest: Poller<Option<Reading>>,
    image: Poller<Option<ImageCapture>>,
    history: Poller<Vec<HistoryEntry>>,
    advisory: Poller<Option<Advisory>>,
    readings: Arc<RwLock<SnapshotTracker<Reading>>>,
    images: Arc<RwLock<SnapshotTracker<ImageCapture>>>,
    followers: Vec<JoinHandle<()>>,
}

impl Dashboard {
    /// Start polling every resource of `source` on the `polling` schedule.
    pub fn start(
        polling: &PollingConfig,
        source: Arc<dyn InspectionSource>,
        show_readings: bool,
    ) -> Result<Self, ConfigError> {
        let src = Arc::clone(&source);
        let latest = Poller::start(polling.for_resource("latest"), move || {
            let src = Arc::clone(&src);
            async move { src.latest_reading().await }
        })?;

        let src = Arc::clone(&source);
        let image = Poller::start(polling.for_resource("image"), move || {
            let src = Arc::clone(&src);
            async move { src.latest_image().await }
        })?;

        let src = Arc::clone(&source);
        let history = Poller::start(polling.for_resource("history"), move || {
            let src = Arc::clone(&src);
            async move { src.history().await }
        })?;

        let src = Arc::clone(&source);
        let advisory = Poller::start(polling.for_resource("advisory"), move || {
            let src = Arc::clone(&src);
            async move { src.advisory().await }
        })?;

        let readings = Arc::new(RwLock::new(SnapshotTracker::new()));
        let images = Arc::new(RwLock::new(SnapshotTracker::new()));

        let followers = vec![
            seed_previous(Arc::clone(&source), Arc::clone(&readings)),
            follow(&latest, Arc::clone(&readings), move |r: &Reading| {
                if show_readings {
                    tracing::info!(
                        "[READING] Temp: {:.1}°C | Humidity: {:.1}% | Light: {:.0} lx | {}",
                        r.temperature,
                        r.humidity,
                        r.luminosity,
                        if r.passed { "PASS" } else { "FAIL" }
                    );
                }
            }),
            follow(&image, Arc::clone(&images), |c: &ImageCapture| {
                tracing::debug!("[IMAGE] New capture {}", c.url);
            }),
        ];

        Ok(Self {
            latest,
            image,
            history,
            advisory,
            readings,
            images,
            followers,
        })
    }

    /// Out-of-schedule refresh of every resource; returns how many fetches
    /// started (resources with a fetch already pending are skipped).
    pub fn reload_all(&self) -> usize {
        [
            self.latest.reload(),
            self.image.reload(),
            self.history.reload(),
            self.advisory.reload(),
        ]
        .into_iter()
        .filter(|started| *started)
        .count()
    }

    pub async fn view(&self) -> DashboardView {
        let latest = self.latest.state();
        let image = self.image.state();
        let history = self.history.state();
        let advisory = self.advisory.state();
        let readings = self.readings.read().await.snapshot().clone();
        let images = self.images.read().await.snapshot().clone();

        DashboardView::build(&ViewInputs {
            latest: &latest,
            image: &image,
            history: &history,
            advisory: &advisory,
            readings: &readings,
            images: &images,
        })
    }

    /// Current and previous reading.
    pub async fn readings(&self) -> SnapshotPair<Reading> {
        self.readings.read().await.snapshot().clone()
    }

    pub fn latest_state(&self) -> FetchState<Option<Reading>> {
        self.latest.fetch_state()
    }

    pub fn stop(&self) {
        self.latest.stop();
        self.image.stop();
        self.history.stop();
        self.advisory.stop();
        for follower in &self.followers {
            follower.abort();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.latest.is_stopped()
            && self.image.is_stopped()
            && self.history.is_stopped()
            && self.advisory.is_stopped()
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One-off fetch of the second-to-last reading so the dashboard can show
/// last vs previous before the second poll. A failure only costs that.
fn seed_previous(
    source: Arc<dyn InspectionSource>,
    tracker: Arc<RwLock<SnapshotTracker<Reading>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match source.previous_reading().await {
            Ok(Some(reading)) => {
                let outcome = tracker.write().await.backfill(reading);
                tracing::debug!(?outcome, "[SNAPSHOT] previous reading seeded");
            }
            Ok(None) => tracing::debug!("[SNAPSHOT] no previous reading yet"),
            Err(e) => tracing::warn!(error = %e, "[SNAPSHOT] previous reading unavailable"),
        }
    })
}

/// Feed `tracker` from every transition of `poller`.
fn follow<T, F>(
    poller: &Poller<Option<T>>,
    tracker: Arc<RwLock<SnapshotTracker<T>>>,
    on_advance: F,
) -> JoinHandle<()>
where
    T: Captured + Clone + Send + Sync + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    let resource = poller.resource_id().to_string();
    let mut updates = poller.updates();
    // a result published before we subscribed is only visible here;
    // seeing it twice is a Duplicate
    let seed = poller.fetch_state();

    tokio::spawn(async move {
        apply(&resource, &tracker, &seed, &on_advance).await;
        loop {
            match updates.recv().await {
                Ok(state) => apply(&resource, &tracker, &state, &on_advance).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(resource = %resource, skipped, "[SNAPSHOT] follower lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn apply<T, F>(
    resource: &str,
    tracker: &RwLock<SnapshotTracker<T>>,
    state: &FetchState<Option<T>>,
    on_advance: &F,
) where
    T: Captured + Clone,
    F: Fn(&T),
{
    let mut tracker = tracker.write().await;
    match tracker.on_latest(state) {
        UpdateOutcome::Advanced => {
            if let Some(current) = &tracker.snapshot().current {
                on_advance(current);
            }
        }
        UpdateOutcome::OutOfOrder => {
            tracing::debug!(resource = %resource, "[SNAPSHOT] dropped out-of-order update");
        }
        UpdateOutcome::Duplicate => {
            tracing::trace!(resource = %resource, "[SNAPSHOT] duplicate update");
        }
        UpdateOutcome::Unchanged => {}
    }
}
