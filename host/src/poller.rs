//! ==============================================================================
//! poller.rs - interval-driven fetch scheduler for one resource
//! ==============================================================================
//!
//! purpose:
//!     runs a fetch function on a fixed period and publishes its outcome as a
//!     FetchState. one Poller per resource; nothing is shared between them.
//!
//! lifecycle:
//!
//! ```text
//!     start() ──► [immediate tick] ──► interval task ──► tick() ──► fetch task
//!                                                          │            │
//!                                     skipped while ◄──────┘            │
//!                                     a fetch is pending                ▼
//!                                                           publish Success/Failure
//!                                                           (dropped after stop())
//! ```
//!
//! invariants:
//!     - at most one fetch in flight per resource (in_flight guard)
//!     - nothing is published once stop() has run
//!     - fetch errors and panics become Failure; the schedule never dies
//!
//! relationships:
//!     - used by: dashboard.rs (one poller per inspection resource)
//!     - feeds: snapshot.rs (via updates() / state())
//!
//! ==============================================================================

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::error::{ConfigError, FetchError};

/// transitions kept for slow subscribers before they start lagging
const UPDATE_CAPACITY: usize = 32;

/// Outcome of the most recent tick for a resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchState<T> {
    /// no fetch issued yet
    Idle,
    /// fetch in flight
    Loading,
    Success { data: T, fetched_at: DateTime<Utc> },
    Failure { message: String, fetched_at: DateTime<Utc> },
}

impl<T> FetchState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            FetchState::Success { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchState::Failure { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// What a poller publishes: the latest tick plus the last good value, which
/// survives Loading and Failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollState<T> {
    pub state: FetchState<T>,
    pub last_success: Option<T>,
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self {
            state: FetchState::Idle,
            last_success: None,
        }
    }
}

/// Schedule for one polled resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// tick period, must be > 0
    pub interval_ms: u64,
    /// opaque name, used in logs
    pub resource_id: String,
    /// fetch once before the first interval elapses
    pub immediate: bool,
}

impl PollConfig {
    pub fn new(resource_id: impl Into<String>, interval_ms: u64) -> Self {
        Self {
            interval_ms,
            resource_id: resource_id.into(),
            immediate: true,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidInterval {
                interval_ms: self.interval_ms,
            });
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, FetchError>> + Send + Sync>;

struct Shared<T> {
    resource_id: String,
    fetch: FetchFn<T>,
    state: watch::Sender<PollState<T>>,
    updates: broadcast::Sender<FetchState<T>>,
    in_flight: AtomicBool,
    stopped: AtomicBool,
    fetches: AtomicU64,
}

impl<T> Shared<T> {
    /// Raise the stop flag; true for the call that actually stopped.
    fn halt(&self) -> bool {
        let mut first = false;
        self.state.send_if_modified(|_| {
            first = !self.stopped.swap(true, Ordering::SeqCst);
            false
        });
        first
    }
}

impl<T> Shared<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Returns false when the poller was stopped and the state was left alone.
    ///
    /// The stop flag is read under the watch lock, the same lock `stop()`
    /// sets it under, so nothing lands once `stop()` has returned.
    fn publish(&self, next: FetchState<T>) -> bool {
        self.state.send_if_modified(|current| {
            if self.stopped.load(Ordering::SeqCst) {
                return false;
            }
            if let FetchState::Success { data, .. } = &next {
                current.last_success = Some(data.clone());
            }
            current.state = next.clone();
            // no subscribers is fine
            let _ = self.updates.send(next);
            true
        })
    }

    fn tick(self: &Arc<Self>) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            return false;
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(resource = %self.resource_id, "[POLL] fetch still pending, tick skipped");
            return false;
        }

        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.publish(FetchState::Loading);

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            // the fetch function may panic before it hands back a future
            let built = std::panic::catch_unwind(AssertUnwindSafe(|| (shared.fetch)()));
            let outcome = match built {
                Ok(fetch) => AssertUnwindSafe(fetch)
                    .catch_unwind()
                    .await
                    .unwrap_or(Err(FetchError::Panicked)),
                Err(_) => Err(FetchError::Panicked),
            };
            let fetched_at = Utc::now();

            let next = match outcome {
                Ok(data) => FetchState::Success { data, fetched_at },
                Err(e) => {
                    tracing::warn!(resource = %shared.resource_id, error = %e, "[POLL] fetch failed");
                    FetchState::Failure {
                        message: e.to_string(),
                        fetched_at,
                    }
                }
            };

            if !shared.publish(next) {
                tracing::debug!(resource = %shared.resource_id, "[POLL] result discarded, poller stopped");
            }
            shared.in_flight.store(false, Ordering::Release);
        });

        true
    }
}

/// Periodically fetches one resource and publishes the outcome.
///
/// Must be started from within a tokio runtime. Dropping the poller stops it.
pub struct Poller<T> {
    shared: Arc<Shared<T>>,
    schedule: JoinHandle<()>,
}

impl<T> Poller<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Validate `config` and begin scheduling `fetch`.
    ///
    /// With `immediate` set, one fetch is issued before this returns;
    /// otherwise the first fetch happens after one interval.
    pub fn start<F, Fut>(config: PollConfig, fetch: F) -> Result<Self, ConfigError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        config.validate()?;

        let fetch: FetchFn<T> = Arc::new(move || fetch().boxed());
        let (state, _) = watch::channel(PollState::default());
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);

        let shared = Arc::new(Shared {
            resource_id: config.resource_id.clone(),
            fetch,
            state,
            updates,
            in_flight: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            fetches: AtomicU64::new(0),
        });

        if config.immediate {
            shared.tick();
        }

        let period = config.interval();
        let ticker = Arc::clone(&shared);
        let schedule = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                ticker.tick();
            }
        });

        tracing::info!(
            resource = %config.resource_id,
            interval_ms = config.interval_ms,
            immediate = config.immediate,
            "[POLL] started"
        );

        Ok(Self { shared, schedule })
    }

    /// Out-of-schedule tick. Leaves the interval timer alone and respects the
    /// in-flight guard; returns whether a fetch was started.
    pub fn reload(&self) -> bool {
        self.shared.tick()
    }

    pub fn state(&self) -> PollState<T> {
        self.shared.state.borrow().clone()
    }

    pub fn fetch_state(&self) -> FetchState<T> {
        self.shared.state.borrow().state.clone()
    }

    /// Latest published state; coalesces intermediate transitions.
    pub fn watch(&self) -> watch::Receiver<PollState<T>> {
        self.shared.state.subscribe()
    }

    /// Every transition published from now on.
    pub fn updates(&self) -> broadcast::Receiver<FetchState<T>> {
        self.shared.updates.subscribe()
    }
}

impl<T> Poller<T> {
    /// Cancel the schedule. Idempotent; a fetch already running completes but
    /// its result is not published.
    pub fn stop(&self) {
        if !self.shared.halt() {
            return;
        }
        self.schedule.abort();
        tracing::info!(resource = %self.shared.resource_id, "[POLL] stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    pub fn resource_id(&self) -> &str {
        &self.shared.resource_id
    }

    /// Number of fetches started so far (skipped ticks are not counted).
    pub fn fetch_count(&self) -> u64 {
        self.shared.fetches.load(Ordering::Relaxed)
    }

    pub fn is_fetching(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
