//! ==============================================================================
//! snapshot.rs - two-generation view over a polled resource
//! ==============================================================================
//!
//! purpose:
//!     keeps the current and the previous successful value of a "latest"
//!     resource so the dashboard can show last vs second-to-last side by side.
//!
//! ordering:
//!     a value is only installed when its capture time is strictly newer than
//!     the current one. a slow tick that completes after a faster one, or the
//!     same reading delivered twice, is dropped without being an error.
//!
//! ==============================================================================

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::poller::FetchState;

/// Anything carrying the time it was captured at.
pub trait Captured {
    fn captured_at(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotPair<T> {
    pub current: Option<T>,
    pub previous: Option<T>,
}

impl<T> Default for SnapshotPair<T> {
    fn default() -> Self {
        Self {
            current: None,
            previous: None,
        }
    }
}

/// What an update did to the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Advanced,
    /// same capture time as `current`
    Duplicate,
    /// older than `current`
    OutOfOrder,
    /// not a success, or a success without data
    Unchanged,
}

#[derive(Debug)]
pub struct SnapshotTracker<T> {
    pair: SnapshotPair<T>,
}

impl<T> Default for SnapshotTracker<T> {
    fn default() -> Self {
        Self {
            pair: SnapshotPair::default(),
        }
    }
}

impl<T> SnapshotTracker<T>
where
    T: Captured + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_update(&mut self, state: &FetchState<T>) -> UpdateOutcome {
        match state {
            FetchState::Success { data, .. } => self.offer(data.clone()),
            _ => UpdateOutcome::Unchanged,
        }
    }

    /// For resources that answer "no data yet" with `Success(None)`.
    pub fn on_latest(&mut self, state: &FetchState<Option<T>>) -> UpdateOutcome {
        match state {
            FetchState::Success {
                data: Some(data), ..
            } => self.offer(data.clone()),
            _ => UpdateOutcome::Unchanged,
        }
    }

    /// Install `value` if it is newer than `current`.
    pub fn offer(&mut self, value: T) -> UpdateOutcome {
        if let Some(current) = &self.pair.current {
            match value.captured_at().cmp(&current.captured_at()) {
                Ordering::Less => return UpdateOutcome::OutOfOrder,
                Ordering::Equal => return UpdateOutcome::Duplicate,
                Ordering::Greater => {}
            }
        }
        self.advance(value);
        UpdateOutcome::Advanced
    }

    /// Fill in an older value fetched out of band (the second-to-last
    /// reading at startup). Lands in `previous` when it sits between the
    /// current and the previous value; a value newer than `current` is
    /// treated like `offer`.
    pub fn backfill(&mut self, value: T) -> UpdateOutcome {
        let current = match self.pair.current.as_ref().map(Captured::captured_at) {
            Some(at) => at,
            None => return self.offer(value),
        };

        let at = value.captured_at();
        match at.cmp(&current) {
            Ordering::Greater => return self.offer(value),
            Ordering::Equal => return UpdateOutcome::Duplicate,
            Ordering::Less => {}
        }

        match self.pair.previous.as_ref().map(|p| at.cmp(&p.captured_at())) {
            None | Some(Ordering::Greater) => {
                self.pair.previous = Some(value);
                UpdateOutcome::Advanced
            }
            Some(Ordering::Equal) => UpdateOutcome::Duplicate,
            Some(Ordering::Less) => UpdateOutcome::OutOfOrder,
        }
    }

    pub fn advance(&mut self, value: T) {
        self.pair.previous = self.pair.current.replace(value);
    }

    pub fn snapshot(&self) -> &SnapshotPair<T> {
        &self.pair
    }
}
