//! Poller + SnapshotTracker working together on a paused clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use solvex_host::domain::Reading;
use solvex_host::error::FetchError;
use solvex_host::poller::{FetchState, PollConfig, Poller};
use solvex_host::snapshot::{SnapshotTracker, UpdateOutcome};
use tokio::sync::broadcast;
use tokio::time::sleep;

fn ts(iso: &str) -> DateTime<Utc> {
    iso.parse().unwrap()
}

fn reading(iso: &str) -> Reading {
    Reading {
        humidity: 30.58,
        temperature: 28.0,
        luminosity: 120.0,
        passed: true,
        image_url: None,
        confidence: None,
        captured_at: ts(iso),
        detected_label: None,
    }
}

fn config(interval_ms: u64, immediate: bool) -> PollConfig {
    PollConfig {
        interval_ms,
        resource_id: "latest".to_string(),
        immediate,
    }
}

fn drain(
    updates: &mut broadcast::Receiver<FetchState<Reading>>,
    tracker: &mut SnapshotTracker<Reading>,
) -> Vec<UpdateOutcome> {
    let mut outcomes = Vec::new();
    while let Ok(state) = updates.try_recv() {
        outcomes.push(tracker.on_update(&state));
    }
    outcomes
}

#[tokio::test(start_paused = true)]
async fn immediate_start_then_one_interval_keeps_previous_reading() -> anyhow::Result<()> {
    // Arrange
    let stamps = ["2025-01-01T00:00:00Z", "2025-01-01T00:00:01Z"];
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let fetch = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let next = reading(stamps[n.min(1)]);
        async move { Ok::<_, FetchError>(next) }
    };

    let poller = Poller::start(config(1000, true), fetch)?;
    let mut updates = poller.updates();
    let mut tracker = SnapshotTracker::new();

    // Act & Assert: first fetch lands well before the first interval
    sleep(Duration::from_millis(10)).await;
    let state = poller.fetch_state();
    assert_eq!(
        state.data().map(|r| r.captured_at),
        Some(ts("2025-01-01T00:00:00Z"))
    );
    drain(&mut updates, &mut tracker);
    assert_eq!(tracker.snapshot().previous, None);

    sleep(Duration::from_millis(1000)).await;
    drain(&mut updates, &mut tracker);

    let pair = tracker.snapshot();
    assert_eq!(
        pair.current.as_ref().map(|r| r.captured_at),
        Some(ts("2025-01-01T00:00:01Z"))
    );
    assert_eq!(
        pair.previous.as_ref().map(|r| r.captured_at),
        Some(ts("2025-01-01T00:00:00Z"))
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn elapsed_intervals_bound_the_tick_count() -> anyhow::Result<()> {
    for n in [1u64, 3, 7] {
        for immediate in [false, true] {
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&calls);
            let fetch = move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, FetchError>(()) }
            };

            let poller = Poller::start(config(400, immediate), fetch)?;
            sleep(Duration::from_millis(400 * n + 5)).await;
            poller.stop();

            let ticks = calls.load(Ordering::SeqCst) as u64;
            assert!(
                (n..=n + 1).contains(&ticks),
                "n={} immediate={} ticks={}",
                n,
                immediate,
                ticks
            );
        }
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_means_no_further_mutation() -> anyhow::Result<()> {
    // Arrange
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let fetch = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            sleep(Duration::from_millis(300)).await;
            Ok::<_, FetchError>(n)
        }
    };
    let poller = Poller::start(config(1000, true), fetch)?;
    let mut watch = poller.watch();

    // a fetch is in flight when we stop
    sleep(Duration::from_millis(1100)).await;
    assert!(poller.fetch_state().is_loading());
    watch.borrow_and_update();

    // Act
    poller.stop();
    sleep(Duration::from_secs(30)).await;

    // Assert
    assert!(!watch.has_changed()?);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(poller.state().last_success, Some(0));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn slow_response_cannot_overwrite_a_fresher_one() -> anyhow::Result<()> {
    // two requests for the same logical resource race; the older one finishes last
    let slow = Poller::start(config(60_000, true), || async {
        sleep(Duration::from_millis(1500)).await;
        Ok::<_, FetchError>(reading("2025-01-01T00:00:01Z"))
    })?;
    let fast = Poller::start(config(60_000, true), || async {
        sleep(Duration::from_millis(100)).await;
        Ok::<_, FetchError>(reading("2025-01-01T00:00:02Z"))
    })?;
    let mut slow_updates = slow.updates();
    let mut fast_updates = fast.updates();
    let mut tracker = SnapshotTracker::new();

    sleep(Duration::from_millis(200)).await;
    assert!(drain(&mut fast_updates, &mut tracker).contains(&UpdateOutcome::Advanced));

    sleep(Duration::from_millis(1500)).await;
    let outcomes = drain(&mut slow_updates, &mut tracker);

    assert!(outcomes.contains(&UpdateOutcome::OutOfOrder));
    assert_eq!(
        tracker.snapshot().current.as_ref().map(|r| r.captured_at),
        Some(ts("2025-01-01T00:00:02Z"))
    );
    assert_eq!(tracker.snapshot().previous, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_tick_leaves_snapshot_alone() -> anyhow::Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let fetch = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            match n {
                0 => Ok(reading("2025-01-01T00:00:00Z")),
                1 => Ok(reading("2025-01-01T00:00:01Z")),
                _ => Err(FetchError::Status { status: 500 }),
            }
        }
    };
    let poller = Poller::start(config(1000, true), fetch)?;
    let mut updates = poller.updates();
    let mut tracker = SnapshotTracker::new();

    sleep(Duration::from_millis(1010)).await;
    drain(&mut updates, &mut tracker);
    let before = tracker.snapshot().clone();

    sleep(Duration::from_millis(2000)).await;
    let outcomes = drain(&mut updates, &mut tracker);

    assert!(outcomes.iter().all(|o| *o == UpdateOutcome::Unchanged));
    assert_eq!(tracker.snapshot(), &before);
    assert_eq!(poller.fetch_state().error(), Some("HTTP 500"));
    // stale-while-revalidate: the last good reading is still readable
    assert_eq!(
        poller.state().last_success.map(|r| r.captured_at),
        Some(ts("2025-01-01T00:00:01Z"))
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn overlong_fetch_keeps_one_request_in_flight() -> anyhow::Result<()> {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
    let fetch = move || {
        let (active, peak) = (Arc::clone(&a), Arc::clone(&p));
        async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(1750)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, FetchError>(())
        }
    };

    let poller = Poller::start(config(500, true), fetch)?;
    for _ in 0..20 {
        sleep(Duration::from_millis(250)).await;
        poller.reload();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert!(poller.fetch_count() < 5);
    Ok(())
}
