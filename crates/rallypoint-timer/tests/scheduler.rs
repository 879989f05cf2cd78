//! Integration tests for the deferred-task schedulers.
//!
//! `TokioScheduler` tests run on paused Tokio time so sleeps resolve as soon
//! as the runtime is otherwise idle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rallypoint_timer::{Clock, ManualClock, ManualScheduler, Scheduler, TokioScheduler};

// =========================================================================
// Helpers
// =========================================================================

type Log = Arc<Mutex<Vec<(&'static str, u64)>>>;

/// A task that records its label and the clock reading when it ran.
fn record(log: &Log, clock: &ManualClock, label: &'static str) -> rallypoint_timer::Task {
    let log = Arc::clone(log);
    let clock = clock.clone();
    Box::pin(async move {
        log.lock().unwrap().push((label, clock.now_millis()));
    })
}

fn labels(log: &Log) -> Vec<&'static str> {
    log.lock().unwrap().iter().map(|(l, _)| *l).collect()
}

// =========================================================================
// ManualScheduler
// =========================================================================

#[tokio::test]
async fn test_manual_nothing_runs_before_deadline() {
    let clock = ManualClock::new(0);
    let scheduler = ManualScheduler::new(clock.clone());
    let log = Log::default();

    scheduler.after(Duration::from_secs(3), record(&log, &clock, "a"));
    scheduler.advance(Duration::from_millis(2_999)).await;

    assert!(labels(&log).is_empty());
    assert_eq!(scheduler.pending(), 1);
    assert_eq!(clock.now_millis(), 2_999);
}

#[tokio::test]
async fn test_manual_runs_in_deadline_order_and_steps_clock() {
    let clock = ManualClock::new(10_000);
    let scheduler = ManualScheduler::new(clock.clone());
    let log = Log::default();

    // Armed out of order on purpose.
    scheduler.after(Duration::from_secs(13), record(&log, &clock, "finish"));
    scheduler.after(Duration::from_secs(3), record(&log, &clock, "active"));
    scheduler.after(Duration::from_secs(23), record(&log, &clock, "reset"));

    scheduler.advance(Duration::from_secs(60)).await;

    let entries = log.lock().unwrap().clone();
    assert_eq!(
        entries,
        vec![("active", 13_000), ("finish", 23_000), ("reset", 33_000)]
    );
    assert_eq!(clock.now_millis(), 70_000);
    assert_eq!(scheduler.pending(), 0);
}

#[tokio::test]
async fn test_manual_equal_deadlines_keep_arming_order() {
    let clock = ManualClock::new(0);
    let scheduler = ManualScheduler::new(clock.clone());
    let log = Log::default();

    for label in ["first", "second", "third"] {
        scheduler.after(Duration::from_secs(1), record(&log, &clock, label));
    }
    scheduler.advance(Duration::from_secs(1)).await;

    assert_eq!(labels(&log), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_manual_partial_advances() {
    let clock = ManualClock::new(0);
    let scheduler = ManualScheduler::new(clock.clone());
    let log = Log::default();

    scheduler.after(Duration::from_secs(3), record(&log, &clock, "a"));
    scheduler.after(Duration::from_secs(8), record(&log, &clock, "b"));

    scheduler.advance(Duration::from_secs(3)).await;
    assert_eq!(labels(&log), vec!["a"]);

    scheduler.advance(Duration::from_secs(4)).await;
    assert_eq!(labels(&log), vec!["a"]);

    scheduler.advance(Duration::from_secs(1)).await;
    assert_eq!(labels(&log), vec!["a", "b"]);
}

// =========================================================================
// TokioScheduler
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_tokio_scheduler_fires_after_delay() {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let start = tokio::time::Instant::now();

    TokioScheduler.after(
        Duration::from_secs(5),
        Box::pin(async move {
            let _ = tx.send(tokio::time::Instant::now());
        }),
    );

    let fired_at = rx.await.expect("task should run");
    assert!(fired_at - start >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_tokio_scheduler_orders_by_deadline() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    for (label, secs) in [("finish", 13), ("active", 3), ("reset", 23)] {
        let tx = tx.clone();
        TokioScheduler.after(
            Duration::from_secs(secs),
            Box::pin(async move {
                let _ = tx.send(label);
            }),
        );
    }
    drop(tx);

    let mut order = Vec::new();
    while let Some(label) = rx.recv().await {
        order.push(label);
    }
    assert_eq!(order, vec!["active", "finish", "reset"]);
}

#[tokio::test(start_paused = true)]
async fn test_tokio_scheduler_not_before_deadline() {
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    TokioScheduler.after(
        Duration::from_secs(10),
        Box::pin(async move {
            let _ = tx.send(());
        }),
    );

    let early = tokio::time::timeout(Duration::from_secs(9), rx).await;
    assert!(early.is_err(), "task must not run before its delay");
}
