//! Fire-once deferred tasks.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tracing::trace;

use crate::{Clock, ManualClock};

/// A unit of deferred work.
pub type Task = BoxFuture<'static, ()>;

/// Runs a task once, no earlier than `delay` from now.
///
/// Implementations must be callable from any thread and must run tasks
/// whose deadlines differ in deadline order.
pub trait Scheduler: Send + Sync + 'static {
    fn after(&self, delay: Duration, task: Task);
}

// ---------------------------------------------------------------------------
// TokioScheduler
// ---------------------------------------------------------------------------

/// Spawns one Tokio task per deferred task, sleeping on `tokio::time`.
///
/// Must be called from inside a Tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn after(&self, delay: Duration, task: Task) {
        trace!(delay_ms = delay.as_millis() as u64, "deferred task armed");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
    }
}

// ---------------------------------------------------------------------------
// ManualScheduler
// ---------------------------------------------------------------------------

struct Pending {
    due: u64,
    seq: u64,
    task: Task,
}

#[derive(Default)]
struct Queue {
    pending: Vec<Pending>,
    next_seq: u64,
}

/// Holds tasks until [`advance`](Self::advance) moves its [`ManualClock`]
/// past their deadlines.
///
/// Tasks run in `(deadline, arming order)` order and the clock is stepped
/// to each deadline before its task runs, so code inside a task observes
/// the same "now" it would in production.
pub struct ManualScheduler {
    clock: ManualClock,
    queue: Mutex<Queue>,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            queue: Mutex::new(Queue::default()),
        }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Number of tasks not yet run.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Advances the clock by `by`, running every task that falls due on the
    /// way. Tasks armed by a running task are picked up if they fall inside
    /// the window too.
    pub async fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        let target = self.clock.now_millis().saturating_add(by);

        while let Some(next) = self.pop_due(target) {
            self.clock.set(next.due);
            trace!(due = next.due, "running deferred task");
            next.task.await;
        }
        self.clock.set(target);
    }

    fn pop_due(&self, target: u64) -> Option<Pending> {
        let mut queue = self.lock();
        let index = queue
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= target)
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(i, _)| i)?;
        Some(queue.pending.swap_remove(index))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn after(&self, delay: Duration, task: Task) {
        let delay = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let due = self.clock.now_millis().saturating_add(delay);
        let mut queue = self.lock();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.pending.push(Pending { due, seq, task });
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.clock.now_millis())
            .field("pending", &self.pending())
            .finish()
    }
}
