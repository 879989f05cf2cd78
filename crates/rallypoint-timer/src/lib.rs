//! Time sources and deferred tasks for Rallypoint.
//!
//! Room lifecycles are driven by wall-clock deadlines (countdown expiry,
//! game expiry, post-game reset). Rather than calling `tokio::time`
//! directly, rooms take an injected [`Clock`] and [`Scheduler`] so tests
//! can run many isolated registries and step time by hand.
//!
//! | Production        | Tests                                |
//! |-------------------|--------------------------------------|
//! | [`SystemClock`]   | [`ManualClock`]                      |
//! | [`TokioScheduler`]| [`ManualScheduler`] (drives its clock)|
//!
//! # Deferred tasks
//!
//! A scheduled task is an owned future. There is no cancel: the code that
//! schedules work is expected to re-check its own state when the task
//! runs, which is how rooms make stale timers inert.
//!
//! ```ignore
//! scheduler.after(Duration::from_secs(3), Box::pin(async move {
//!     let _ = room.send(RoomCommand::Advance { round, from: Countdown }).await;
//! }));
//! ```

mod clock;
mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use scheduler::{ManualScheduler, Scheduler, Task, TokioScheduler};
