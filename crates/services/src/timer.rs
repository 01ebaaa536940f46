//! Session countdown.
//!
//! [`Countdown`] is the pure state; [`CountdownTimer`] drives it from a tokio
//! interval task and reports through an mpsc channel.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::debug;

/// Countdown resolution.
pub const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running(Duration),
    /// Emitted exactly once, on the tick that reaches zero.
    Expired,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: Duration,
    stopped: bool,
}

impl Countdown {
    #[must_use]
    pub fn new(total: Duration) -> Self {
        Self {
            remaining: total,
            stopped: false,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    #[cfg(test)]
    fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.stopped {
            return TickOutcome::Stopped;
        }
        self.remaining = self.remaining.saturating_sub(TICK);
        if self.remaining.is_zero() {
            self.stopped = true;
            TickOutcome::Expired
        } else {
            TickOutcome::Running(self.remaining)
        }
    }
}

/// Message sent by a running timer. `run` identifies which timer sent it so
/// events from a replaced timer can be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub run: u64,
    pub kind: TimerEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEventKind {
    Tick { remaining: Duration },
    Expired,
}

/// Handle to a spawned countdown task. Stopping (or dropping) aborts the task.
#[derive(Debug)]
pub struct CountdownTimer {
    run: u64,
    total: Duration,
    task: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    /// Spawns the countdown on the current tokio runtime.
    #[must_use]
    pub fn start(run: u64, total: Duration, events: mpsc::UnboundedSender<TimerEvent>) -> Self {
        debug!(run, total_secs = total.as_secs(), "countdown started");
        let task = tokio::spawn(async move {
            let mut countdown = Countdown::new(total);
            let mut interval = time::interval_at(Instant::now() + TICK, TICK);
            loop {
                interval.tick().await;
                let kind = match countdown.tick() {
                    TickOutcome::Running(remaining) => TimerEventKind::Tick { remaining },
                    TickOutcome::Expired => TimerEventKind::Expired,
                    TickOutcome::Stopped => break,
                };
                if events.send(TimerEvent { run, kind }).is_err() {
                    break;
                }
            }
        });
        Self {
            run,
            total,
            task: Some(task),
        }
    }

    #[must_use]
    pub fn run(&self) -> u64 {
        self.run
    }

    #[must_use]
    pub fn total(&self) -> Duration {
        self.total
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(run = self.run, "countdown stopped");
        }
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
