//! Fixed-interval recurring task with explicit cancellation.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Owner side of a shutdown flag shared with running tasks.
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Ask every subscribed task to stop.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a job immediately and then once per period until shut down.
pub struct RecurringTask {
    period: Duration,
    shutdown: watch::Receiver<bool>,
}

impl RecurringTask {
    pub fn new(period: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self { period, shutdown }
    }

    /// Drive `job` until shutdown; returns how many times it ran.
    ///
    /// A job that overruns its period delays the next tick rather than
    /// firing a burst to catch up. Dropping the [`ShutdownSignal`] also
    /// stops the task.
    pub async fn run<F, Fut>(mut self, mut job: F) -> u64
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            ticks += 1;
            debug!(tick = ticks, "Recurring task firing");
            job(ticks).await;
        }

        info!(ticks, "Recurring task stopped");
        ticks
    }
}
