//! Background Reap Scheduler
//!
//! This module implements a background task that periodically reaps expired
//! session files, either in-process or by launching the reap worker.
//!
//! ## Design
//!
//! The scheduler runs as a Tokio task and:
//! 1. Sleeps for the configured reap interval
//! 2. Wakes up and either launches the worker process (`reap_async`) or calls
//!    [`reap`] directly
//! 3. Falls back to an in-process reap when the worker fails and
//!    `reap_sync_fallback` is set
//! 4. Logs the outcome and goes back to sleep
//!
//! The first reap happens one full interval after activation; starting the
//! scheduler never blocks. A Tokio task does not keep the runtime alive on its
//! own, so an otherwise idle process can exit while the scheduler is waiting.

use crate::config::ResolvedConfig;
use crate::storage::engine::RecordStore;
use crate::storage::reaper::reap;
use crate::worker::{ProcessLauncher, WorkerArgs, WorkerLauncher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A handle to the running reap scheduler.
///
/// When this handle is dropped, the scheduler task will be stopped.
#[derive(Debug)]
pub struct ReapScheduler {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
    interval: Duration,
}

impl ReapScheduler {
    /// Starts the scheduler for `store`, launching workers with the
    /// configured worker program.
    ///
    /// Returns `None` when background reaping is disabled. Must be called from
    /// within a Tokio runtime.
    pub fn start(store: RecordStore) -> Option<Self> {
        let launcher = ProcessLauncher::new(store.config().worker_program());
        Self::start_with_launcher(store, Arc::new(launcher))
    }

    /// Starts the scheduler with a custom worker launcher.
    pub fn start_with_launcher(
        store: RecordStore,
        launcher: Arc<dyn WorkerLauncher>,
    ) -> Option<Self> {
        let interval = store.config().reap_interval()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(scheduler_loop(store, launcher, interval, shutdown_rx));

        debug!(interval_secs = interval.as_secs(), "Reap scheduler started");

        Some(Self {
            shutdown_tx,
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true until [`stop`](Self::stop) has been called.
    pub fn is_running(&self) -> bool {
        !*self.shutdown_tx.borrow()
    }

    /// Stops the scheduler. Calling this more than once has no further effect.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        let was_running = !self.shutdown_tx.send_replace(true);
        if was_running {
            debug!("Reap scheduler stopped");
        }
    }
}

impl Drop for ReapScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main scheduler loop.
async fn scheduler_loop(
    store: RecordStore,
    launcher: Arc<dyn WorkerLauncher>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Reap scheduler received shutdown signal");
                    return;
                }
                continue;
            }
        }

        run_tick(&store, launcher.as_ref()).await;
    }
}

/// Performs the work of a single scheduler tick.
pub(crate) async fn run_tick(store: &RecordStore, launcher: &dyn WorkerLauncher) {
    let config: &ResolvedConfig = store.config();

    if config.reap_async() {
        if config.logging() {
            info!("Starting reap worker");
        }
        match launcher.launch(&WorkerArgs::for_store(config)).await {
            Ok(()) => return,
            Err(err) if config.reap_sync_fallback() => {
                warn!(error = %err, "Reap worker failed, reaping in-process");
            }
            Err(err) => {
                warn!(error = %err, "Reap worker failed");
                return;
            }
        }
    } else if config.logging() {
        info!("Deleting expired sessions");
    }

    match reap(store).await {
        Ok(report) => {
            if report.removed > 0 {
                debug!(
                    removed = report.removed,
                    remaining = report.kept,
                    "Expired sessions cleaned up"
                );
            }
        }
        Err(err) => {
            for item in err.errors() {
                warn!(error = %item, "Reap failed");
            }
        }
    }
}
