//! Background Expiry Sweeper
//!
//! This module implements a background task that periodically inspects part of
//! a map for expired entries and removes them. This is called "active eviction"
//! as opposed to "lazy eviction" (which happens on access).
//!
//! ## Why Do We Need This?
//!
//! Lazy eviction (checking on access) is cheap but has a problem:
//! If an entry expires and is never read again, it will stay in memory forever!
//!
//! The background sweeper solves this by periodically cleaning up expired entries.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and:
//! 1. Waits for the next tick of a fixed interval
//! 2. Runs one sweep cycle on the blocking pool and waits for it to finish
//! 3. Logs what the cycle reclaimed
//!
//! Cycles never overlap. A cycle that panics is logged and the next tick
//! still fires. The task ends when its [`ExpirySweeper`] handle is stopped
//! or dropped.

use crate::config::SweepConfig;
use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

/// Something the sweeper can sweep.
pub trait Sweep: Send + Sync + 'static {
    /// Runs one sweep cycle, inspecting roughly `delete_scale` of the table.
    fn sweep(&self, delete_scale: f64) -> SweepReport;
}

/// Outcome of one sweep cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries inspected
    pub visited: usize,
    /// Expired entries deleted
    pub expired: usize,
    /// Entries left in the table afterwards
    pub remaining: usize,
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task on the current runtime.
    ///
    /// The configuration is normalized first, so an out-of-range delete scale
    /// or a zero interval falls back to its default.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context. Use
    /// [`ExpirySweeper::try_start`] to get an error instead.
    pub fn start<S: Sweep>(target: Arc<S>, config: SweepConfig) -> Self {
        Self::start_on(&Handle::current(), target, config)
    }

    /// Starts the expiry sweeper, failing with [`Error::NoRuntime`] when no
    /// Tokio runtime is running.
    pub fn try_start<S: Sweep>(target: Arc<S>, config: SweepConfig) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Ok(Self::start_on(&handle, target, config))
    }

    fn start_on<S: Sweep>(handle: &Handle, target: Arc<S>, config: SweepConfig) -> Self {
        let config = config.normalized();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        handle.spawn(sweeper_loop(target, config, shutdown_rx));

        info!(
            interval_ms = config.interval.as_millis(),
            delete_scale = config.delete_scale,
            "Background expiry sweeper started"
        );

        Self { shutdown_tx }
    }

    /// Stops the expiry sweeper.
    ///
    /// A cycle already in progress runs to completion. This is called
    /// automatically when the handle is dropped; calling it again is a no-op.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!("Background expiry sweeper stopped");
        }
    }

    /// Returns true until the sweeper has been stopped or its task has ended.
    pub fn is_running(&self) -> bool {
        !*self.shutdown_tx.borrow() && !self.shutdown_tx.is_closed()
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop<S: Sweep>(
    target: Arc<S>,
    config: SweepConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately; the first cycle runs one interval in.
    ticker.tick().await;

    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
                continue;
            }
        }

        let cycle_target = Arc::clone(&target);
        let delete_scale = config.delete_scale;

        match tokio::task::spawn_blocking(move || cycle_target.sweep(delete_scale)).await {
            Ok(report) if report.expired > 0 => {
                debug!(
                    visited = report.visited,
                    expired = report.expired,
                    entries_remaining = report.remaining,
                    "Expired entries cleaned up"
                );
            }
            Ok(report) => {
                trace!(visited = report.visited, "Sweep found nothing to clean up");
            }
            Err(e) => {
                error!(error = %e, "Sweep cycle failed");
            }
        }
    }
}
