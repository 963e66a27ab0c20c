//! Auto-Compactor: background sweep over every table
//!
//! ## Loop:
//! ```text
//!   ┌──────────── select! ─────────────┐
//!   │ tick   → compact every table     │
//!   │ stop   → exit                    │
//!   │ cancel → exit                    │
//!   └──────────────────────────────────┘
//! ```
//! Signals are only observed between sweeps; a sweep in progress always
//! runs to completion.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{AtlasError, Result};
use crate::txlog::FileLog;

use super::Compactor;

/// Periodically compacts every table known to the log
pub struct AutoCompactor {
    compactor: Arc<Compactor>,
    log: Arc<dyn FileLog>,
    interval: Duration,
}

impl AutoCompactor {
    pub fn new(compactor: Arc<Compactor>, log: Arc<dyn FileLog>, interval: Duration) -> Self {
        Self {
            compactor,
            log,
            interval,
        }
    }

    /// Start the loop; it runs until the handle is stopped or dropped
    pub fn start(self) -> Result<AutoCompactorHandle> {
        self.start_with_cancel(channel::never())
    }

    /// Start the loop, also exiting when `cancel` receives a message or its
    /// senders are all dropped
    pub fn start_with_cancel(self, cancel: Receiver<()>) -> Result<AutoCompactorHandle> {
        if self.interval.is_zero() {
            return Err(AtlasError::Config("check_interval must be > 0".into()));
        }

        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let sweeps = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&sweeps);

        let thread = thread::Builder::new()
            .name("atlastable-auto-compactor".into())
            .spawn(move || self.run(stop_rx, cancel, counter))
            .map_err(|e| AtlasError::Background(format!("failed to spawn auto-compactor: {}", e)))?;

        Ok(AutoCompactorHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            sweeps,
        })
    }

    fn run(self, stop: Receiver<()>, cancel: Receiver<()>, sweeps: Arc<AtomicU64>) {
        let ticker = channel::tick(self.interval);
        tracing::info!(interval = ?self.interval, "Auto-compactor started");

        loop {
            channel::select! {
                recv(ticker) -> _ => {
                    self.sweep();
                    sweeps.fetch_add(1, Ordering::SeqCst);
                }
                recv(stop) -> _ => {
                    tracing::info!("Auto-compactor stop requested");
                    break;
                }
                recv(cancel) -> _ => {
                    tracing::info!("Auto-compactor cancelled");
                    break;
                }
            }
        }

        tracing::info!(sweeps = sweeps.load(Ordering::SeqCst), "Auto-compactor stopped");
    }

    /// Compact each table in turn; one table's failure never blocks the rest
    fn sweep(&self) {
        let tables = match self.log.list_tables() {
            Ok(tables) => tables,
            Err(e) => {
                tracing::error!(error = %e, "Auto-compactor could not list tables");
                return;
            }
        };

        for table in tables {
            match self.compactor.compact_table(&table) {
                Ok(report) if !report.is_noop() => {
                    tracing::debug!(table = %table, merged = report.merged, "Auto-compaction merged files");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(table = %table, error = %e, "Auto-compaction failed");
                }
            }
        }
    }
}

/// Owner of a running auto-compactor thread
pub struct AutoCompactorHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    sweeps: Arc<AtomicU64>,
}

impl AutoCompactorHandle {
    /// Sweeps completed so far
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::SeqCst)
    }

    /// True once the loop thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signal the loop and wait for it; returns the completed sweep count
    pub fn stop(mut self) -> Result<u64> {
        self.shutdown()?;
        Ok(self.sweeps())
    }

    fn shutdown(&mut self) -> Result<()> {
        if let Some(tx) = self.stop_tx.take() {
            // A full or disconnected channel means the loop is already leaving
            let _ = tx.try_send(());
        }
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| AtlasError::Background("auto-compactor thread panicked".into())),
            None => Ok(()),
        }
    }
}

impl Drop for AutoCompactorHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "Auto-compactor did not shut down cleanly");
        }
    }
}
