//! Tokio task that drives [`Harvester`] ticks.

use std::sync::Arc;
use std::time::Duration;

use ms_core::config::MIN_TICK_INTERVAL;
use ms_core::Result;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::harvester::{Harvester, TickOutcome};

/// A running harvester loop.
///
/// Dropping the service cancels the loop without waiting for it; call
/// [`shutdown`](Self::shutdown) to let an in-flight extraction finish.
pub struct HarvesterService {
    harvester: Arc<Harvester>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl HarvesterService {
    /// Run crash recovery, then spawn the tick loop.
    ///
    /// Recovery errors abort startup. Must be called from within a tokio
    /// runtime.
    pub fn start(harvester: Arc<Harvester>, interval: Duration) -> Result<Self> {
        let report = harvester.recover()?;
        tracing::info!(
            stuck_processing = report.stuck_processing,
            incomplete = report.incomplete,
            "Harvester recovery complete"
        );

        if harvester.probe_path().is_none() {
            tracing::info!("No probe binary configured; metadata extraction is paused");
        }

        let interval = interval.max(MIN_TICK_INTERVAL);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(harvester.clone(), interval, cancel.clone()));

        Ok(Self {
            harvester,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn harvester(&self) -> &Arc<Harvester> {
        &self.harvester
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Harvester task ended abnormally");
            }
        }
    }
}

impl Drop for HarvesterService {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_loop(harvester: Arc<Harvester>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_ms = interval.as_millis() as u64, "Harvester started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = harvester.requested() => {}
            _ = ticker.tick() => {}
        }

        // Not raced against cancellation: an extraction in progress completes.
        if harvester.tick().await == TickOutcome::Error {
            tracing::debug!("Harvester tick ended with an error");
        }
    }

    tracing::info!("Harvester stopped");
}
