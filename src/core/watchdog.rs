//! Periodic maintenance of in-flight batches

use crate::batch::coordinator::Coordinator;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Runs `Coordinator::tick` every `interval`
pub fn spawn_watchdog(coordinator: Arc<Coordinator>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs_f64(), "Watchdog started");

        loop {
            ticker.tick().await;
            let report = coordinator.tick(Instant::now()).await;
            if report.timed_out + report.stale_orphans + report.republished + report.reconciled > 0 {
                info!(
                    timed_out = report.timed_out,
                    stale_orphans = report.stale_orphans,
                    republished = report.republished,
                    reconciled = report.reconciled,
                    "Watchdog pass"
                );
            } else {
                debug!("Watchdog pass: nothing to do");
            }
        }
    })
}
