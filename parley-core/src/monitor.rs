// ABOUTME: Idle-session monitor -- ages Pending sessions and evicts over-threshold ones.
// ABOUTME: The periodic sweep is the sole recovery path for sessions nobody picked up.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::metrics;
use crate::model::SessionStatus;
use crate::store::Store;

pub const DEFAULT_MISSED_POLL_THRESHOLD: i64 = 3;
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    /// Pending sessions whose counter was incremented this sweep.
    pub swept: usize,
    /// Sessions moved to InActive this sweep.
    pub evicted: usize,
}

pub struct SessionMonitor {
    store: Arc<Store>,
    missed_poll_threshold: i64,
}

impl SessionMonitor {
    pub fn new(store: Arc<Store>, missed_poll_threshold: i64) -> Self {
        Self {
            store,
            missed_poll_threshold,
        }
    }

    /// One sweep: every Pending session takes a missed poll; past the
    /// threshold it goes InActive. The incremented counter is persisted even
    /// when the threshold is not crossed.
    pub fn sweep(&self) -> Result<SweepStats> {
        let mut stats = SweepStats::default();

        for mut session in self.store.list_sessions_by_status(SessionStatus::Pending)? {
            session.missed_polls += 1;

            if session.missed_polls > self.missed_poll_threshold {
                session.status = SessionStatus::InActive;
            }

            if !self.store.update_session(&session)? {
                // A concurrent poll or assignment won; the next sweep re-reads.
                tracing::debug!(session_id = %session.id, "Sweep lost a revision race, skipping");
                continue;
            }

            stats.swept += 1;
            if session.status == SessionStatus::InActive {
                stats.evicted += 1;
                metrics::record_eviction();
                tracing::info!(
                    session_id = %session.id,
                    missed_polls = session.missed_polls,
                    "Session evicted as inactive"
                );
            }
        }

        Ok(stats)
    }
}

/// Background loop driving the monitor on a fixed cadence.
pub async fn run_monitor(monitor: SessionMonitor, sweep_interval: Duration) {
    tracing::info!(
        interval_secs = sweep_interval.as_secs(),
        "Starting session monitor"
    );

    let mut ticker = interval(sweep_interval);
    loop {
        ticker.tick().await;
        match monitor.sweep() {
            Ok(stats) if stats.swept > 0 => {
                tracing::debug!(swept = stats.swept, evicted = stats.evicted, "Sweep complete");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Session sweep failed");
            }
        }
    }
}
