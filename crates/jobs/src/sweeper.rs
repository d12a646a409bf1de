// crates/jobs/src/sweeper.rs
//! Periodic removal of old job records.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::broadcaster::StatusBroadcaster;
use crate::observers::ObserverDirectory;
use crate::registry::JobRegistry;

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

/// Deletes records created more than `retention` ago, whatever their status,
/// and unbinds their observers.
#[derive(Clone)]
pub struct RetentionSweeper {
    registry: Arc<JobRegistry>,
    observers: Arc<ObserverDirectory>,
    retention: Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(broadcaster: &StatusBroadcaster, retention: Duration, interval: Duration) -> Self {
        Self {
            registry: Arc::clone(broadcaster.registry()),
            observers: Arc::clone(broadcaster.observers()),
            retention,
            interval,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Remove every record older than the retention window as of `now`.
    /// Returns how many were removed.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let retention = chrono::Duration::from_std(self.retention)
            .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
        let expired: Vec<String> = self
            .registry
            .list()
            .into_iter()
            .filter(|job| now.signed_duration_since(job.created_at) > retention)
            .map(|job| job.job_id)
            .collect();

        let mut removed = 0;
        for job_id in expired {
            if self.registry.delete(&job_id).is_some() {
                removed += 1;
            }
            // Dropping the handle closes the connection.
            if self.observers.detach(&job_id).is_some() {
                debug!(job_id = %job_id, "closed observer of expired job");
            }
        }
        removed
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Run [`sweep`](Self::sweep) every interval until the runtime shuts down.
    /// The first sweep happens one interval after start.
    pub fn spawn(self) -> JoinHandle<()> {
        let period = self.interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.sweep();
                if removed > 0 {
                    info!(removed, remaining = self.registry.len(), "swept expired jobs");
                } else {
                    debug!(remaining = self.registry.len(), "sweep found no expired jobs");
                }
            }
        })
    }
}
