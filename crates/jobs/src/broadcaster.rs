// crates/jobs/src/broadcaster.rs
//! Status broadcaster: records every update and fans it out to the job's
//! observer.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::TransitionError;
use crate::observers::{Delivery, ObserverDirectory, ObserverHandle, ObserverId};
use crate::registry::JobRegistry;
use crate::types::{JobStatus, StatusPatch};

/// A live subscription to one job's updates.
///
/// The first message is the job's current record, if it had one when the
/// subscription was made; every later message is a live update.
#[derive(Debug)]
pub struct Subscription {
    pub observer_id: ObserverId,
    pub job_id: String,
    pub updates: mpsc::UnboundedReceiver<JobStatus>,
}

/// Shared front door to the registry and the observer directory.
///
/// Cheap to clone; every clone sees the same state. Updates and attaches for
/// the same job are serialized through the registry's per-job lock, so an
/// observer never sees a live update before its snapshot, and sees one job's
/// updates in the order they were recorded.
#[derive(Clone, Default)]
pub struct StatusBroadcaster {
    registry: Arc<JobRegistry>,
    observers: Arc<ObserverDirectory>,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parts(registry: Arc<JobRegistry>, observers: Arc<ObserverDirectory>) -> Self {
        Self {
            registry,
            observers,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn observers(&self) -> &Arc<ObserverDirectory> {
        &self.observers
    }

    pub fn get(&self, job_id: &str) -> Option<JobStatus> {
        self.registry.get(job_id)
    }

    pub fn list(&self) -> Vec<JobStatus> {
        self.registry.list()
    }

    /// Merge `patch` into the job's record and push the result to its
    /// observer.
    ///
    /// An unknown job starts from a bare record, so the first update
    /// establishes it. A patch that would violate the record's invariants is
    /// rejected and nothing is written or pushed. Observer failures are never
    /// reported to the caller: the binding is dropped and the update stays
    /// recorded.
    pub fn update(&self, job_id: &str, patch: StatusPatch) -> Result<JobStatus, TransitionError> {
        let result = self.write(job_id, patch, false);
        match &result {
            Ok(status) => debug!(
                job_id = %job_id,
                status = %status.status,
                stage = %status.stage,
                progress = status.progress,
                "job status updated"
            ),
            Err(e) => warn!(job_id = %job_id, error = %e, "rejected job status update"),
        }
        result
    }

    /// Like [`update`](Self::update), but only for a job with no record yet.
    /// Fails with [`TransitionError::AlreadyExists`] otherwise.
    pub fn create(&self, job_id: &str, patch: StatusPatch) -> Result<JobStatus, TransitionError> {
        self.write(job_id, patch, true)
    }

    fn write(
        &self,
        job_id: &str,
        patch: StatusPatch,
        must_be_new: bool,
    ) -> Result<JobStatus, TransitionError> {
        let (status, delivery) = self.registry.with_slot(job_id, |slot| {
            if must_be_new && slot.is_some() {
                return Err(TransitionError::AlreadyExists);
            }
            let mut next = slot.clone().unwrap_or_else(|| {
                JobStatus::new(job_id, patch.created_at.unwrap_or_else(Utc::now))
            });
            next.apply(&patch)?;
            *slot = Some(next.clone());
            let delivery = self.observers.push(job_id, &next);
            Ok((next, delivery))
        })?;

        if let Delivery::Disconnected(observer_id) = delivery {
            warn!(
                job_id = %job_id,
                observer_id = %observer_id,
                "observer disconnected, dropping binding"
            );
            self.observers.detach_observer(job_id, observer_id);
        }
        Ok(status)
    }

    /// Attach a new observer to `job_id`, replacing any existing one.
    ///
    /// If the job already has a record it is queued as the subscription's
    /// first message before the observer becomes visible to `update`.
    pub fn subscribe(&self, job_id: &str) -> Subscription {
        let (handle, updates) = ObserverHandle::new(job_id);
        let observer_id = handle.id;

        let displaced = self.registry.with_slot(job_id, |slot| {
            if let Some(current) = slot.as_ref() {
                handle.push(current.clone());
            }
            self.observers.attach(handle)
        });
        // Closes the replaced connection.
        drop(displaced);

        info!(job_id = %job_id, observer_id = %observer_id, "observer attached");
        Subscription {
            observer_id,
            job_id: job_id.to_string(),
            updates,
        }
    }

    /// Detach `observer_id` from `job_id` if it is still the bound observer.
    pub fn unsubscribe(&self, job_id: &str, observer_id: ObserverId) {
        if self.observers.detach_observer(job_id, observer_id) {
            info!(job_id = %job_id, observer_id = %observer_id, "observer detached");
        }
    }
}
