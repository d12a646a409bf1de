// crates/jobs/src/observers.rs
//! Observer directory: at most one live subscriber per job.

use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::types::JobStatus;

/// Identifies one observer connection.
pub type ObserverId = Uuid;

/// The sending half of an observer's channel.
///
/// Dropping the handle closes the channel; the receiving connection sees the
/// end of its update stream and shuts down.
#[derive(Debug)]
pub struct ObserverHandle {
    pub id: ObserverId,
    pub job_id: String,
    pub connected_at: Instant,
    tx: mpsc::UnboundedSender<JobStatus>,
}

impl ObserverHandle {
    /// Create a handle plus the receiver its connection should drain.
    pub fn new(job_id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<JobStatus>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: Uuid::new_v4(),
            job_id: job_id.into(),
            connected_at: Instant::now(),
            tx,
        };
        (handle, rx)
    }

    /// Whether the receiving connection is still around.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue `status` for the connection. Returns false if it has gone away.
    pub fn push(&self, status: JobStatus) -> bool {
        self.tx.send(status).is_ok()
    }
}

/// Outcome of pushing an update to a job's observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    NoObserver,
    Sent(ObserverId),
    /// The observer's transport is gone; its binding should be dropped.
    Disconnected(ObserverId),
}

/// Summary of a bound observer, for lookups that must not keep its channel
/// alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserverInfo {
    pub id: ObserverId,
    pub job_id: String,
    pub connected_at: Instant,
    pub open: bool,
}

#[derive(Default)]
pub struct ObserverDirectory {
    observers: DashMap<String, ObserverHandle>,
}

impl ObserverDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handle` to its job, replacing any existing observer.
    ///
    /// The displaced handle is returned; dropping it closes that connection.
    pub fn attach(&self, handle: ObserverHandle) -> Option<ObserverHandle> {
        let job_id = handle.job_id.clone();
        let new_id = handle.id;
        let displaced = self.observers.insert(job_id.clone(), handle);
        if let Some(old) = &displaced {
            warn!(
                job_id = %job_id,
                displaced_observer = %old.id,
                observer_id = %new_id,
                "observer replaced by a newer connection"
            );
        }
        displaced
    }

    /// Unbind whatever observer is attached to `job_id`.
    pub fn detach(&self, job_id: &str) -> Option<ObserverHandle> {
        self.observers.remove(job_id).map(|(_, handle)| handle)
    }

    /// Unbind `job_id` only if `observer_id` still owns it. A connection that
    /// was already replaced must not unbind its successor when it closes.
    pub fn detach_observer(&self, job_id: &str, observer_id: ObserverId) -> bool {
        self.observers
            .remove_if(job_id, |_, handle| handle.id == observer_id)
            .is_some()
    }

    pub fn lookup(&self, job_id: &str) -> Option<ObserverInfo> {
        self.observers.get(job_id).map(|handle| ObserverInfo {
            id: handle.id,
            job_id: handle.job_id.clone(),
            connected_at: handle.connected_at,
            open: handle.is_open(),
        })
    }

    /// Push `status` to the observer of `job_id`, if any.
    pub(crate) fn push(&self, job_id: &str, status: &JobStatus) -> Delivery {
        let Some(handle) = self.observers.get(job_id) else {
            return Delivery::NoObserver;
        };
        if handle.is_open() && handle.push(status.clone()) {
            Delivery::Sent(handle.id)
        } else {
            Delivery::Disconnected(handle.id)
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}
