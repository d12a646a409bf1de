// crates/jobs/src/registry.rs
//! In-memory job registry: the single source of truth for job status.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::types::JobStatus;

/// Concurrent map of job id to its latest [`JobStatus`].
///
/// Volatile and process-lifetime only. Readers always get an owned snapshot,
/// never a guard, so no caller can hold a shard lock across an `.await`.
#[derive(Default)]
pub struct JobRegistry {
    jobs: DashMap<String, JobStatus>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.get(job_id).map(|entry| entry.value().clone())
    }

    /// Insert or replace the record for `job_id`, returning the previous one.
    pub fn put(&self, job_id: impl Into<String>, status: JobStatus) -> Option<JobStatus> {
        self.jobs.insert(job_id.into(), status)
    }

    pub fn delete(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.remove(job_id).map(|(_, status)| status)
    }

    /// Snapshot of every tracked record, in no particular order.
    pub fn list(&self) -> Vec<JobStatus> {
        self.jobs.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Run `f` with exclusive access to the slot for `job_id`.
    ///
    /// The slot holds the current record (or `None`); whatever `f` leaves in
    /// it is written back, and a slot left `None` removes the entry. The shard
    /// lock is held for the whole call, which serializes every `with_slot` on
    /// the same job. `f` must not call back into this registry.
    pub(crate) fn with_slot<R>(
        &self,
        job_id: &str,
        f: impl FnOnce(&mut Option<JobStatus>) -> R,
    ) -> R {
        match self.jobs.entry(job_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let mut slot = Some(occupied.get().clone());
                let result = f(&mut slot);
                match slot {
                    Some(status) => {
                        *occupied.get_mut() = status;
                    }
                    None => {
                        occupied.remove();
                    }
                }
                result
            }
            Entry::Vacant(vacant) => {
                let mut slot = None;
                let result = f(&mut slot);
                if let Some(status) = slot {
                    vacant.insert(status);
                }
                result
            }
        }
    }
}
