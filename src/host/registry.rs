use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Handle to a job held in the registry.
    pub struct JobKey;
}

#[derive(Debug)]
struct JobEntry {
    job_id: String,
    cancel: Arc<AtomicBool>,
}

/// Jobs that have been submitted but have not reported yet.
///
/// Several live jobs may share a job id; cancelling by id reaches all of them.
#[derive(Debug, Default)]
pub(crate) struct JobRegistry {
    jobs: SlotMap<JobKey, JobEntry>,
}

impl JobRegistry {
    /// Registers a job and returns its key and cancel flag.
    pub fn insert(&mut self, job_id: &str) -> (JobKey, Arc<AtomicBool>) {
        let cancel = Arc::new(AtomicBool::new(false));
        let key = self.jobs.insert(JobEntry {
            job_id: job_id.to_owned(),
            cancel: Arc::clone(&cancel),
        });
        (key, cancel)
    }

    pub fn remove(&mut self, key: JobKey) {
        self.jobs.remove(key);
    }

    /// Flags every live job with the given id; returns how many were found.
    pub fn cancel(&self, job_id: &str) -> usize {
        self.jobs
            .values()
            .filter(|entry| entry.job_id == job_id)
            .inspect(|entry| entry.cancel.store(true, Ordering::Release))
            .count()
    }

    pub fn cancel_all(&self) {
        for entry in self.jobs.values() {
            entry.cancel.store(true, Ordering::Release);
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }
}
