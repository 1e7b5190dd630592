//! Results of synchronous providers, kept until the poller asks for them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::job::JobState;

#[derive(Debug, Default)]
pub(crate) struct FinishedJobs {
    seq: AtomicU64,
    jobs: Mutex<HashMap<String, JobState>>,
}

impl FinishedJobs {
    /// Fresh local id with the given prefix (`tts-1718000000-3`).
    pub(crate) fn next_id(&self, prefix: &str) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}-{}-{n}", crate::job::unix_timestamp())
    }

    pub(crate) fn insert(&self, id: &str, state: JobState) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(id.to_string(), state);
        }
    }

    pub(crate) fn get(&self, id: &str) -> Option<JobState> {
        self.jobs.lock().ok().and_then(|jobs| jobs.get(id).cloned())
    }
}
