//! In-memory provider replaying a fixed script of status answers. Test only.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::JobError;
use crate::job::{JobHandle, JobRequest, JobState, ProviderId};

use super::JobProvider;

pub(crate) struct ScriptedProvider {
    id: ProviderId,
    script: Mutex<VecDeque<Result<JobState, JobError>>>,
    /// Answer once the script runs dry.
    last: JobState,
    sync: bool,
    pub(crate) creates: AtomicU32,
    pub(crate) polls: AtomicU32,
}

impl ScriptedProvider {
    pub(crate) fn new(script: Vec<Result<JobState, JobError>>) -> Self {
        let last = script
            .iter()
            .rev()
            .find_map(|s| s.as_ref().ok().cloned())
            .unwrap_or(JobState::Queued);
        Self {
            id: ProviderId::Sora,
            script: Mutex::new(script.into()),
            last,
            sync: false,
            creates: AtomicU32::new(0),
            polls: AtomicU32::new(0),
        }
    }

    pub(crate) fn states(states: Vec<JobState>) -> Self {
        Self::new(states.into_iter().map(Ok).collect())
    }

    pub(crate) fn with_id(mut self, id: ProviderId) -> Self {
        self.id = id;
        self
    }

    pub(crate) fn synchronous(mut self) -> Self {
        self.sync = true;
        self
    }

    pub(crate) fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn validate(&self, _request: &JobRequest) -> Result<(), JobError> {
        Ok(())
    }

    async fn create(&self, _request: &JobRequest) -> Result<String, JobError> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("scripted-{n}"))
    }

    async fn status(&self, _handle: &JobHandle) -> Result<JobState, JobError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.last.clone()))
    }

    fn completes_on_submit(&self) -> bool {
        self.sync
    }
}
