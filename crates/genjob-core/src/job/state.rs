//! Job state machine: `Queued -> Running* -> Completed | Failed`.

use serde::{Deserialize, Serialize};

use super::types::{ArtifactRef, JobHandle};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running {
        /// Percent complete, 0..=100. Providers without progress report 0.
        progress: u8,
    },
    Completed {
        artifact: ArtifactRef,
    },
    Failed {
        /// Provider's error code when it gives one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_kind: Option<String>,
        message: String,
    },
}

impl JobState {
    pub fn running(progress: impl Into<f64>) -> Self {
        let p = progress.into();
        let p = if p.is_finite() { p.clamp(0.0, 100.0) } else { 0.0 };
        JobState::Running { progress: p.round() as u8 }
    }

    pub fn failed(error_kind: Option<String>, message: impl Into<String>) -> Self {
        JobState::Failed {
            error_kind,
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed { .. } | JobState::Failed { .. })
    }

    /// Short label for logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running { .. } => "running",
            JobState::Completed { .. } => "completed",
            JobState::Failed { .. } => "failed",
        }
    }

    /// Fold a newly observed state into the current one, keeping transitions monotonic.
    ///
    /// Terminal states never change, progress never goes backwards and a
    /// `Queued` report after `Running` is ignored.
    pub fn advance(&self, observed: JobState) -> JobState {
        if self.is_terminal() {
            return self.clone();
        }
        match (self, observed) {
            (JobState::Running { .. }, JobState::Queued) => self.clone(),
            (JobState::Running { progress: cur }, JobState::Running { progress: new }) => {
                JobState::Running {
                    progress: (*cur).max(new),
                }
            }
            (_, next) => next,
        }
    }
}

/// Snapshot of one job produced on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub handle: JobHandle,
    #[serde(flatten)]
    pub state: JobState,
}

impl JobStatus {
    pub fn artifact(&self) -> Option<&ArtifactRef> {
        match &self.state {
            JobState::Completed { artifact } => Some(artifact),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done() -> JobState {
        JobState::Completed {
            artifact: ArtifactRef::new("file:///tmp/x"),
        }
    }

    #[test]
    fn terminal_states_are_sticky() {
        let completed = done();
        assert_eq!(completed.advance(JobState::Queued), completed);
        assert_eq!(completed.advance(JobState::running(10)), completed);
        let failed = JobState::failed(None, "policy");
        assert_eq!(failed.advance(done()), failed);
    }

    #[test]
    fn progress_never_decreases() {
        let s = JobState::running(50);
        assert_eq!(s.advance(JobState::running(20)), JobState::running(50));
        assert_eq!(s.advance(JobState::running(70)), JobState::running(70));
        assert_eq!(s.advance(JobState::Queued), JobState::running(50));
    }

    #[test]
    fn queued_moves_forward() {
        assert_eq!(JobState::Queued.advance(JobState::running(0)), JobState::running(0));
        assert_eq!(JobState::Queued.advance(done()), done());
    }

    #[test]
    fn running_clamps_progress() {
        assert_eq!(JobState::running(140.0), JobState::Running { progress: 100 });
        assert_eq!(JobState::running(-3.0), JobState::Running { progress: 0 });
        assert_eq!(JobState::running(f64::NAN), JobState::Running { progress: 0 });
    }
}
