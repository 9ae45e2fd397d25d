use crate::foundation::error::{SpriteError, SpriteResult};

/// Lifecycle stage of a pipeline job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Input accepted.
    Received,
    /// Video frames sampled.
    Sampled,
    /// Sampled frames encoded as an animation.
    Encoded,
    /// Sheet geometry known.
    GridResolved,
    /// Frames cut or extracted.
    Sliced,
    /// Segmentation calls finished.
    Dispatched,
    /// Output sheet(s) composed.
    Assembled,
    /// Job finished successfully.
    Completed,
    /// Job aborted by a fatal error.
    Failed,
}

impl JobState {
    /// `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_advance_to(self, next: JobState) -> bool {
        use JobState::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Received, Sampled)
                | (Received, GridResolved)
                | (Sampled, Encoded)
                | (Sampled, GridResolved)
                | (Encoded, GridResolved)
                | (Encoded, Completed)
                | (GridResolved, Sliced)
                | (GridResolved, Assembled)
                | (Sliced, Dispatched)
                | (Dispatched, Assembled)
                | (Assembled, Completed)
        )
    }
}

/// Ordered record of the states a job went through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobTrace {
    states: Vec<JobState>,
}

impl Default for JobTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTrace {
    /// Trace positioned at [`JobState::Received`].
    pub fn new() -> Self {
        Self {
            states: vec![JobState::Received],
        }
    }

    /// Latest state.
    pub fn current(&self) -> JobState {
        self.states.last().copied().unwrap_or(JobState::Received)
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn advance(&mut self, next: JobState) -> SpriteResult<()> {
        let current = self.current();
        if !current.can_advance_to(next) {
            return Err(SpriteError::Other(anyhow::anyhow!(
                "illegal job transition {current:?} -> {next:?}"
            )));
        }
        tracing::trace!(from = ?current, to = ?next, "job state");
        self.states.push(next);
        Ok(())
    }

    /// Mark the job failed unless it already finished.
    pub fn fail(&mut self) {
        if !self.current().is_terminal() {
            self.states.push(JobState::Failed);
        }
    }

    /// Every state visited, oldest first.
    pub fn states(&self) -> &[JobState] {
        &self.states
    }

    pub(crate) fn into_states(self) -> Vec<JobState> {
        self.states
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/job.rs"]
mod tests;
