use serde::Serialize;

/// Why a run stopped before reaching the end of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStop {
    Paused,
    Cancelled,
}

/// How a run ended, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every scheduled record uploaded (or nothing to do).
    Completed,
    /// Some records uploaded, some failed.
    PartialSuccess,
    /// Nothing uploaded and at least one failure.
    Failed,
    Paused,
    Cancelled,
}

/// Tally of a single run. Counts cover the records scheduled for that run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub uploaded: usize,
    pub failed: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<RunStop>,
}

impl RunResult {
    /// Result of a run with nothing to upload.
    pub fn empty() -> Self {
        Self {
            uploaded: 0,
            failed: 0,
            success: true,
            stop: None,
        }
    }

    pub(crate) fn new(uploaded: usize, failed: usize, stop: Option<RunStop>) -> Self {
        Self {
            uploaded,
            failed,
            success: failed == 0 && stop.is_none(),
            stop,
        }
    }

    pub fn is_partial_success(&self) -> bool {
        !self.success && self.uploaded > 0
    }

    pub fn outcome(&self) -> RunOutcome {
        match self.stop {
            Some(RunStop::Cancelled) => RunOutcome::Cancelled,
            Some(RunStop::Paused) => RunOutcome::Paused,
            None if self.failed == 0 => RunOutcome::Completed,
            None if self.uploaded > 0 => RunOutcome::PartialSuccess,
            None => RunOutcome::Failed,
        }
    }
}
