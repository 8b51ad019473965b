//! Reduce workflow run snapshots to an overall outcome.

use crate::broker::{OverallResult, ResponseKind, WorkflowDetails};
use crate::workflow::WorkflowResult;

/// Overall outcome of a snapshot, runs kept in provider order.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOutcome {
    /// `Finished` when every run completed, `InProgress` otherwise.
    pub kind: ResponseKind,
    pub result: OverallResult,
    pub runs: Vec<WorkflowResult>,
}

impl AggregateOutcome {
    /// Outcome when the repository has no CI configured.
    pub fn vacuous() -> Self {
        aggregate(Vec::new())
    }

    pub fn details(&self) -> Vec<WorkflowDetails> {
        self.runs.iter().map(WorkflowDetails::from).collect()
    }
}

/// Success iff every run concluded with success; vacuously so for no runs.
pub fn aggregate(runs: Vec<WorkflowResult>) -> AggregateOutcome {
    let result = if runs.iter().all(WorkflowResult::succeeded) {
        OverallResult::Success
    } else {
        OverallResult::Failure
    };
    let kind = if runs.iter().all(WorkflowResult::is_completed) {
        ResponseKind::Finished
    } else {
        ResponseKind::InProgress
    };
    AggregateOutcome { kind, result, runs }
}
