//! Response messages written back to the broker.

use serde::{Deserialize, Serialize};

use crate::workflow::{WorkflowArtifact, WorkflowResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResponseKind {
    #[serde(rename = "triggered")]
    Triggered,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "finished")]
    Finished,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverallResult {
    Success,
    Failure,
}

impl OverallResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallResult::Success => "success",
            OverallResult::Failure => "failure",
        }
    }
}

/// Correlation id of one invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunId {
    pub id: String,
}

/// Per-run entry of a finished response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowDetails {
    pub workflow_id: String,
    pub workflow_name: String,
    pub workflow_result: String,
    pub workflow_artifacts: Vec<WorkflowArtifact>,
}

impl From<&WorkflowResult> for WorkflowDetails {
    fn from(result: &WorkflowResult) -> Self {
        Self {
            workflow_id: result.id.clone(),
            workflow_name: result.name.clone(),
            workflow_result: result.label().to_string(),
            workflow_artifacts: result.artifacts.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseMessage {
    pub response: ResponseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<OverallResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub result_details: Vec<WorkflowDetails>,
}

impl ResponseMessage {
    pub fn triggered(run_id: impl Into<String>) -> Self {
        Self {
            response: ResponseKind::Triggered,
            run_id: Some(RunId { id: run_id.into() }),
            result: None,
            result_details: Vec::new(),
        }
    }

    pub fn finished(result: OverallResult, result_details: Vec<WorkflowDetails>) -> Self {
        Self {
            response: ResponseKind::Finished,
            run_id: None,
            result: Some(result),
            result_details,
        }
    }
}

/// Terminal response for a fatal failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub response: ResponseKind,
    pub result: ErrorMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorMessage {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl std::fmt::Display) -> Self {
        Self {
            response: ResponseKind::Finished,
            result: ErrorMessage {
                error: error.to_string(),
            },
        }
    }
}
