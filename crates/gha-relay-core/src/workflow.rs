//! GitHub Actions settings and workflow run snapshots.

use serde::{Deserialize, Serialize};

/// GitHub Actions coordinates declared by a Radicle repository.
///
/// Read from `.radicle/github_actions.yaml`. Only meaningful when both fields
/// are non-empty and the tree carries at least one workflow file; the
/// resolver enforces that before handing one out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CiSettings {
    /// GitHub account (user or organisation) owning the mirror.
    #[serde(rename = "github_username")]
    pub owner: String,

    /// GitHub repository name of the mirror.
    #[serde(rename = "github_repo")]
    pub repo: String,
}

impl CiSettings {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Both coordinates are present.
    pub fn is_complete(&self) -> bool {
        !self.owner.trim().is_empty() && !self.repo.trim().is_empty()
    }

    /// Browser URL of a workflow run.
    pub fn run_url(&self, run_id: &str) -> String {
        format!(
            "https://github.com/{}/{}/actions/runs/{}",
            self.owner, self.repo, run_id
        )
    }
}

/// Lifecycle status of a workflow run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Queued,
    InProgress,
    Completed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Queued => "queued",
            WorkflowStatus::InProgress => "in_progress",
            WorkflowStatus::Completed => "completed",
        }
    }
}

/// Terminal conclusion of a completed workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowConclusion {
    Success,
    Failure,
    /// Any other provider conclusion (`cancelled`, `skipped`, `timed_out`, ...).
    Other(String),
}

impl WorkflowConclusion {
    /// Map a provider conclusion label.
    pub fn from_label(label: &str) -> Self {
        match label {
            "success" => WorkflowConclusion::Success,
            "failure" => WorkflowConclusion::Failure,
            other => WorkflowConclusion::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WorkflowConclusion::Success => "success",
            WorkflowConclusion::Failure => "failure",
            WorkflowConclusion::Other(label) => label,
        }
    }
}

/// A downloadable artifact produced by a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowArtifact {
    pub id: String,
    pub name: String,
    /// Browser URL.
    pub url: String,
    /// REST API URL.
    pub api_url: String,
}

/// Snapshot of one workflow run for a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowResult {
    pub id: String,
    pub name: String,
    pub status: WorkflowStatus,
    /// Absent until the run completes.
    pub conclusion: Option<WorkflowConclusion>,
    pub artifacts: Vec<WorkflowArtifact>,
}

impl WorkflowResult {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: WorkflowStatus) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            conclusion: None,
            artifacts: Vec::new(),
        }
    }

    pub fn with_conclusion(mut self, conclusion: WorkflowConclusion) -> Self {
        self.conclusion = Some(conclusion);
        self
    }

    pub fn with_artifact(mut self, artifact: WorkflowArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    pub fn succeeded(&self) -> bool {
        self.conclusion == Some(WorkflowConclusion::Success)
    }

    /// Conclusion label, falling back to the lifecycle status while running.
    pub fn label(&self) -> &str {
        match &self.conclusion {
            Some(conclusion) => conclusion.as_str(),
            None => self.status.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_completeness() {
        assert!(CiSettings::new("octo", "demo").is_complete());
        assert!(!CiSettings::new("", "demo").is_complete());
        assert!(!CiSettings::new("octo", "  ").is_complete());
    }

    #[test]
    fn test_settings_yaml_field_names() {
        let settings: CiSettings =
            serde_yaml::from_str("github_username: gh_username\ngithub_repo: gh_reponame")
                .expect("parse");
        assert_eq!(settings, CiSettings::new("gh_username", "gh_reponame"));
    }

    #[test]
    fn test_run_url() {
        let settings = CiSettings::new("octo", "demo");
        assert_eq!(
            settings.run_url("42"),
            "https://github.com/octo/demo/actions/runs/42"
        );
    }

    #[test]
    fn test_label_falls_back_to_status() {
        let running = WorkflowResult::new("1", "build", WorkflowStatus::InProgress);
        assert_eq!(running.label(), "in_progress");

        let done = WorkflowResult::new("2", "test", WorkflowStatus::Completed)
            .with_conclusion(WorkflowConclusion::from_label("cancelled"));
        assert_eq!(done.label(), "cancelled");
        assert!(!done.succeeded());
    }
}
