//! Patch comment bodies.

use std::fmt::Write;

use crate::aggregate::AggregateOutcome;
use crate::broker::OverallResult;
use crate::workflow::{CiSettings, WorkflowConclusion, WorkflowResult};

pub fn start_message() -> String {
    "Checking for GitHub Actions Workflows.".to_string()
}

/// Body for a non-terminal snapshot.
pub fn progress_message(settings: &CiSettings, runs: &[WorkflowResult]) -> String {
    let mut message = String::from("GitHub Actions Workflows ⏳\n\nWorkflows:");
    for run in runs {
        let icon = match run.conclusion {
            Some(WorkflowConclusion::Success) => "✅",
            Some(WorkflowConclusion::Failure) => "❌",
            _ => "⏳",
        };
        push_run_line(&mut message, settings, run, icon);
    }
    message
}

/// Body for the final outcome, artifacts included.
pub fn result_message(settings: &CiSettings, outcome: &AggregateOutcome) -> String {
    let headline = match outcome.result {
        OverallResult::Success => "✅",
        OverallResult::Failure => "❌",
    };
    let mut message = format!(
        "GitHub Actions Result: {} {}\n\nDetails:",
        outcome.result.as_str(),
        headline
    );
    for run in &outcome.runs {
        let icon = match run.conclusion {
            Some(WorkflowConclusion::Success) => "✅",
            Some(WorkflowConclusion::Failure) => "❌",
            _ => "⚠️",
        };
        push_run_line(&mut message, settings, run, icon);
        for artifact in &run.artifacts {
            let _ = write!(message, "\n   - [{}]({})", artifact.name, artifact.url);
        }
    }
    message
}

fn push_run_line(message: &mut String, settings: &CiSettings, run: &WorkflowResult, icon: &str) {
    let _ = write!(
        message,
        "\n\n - [{} ({}) {}]({} \"{}\")",
        run.name,
        run.id,
        icon,
        settings.run_url(&run.id),
        run.label()
    );
}
