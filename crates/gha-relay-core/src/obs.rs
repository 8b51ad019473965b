//! Structured observability hooks for one relay invocation.
//!
//! - `event_span` tagging every log line with the event id
//! - emission functions for lifecycle events: decoded, CI resolved, poll
//!   snapshot, finished, comment failure

use tracing::{info, warn};

use crate::broker::OverallResult;

/// Span tagging every log line of one invocation with its event id.
pub fn event_span(event_id: &str) -> tracing::Span {
    tracing::info_span!("gha_relay.event", event_id = %event_id)
}

/// Emit event: request decoded.
pub fn emit_event_decoded(kind: &str, repo: &str, commit: &str) {
    info!(event = "event.decoded", kind = %kind, repo = %repo, commit = %commit);
}

/// Emit event: CI setup resolved (`configured == false` means no CI).
pub fn emit_ci_resolved(repo: &str, configured: bool) {
    info!(event = "ci.resolved", repo = %repo, configured = configured);
}

/// Emit event: one poll snapshot observed.
pub fn emit_poll_snapshot(runs: usize, pending: usize) {
    info!(event = "poll.snapshot", runs = runs, pending = pending);
}

/// Emit event: terminal outcome reported.
pub fn emit_event_finished(result: OverallResult, runs: usize) {
    info!(event = "event.finished", result = result.as_str(), runs = runs);
}

/// Emit event: comment could not be posted (warning level).
pub fn emit_comment_failed(patch_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "comment.failed", patch_id = %patch_id, error = %error, "could not comment on patch");
}
