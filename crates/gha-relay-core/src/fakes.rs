//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `FakeSourceControl`, `FakeCiProvider`, `FakeCommentClient`, and
//! `ManualClock` that satisfy the trait contracts without git, network, or
//! real time.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{CommentError, ProviderError, SourceControlError};
use crate::ops::{CiProvider, CommentClient, SourceControl};
use crate::poll::Clock;
use crate::workflow::WorkflowResult;

// ---------------------------------------------------------------------------
// FakeSourceControl
// ---------------------------------------------------------------------------

/// Materializes a fixed file tree into the destination directory.
#[derive(Debug, Default)]
pub struct FakeSourceControl {
    files: Vec<(String, String)>,
    failure: Option<String>,
    materialized: Mutex<Vec<(String, String)>>,
}

impl FakeSourceControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file at `path`, relative to the repository root.
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.to_string()));
        self
    }

    /// Write the tree, then fail like an aborted checkout.
    pub fn failing_after_write(mut self, stderr: &str) -> Self {
        self.failure = Some(stderr.to_string());
        self
    }

    /// `(remote_url, commit)` of every materialize call.
    pub fn materialized(&self) -> Vec<(String, String)> {
        self.materialized.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceControl for FakeSourceControl {
    async fn materialize(
        &self,
        remote_url: &str,
        commit: &str,
        destination: &Path,
    ) -> Result<(), SourceControlError> {
        self.materialized
            .lock()
            .unwrap()
            .push((remote_url.to_string(), commit.to_string()));

        std::fs::create_dir_all(destination)?;
        for (rel, content) in &self.files {
            let path = destination.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }

        match &self.failure {
            Some(stderr) => Err(SourceControlError::Command {
                command: "checkout".to_string(),
                stderr: stderr.clone(),
            }),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeCiProvider
// ---------------------------------------------------------------------------

/// Scripted provider: each list call consumes the next scripted response,
/// the last one repeats forever.
#[derive(Debug, Default)]
pub struct FakeCiProvider {
    script: Vec<Result<Vec<WorkflowResult>, ProviderError>>,
    missing_commit: bool,
    latency: Option<Duration>,
    list_calls: Mutex<usize>,
}

impl FakeCiProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_runs(mut self, runs: Vec<WorkflowResult>) -> Self {
        self.script.push(Ok(runs));
        self
    }

    pub fn then_error(mut self, err: ProviderError) -> Self {
        self.script.push(Err(err));
        self
    }

    /// Report every commit as absent from the mirror.
    pub fn without_commit(mut self) -> Self {
        self.missing_commit = true;
        self
    }

    /// Delay every list call, on the tokio timer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of list calls so far, failed ones included.
    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }
}

#[async_trait]
impl CiProvider for FakeCiProvider {
    async fn check_commit_exists(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
    ) -> Result<(), ProviderError> {
        if self.missing_commit {
            return Err(ProviderError::CommitNotFound {
                owner: owner.to_string(),
                repo: repo.to_string(),
                commit: commit.to_string(),
            });
        }
        Ok(())
    }

    async fn list_workflow_runs(
        &self,
        _owner: &str,
        _repo: &str,
        _commit: &str,
    ) -> Result<Vec<WorkflowResult>, ProviderError> {
        let call = {
            let mut calls = self.list_calls.lock().unwrap();
            *calls += 1;
            *calls - 1
        };
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.script.get(call).or_else(|| self.script.last()) {
            Some(response) => response.clone(),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeCommentClient
// ---------------------------------------------------------------------------

/// One recorded `post_or_edit_comment` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentCall {
    pub repo_id: String,
    pub patch_id: String,
    pub revision_id: String,
    pub body: String,
    pub existing_comment_id: Option<String>,
}

/// Records calls; creates ids `comment-1`, `comment-2`, ... and echoes the
/// existing id on edits.
#[derive(Debug, Default)]
pub struct FakeCommentClient {
    calls: Mutex<Vec<CommentCall>>,
    created: Mutex<usize>,
    failing: bool,
    latency: Option<Duration>,
}

impl FakeCommentClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every call with an HTTP 500.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Delay every call, on the tokio timer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<CommentCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of comments created (edits excluded).
    pub fn created(&self) -> usize {
        *self.created.lock().unwrap()
    }
}

#[async_trait]
impl CommentClient for FakeCommentClient {
    async fn post_or_edit_comment(
        &self,
        repo_id: &str,
        patch_id: &str,
        revision_id: &str,
        body: &str,
        existing_comment_id: Option<&str>,
    ) -> Result<String, CommentError> {
        self.calls.lock().unwrap().push(CommentCall {
            repo_id: repo_id.to_string(),
            patch_id: patch_id.to_string(),
            revision_id: revision_id.to_string(),
            body: body.to_string(),
            existing_comment_id: existing_comment_id.map(str::to_string),
        });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing {
            return Err(CommentError::Http {
                status: 500,
                message: "internal server error".to_string(),
            });
        }

        if let Some(id) = existing_comment_id {
            return Ok(id.to_string());
        }
        let mut created = self.created.lock().unwrap();
        *created += 1;
        Ok(format!("comment-{}", *created))
    }
}

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// Virtual clock: `sleep` advances time instantly.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time slept so far.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowStatus;

    #[tokio::test]
    async fn test_last_scripted_response_repeats() {
        let provider = FakeCiProvider::new()
            .then_runs(vec![])
            .then_runs(vec![WorkflowResult::new("1", "wf1", WorkflowStatus::Queued)]);

        assert!(provider.list_workflow_runs("o", "r", "c").await.unwrap().is_empty());
        for _ in 0..3 {
            assert_eq!(provider.list_workflow_runs("o", "r", "c").await.unwrap().len(), 1);
        }
        assert_eq!(provider.list_calls(), 4);
    }

    #[tokio::test]
    async fn test_comment_ids_are_unique_and_edits_echo() {
        let client = FakeCommentClient::new();
        let a = client.post_or_edit_comment("r", "p", "v", "a", None).await.unwrap();
        let b = client.post_or_edit_comment("r", "p", "v", "b", None).await.unwrap();
        let c = client.post_or_edit_comment("r", "p", "v", "c", Some(&a)).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(c, a);
        assert_eq!(client.created(), 2);
    }

    #[tokio::test]
    async fn test_manual_clock_advances_on_sleep() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_secs(90)).await;
        assert_eq!(clock.now() - start, Duration::from_secs(90));
    }
}
