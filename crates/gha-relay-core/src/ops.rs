//! Collaborator traits consumed by the relay.
//!
//! These are the seams to the outside world:
//! - `SourceControl`: materialize a repository at a commit
//! - `CiProvider`: commit lookup and workflow run listing
//! - `CommentClient`: create or edit a patch revision comment
//!
//! Concrete implementations live in `gha-relay-clients`; in-memory fakes are
//! provided by the `fakes` module.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{CommentError, ProviderError, SourceControlError};
use crate::workflow::WorkflowResult;

#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Clone `remote_url` into `destination` and check out `commit`.
    ///
    /// Does not remove `destination` afterwards; the caller owns it.
    async fn materialize(
        &self,
        remote_url: &str,
        commit: &str,
        destination: &Path,
    ) -> Result<(), SourceControlError>;
}

#[async_trait]
pub trait CiProvider: Send + Sync {
    /// Fails with `ProviderError::CommitNotFound` if the mirror lacks `commit`.
    async fn check_commit_exists(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
    ) -> Result<(), ProviderError>;

    /// All workflow runs for `commit`, with artifacts, in provider order.
    /// An empty list is not an error.
    async fn list_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
    ) -> Result<Vec<WorkflowResult>, ProviderError>;
}

#[async_trait]
pub trait CommentClient: Send + Sync {
    /// Create a comment on `revision_id`, or edit `existing_comment_id` when
    /// given. Returns the id of the comment that now carries `body`.
    async fn post_or_edit_comment(
        &self,
        repo_id: &str,
        patch_id: &str,
        revision_id: &str,
        body: &str,
        existing_comment_id: Option<&str>,
    ) -> Result<String, CommentError>;
}
