//! Idempotent patch status comment.
//!
//! One comment per patch lifecycle: the first post creates it, every later
//! post edits the same comment. The remembered id lives in a per-event
//! [`CommentContext`], never in the poster itself.

pub mod template;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::broker::PatchEvent;
use crate::error::CommentError;
use crate::obs;
use crate::ops::CommentClient;

pub use template::{progress_message, result_message, start_message};

/// Upper bound on a single create or edit call.
pub const DEFAULT_COMMENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CommentState {
    #[default]
    NoComment,
    Posted(String),
    Edited(String),
}

/// Per-event comment bookkeeping.
#[derive(Debug, Default)]
pub struct CommentContext {
    state: CommentState,
}

impl CommentContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CommentState {
        &self.state
    }

    pub fn comment_id(&self) -> Option<&str> {
        match &self.state {
            CommentState::NoComment => None,
            CommentState::Posted(id) | CommentState::Edited(id) => Some(id),
        }
    }

    fn record(&mut self, id: String) {
        self.state = match self.state {
            CommentState::NoComment => CommentState::Posted(id),
            CommentState::Posted(_) | CommentState::Edited(_) => CommentState::Edited(id),
        };
    }
}

/// Posts the patch status comment through a [`CommentClient`], never failing.
pub struct CommentPoster {
    client: Arc<dyn CommentClient>,
    timeout: Duration,
}

impl CommentPoster {
    pub fn new(client: Arc<dyn CommentClient>) -> Self {
        Self {
            client,
            timeout: DEFAULT_COMMENT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create or update the status comment on the patch's latest revision.
    ///
    /// Failures are logged and swallowed; returns whether the post landed.
    pub async fn post(&self, ctx: &mut CommentContext, event: &PatchEvent, body: &str) -> bool {
        match self.try_post(ctx, event, body).await {
            Ok(()) => true,
            Err(e) => {
                obs::emit_comment_failed(&event.patch.id, &e);
                false
            }
        }
    }

    async fn try_post(
        &self,
        ctx: &mut CommentContext,
        event: &PatchEvent,
        body: &str,
    ) -> Result<(), CommentError> {
        let revision = event
            .latest_revision()
            .ok_or_else(|| CommentError::MissingRevision {
                patch_id: event.patch.id.clone(),
            })?;

        let call = self.client.post_or_edit_comment(
            &event.repository.id,
            &event.patch.id,
            &revision.id,
            body,
            ctx.comment_id(),
        );
        let id = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| CommentError::Timeout(self.timeout))??;

        // An empty id leaves nothing to edit later.
        if !id.is_empty() {
            ctx.record(id);
        }
        debug!(
            patch_id = %event.patch.id,
            revision_id = %revision.id,
            revision_created_at = ?revision.created_at(),
            state = ?ctx.state(),
            "patch comment updated"
        );
        Ok(())
    }
}
