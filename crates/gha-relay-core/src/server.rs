//! Event orchestration: one broker request in, two responses out.
//!
//! decode → `triggered` → resolve CI setup → (patch: start comment) → poll,
//! with progress comments on patches → aggregate → (patch: result comment) →
//! `finished`. Comment failures never abort the event; every other failure
//! becomes the error-shaped `finished` response.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, info, warn, Instrument};

use crate::aggregate::{aggregate, AggregateOutcome};
use crate::broker::{Broker, ErrorResponse, PatchEvent, RequestEvent, ResponseKind, ResponseMessage};
use crate::comment::{progress_message, result_message, start_message, CommentContext, CommentPoster};
use crate::config::PollConfig;
use crate::error::{RelayError, Result};
use crate::obs;
use crate::ops::{CiProvider, CommentClient};
use crate::poll::{Clock, IgnoreSnapshots, SnapshotObserver, WorkflowPoller};
use crate::settings::SettingsResolver;
use crate::workflow::{CiSettings, WorkflowResult};

/// Identity and scratch space of one invocation.
#[derive(Debug, Clone)]
pub struct EventContext {
    /// Correlation id reported in the `triggered` response.
    pub event_id: String,
    /// Must be unique per invocation; removed after CI-setup resolution.
    pub scratch_path: PathBuf,
}

/// Answers one broker event, from trigger to final result.
pub struct RelayServer {
    resolver: SettingsResolver,
    provider: Arc<dyn CiProvider>,
    comments: CommentPoster,
    clock: Arc<dyn Clock>,
    poll: PollConfig,
}

impl RelayServer {
    pub fn new(
        resolver: SettingsResolver,
        provider: Arc<dyn CiProvider>,
        comments: Arc<dyn CommentClient>,
        clock: Arc<dyn Clock>,
        poll: PollConfig,
    ) -> Self {
        Self {
            resolver,
            provider,
            comments: CommentPoster::new(comments),
            clock,
            poll,
        }
    }

    /// Serve one event, reporting any fatal failure (panics included) to the
    /// broker as an error response.
    ///
    /// Only fails when that error response itself cannot be written.
    pub async fn run<B: Broker + ?Sized>(&self, broker: &mut B, ctx: &EventContext) -> Result<()> {
        self.run_inner(broker, ctx)
            .instrument(obs::event_span(&ctx.event_id))
            .await
    }

    async fn run_inner<B: Broker + ?Sized>(&self, broker: &mut B, ctx: &EventContext) -> Result<()> {
        info!("serving event");

        let err = match AssertUnwindSafe(self.serve(broker, ctx)).catch_unwind().await {
            Ok(Ok(_)) => return Ok(()),
            Ok(Err(e)) => e,
            Err(panic) => RelayError::Panic(panic_message(panic)),
        };

        error!(error = %err, "could not serve GitHub Actions event");
        if let Err(write_err) = broker.serve_error_response(&ErrorResponse::new(&err)).await {
            error!(error = %write_err, "could not respond to broker");
            return Err(write_err.into());
        }
        Ok(())
    }

    /// The regular path; any error returned is fatal for the event.
    pub async fn serve<B: Broker + ?Sized>(
        &self,
        broker: &mut B,
        ctx: &EventContext,
    ) -> Result<AggregateOutcome> {
        let event = broker.read_request().await?;
        obs::emit_event_decoded(event.kind(), event.repo(), event.commit());

        broker
            .serve_response(&ResponseMessage::triggered(ctx.event_id.clone()))
            .await?;

        let outcome = self.relay(&event, ctx).await?;
        if outcome.kind != ResponseKind::Finished {
            warn!("reporting workflows that did not complete in time");
        }

        broker
            .serve_response(&ResponseMessage::finished(outcome.result, outcome.details()))
            .await?;
        obs::emit_event_finished(outcome.result, outcome.runs.len());
        Ok(outcome)
    }

    /// Resolve, poll, aggregate, and keep the patch comment current.
    pub async fn relay(&self, event: &RequestEvent, ctx: &EventContext) -> Result<AggregateOutcome> {
        let settings = self
            .resolver
            .resolve(event.repo(), event.commit(), &ctx.scratch_path)
            .await?;
        obs::emit_ci_resolved(event.repo(), settings.is_some());
        let Some(settings) = settings else {
            warn!("repo has no GitHub Actions setup");
            return Ok(AggregateOutcome::vacuous());
        };

        let poller = WorkflowPoller::new(self.provider.as_ref(), self.clock.as_ref(), self.poll.clone());
        let outcome = match event {
            RequestEvent::Push(_) => {
                let runs = poller
                    .wait(&settings, event.commit(), &mut IgnoreSnapshots)
                    .await?;
                aggregate(runs)
            }
            RequestEvent::Patch(patch) => {
                let mut comment = CommentContext::new();
                self.comments.post(&mut comment, patch, &start_message()).await;

                let mut progress = ProgressComments {
                    poster: &self.comments,
                    comment: &mut comment,
                    event: patch,
                    settings: &settings,
                };
                let runs = poller.wait(&settings, event.commit(), &mut progress).await?;

                let outcome = aggregate(runs);
                self.comments
                    .post(&mut comment, patch, &result_message(&settings, &outcome))
                    .await;
                outcome
            }
        };
        Ok(outcome)
    }
}

/// Posts the progress comment for every incomplete snapshot.
struct ProgressComments<'a> {
    poster: &'a CommentPoster,
    comment: &'a mut CommentContext,
    event: &'a PatchEvent,
    settings: &'a CiSettings,
}

#[async_trait]
impl SnapshotObserver for ProgressComments<'_> {
    async fn on_snapshot(&mut self, snapshot: &[WorkflowResult]) -> anyhow::Result<()> {
        let body = progress_message(self.settings, snapshot);
        self.poster.post(self.comment, self.event, &body).await;
        Ok(())
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extracts_str_and_string() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("bang".to_string())), "bang");
        assert_eq!(panic_message(Box::new(42_u8)), "unknown panic");
    }
}
