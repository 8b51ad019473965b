//! Poll/wait engine: query workflow runs until they complete or time runs out.
//!
//! A timeout is not an error; the latest snapshot is returned instead. The
//! whole wait is bounded by `timeout + poll_interval` from invocation, also
//! when the provider itself stalls.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::PollConfig;
use crate::error::ProviderError;
use crate::obs;
use crate::ops::CiProvider;
use crate::workflow::{CiSettings, WorkflowResult};

/// Time source and sleeper for the poll loop.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Receives each incomplete snapshot before the poller sleeps.
///
/// Errors are logged and discarded; they never stop the loop. A call that
/// outlives the remaining wait budget is abandoned.
#[async_trait]
pub trait SnapshotObserver: Send {
    async fn on_snapshot(&mut self, snapshot: &[WorkflowResult]) -> anyhow::Result<()>;
}

/// Observer that does nothing.
#[derive(Debug, Default)]
pub struct IgnoreSnapshots;

#[async_trait]
impl SnapshotObserver for IgnoreSnapshots {
    async fn on_snapshot(&mut self, _snapshot: &[WorkflowResult]) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Waits for the workflow runs of one commit, bounded by [`PollConfig`].
pub struct WorkflowPoller<'a> {
    provider: &'a dyn CiProvider,
    clock: &'a dyn Clock,
    config: PollConfig,
}

impl<'a> WorkflowPoller<'a> {
    pub fn new(provider: &'a dyn CiProvider, clock: &'a dyn Clock, config: PollConfig) -> Self {
        Self {
            provider,
            clock,
            config,
        }
    }

    /// Wait for every workflow run of `commit` to complete.
    ///
    /// Returns as soon as the run list is empty or fully completed, or with
    /// the latest snapshot once the timeout is reached. A failed query is
    /// returned immediately.
    pub async fn wait(
        &self,
        settings: &CiSettings,
        commit: &str,
        observer: &mut dyn SnapshotObserver,
    ) -> Result<Vec<WorkflowResult>, ProviderError> {
        let deadline = self.clock.now() + self.config.timeout;

        let lag = self.config.start_lag.min(self.config.timeout);
        debug!(?lag, "waiting for workflows to be registered");
        self.clock.sleep(lag).await;

        let mut latest: Option<Vec<WorkflowResult>> = None;
        loop {
            let budget = self.remaining(deadline) + self.config.poll_interval;
            let snapshot = match tokio::time::timeout(budget, self.query(settings, commit)).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(?budget, "workflow query did not return in time");
                    return latest.ok_or(ProviderError::Timeout(budget));
                }
            };

            let pending = snapshot.iter().filter(|r| !r.is_completed()).count();
            obs::emit_poll_snapshot(snapshot.len(), pending);
            if pending == 0 {
                return Ok(snapshot);
            }

            let remaining = self.remaining(deadline);
            if remaining.is_zero() {
                warn!(pending, "reached timeout while waiting for workflows to complete");
                return Ok(snapshot);
            }

            // The observer shares the wait budget.
            match tokio::time::timeout(remaining, observer.on_snapshot(&snapshot)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "snapshot observer failed"),
                Err(_) => warn!(?remaining, "snapshot observer did not return in time"),
            }

            let remaining = self.remaining(deadline);
            if remaining.is_zero() {
                warn!(pending, "reached timeout while waiting for workflows to complete");
                return Ok(snapshot);
            }
            latest = Some(snapshot);

            self.clock
                .sleep(self.config.poll_interval.min(remaining))
                .await;
        }
    }

    async fn query(
        &self,
        settings: &CiSettings,
        commit: &str,
    ) -> Result<Vec<WorkflowResult>, ProviderError> {
        self.provider
            .check_commit_exists(&settings.owner, &settings.repo, commit)
            .await?;
        self.provider
            .list_workflow_runs(&settings.owner, &settings.repo, commit)
            .await
    }

    fn remaining(&self, deadline: Instant) -> Duration {
        deadline.saturating_duration_since(self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeCiProvider, ManualClock};
    use crate::workflow::{WorkflowConclusion, WorkflowStatus};

    fn settings() -> CiSettings {
        CiSettings::new("octo", "demo")
    }

    fn config() -> PollConfig {
        PollConfig {
            start_lag: Duration::from_secs(60),
            poll_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(300),
        }
    }

    fn running(id: &str) -> WorkflowResult {
        WorkflowResult::new(id, format!("wf{id}"), WorkflowStatus::InProgress)
    }

    fn passed(id: &str) -> WorkflowResult {
        WorkflowResult::new(id, format!("wf{id}"), WorkflowStatus::Completed)
            .with_conclusion(WorkflowConclusion::Success)
    }

    #[derive(Default)]
    struct CountingObserver {
        seen: Vec<usize>,
        fail: bool,
    }

    #[async_trait]
    impl SnapshotObserver for CountingObserver {
        async fn on_snapshot(&mut self, snapshot: &[WorkflowResult]) -> anyhow::Result<()> {
            self.seen.push(snapshot.len());
            if self.fail {
                anyhow::bail!("observer broke");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_returns_completed_snapshot_and_notifies_progress() {
        let provider = FakeCiProvider::new()
            .then_runs(vec![running("1"), running("2")])
            .then_runs(vec![passed("1"), running("2")])
            .then_runs(vec![passed("1"), passed("2")]);
        let clock = ManualClock::new();
        let mut observer = CountingObserver::default();

        let results = WorkflowPoller::new(&provider, &clock, config())
            .wait(&settings(), "abc", &mut observer)
            .await
            .unwrap();

        assert_eq!(results, vec![passed("1"), passed("2")]);
        assert_eq!(observer.seen, vec![2, 2]);
        assert_eq!(provider.list_calls(), 3);
        assert_eq!(clock.elapsed(), Duration::from_secs(60 + 30 + 30));
    }

    #[tokio::test]
    async fn test_empty_run_list_returns_immediately() {
        let provider = FakeCiProvider::new().then_runs(vec![]);
        let clock = ManualClock::new();

        let results = WorkflowPoller::new(&provider, &clock, config())
            .wait(&settings(), "abc", &mut IgnoreSnapshots)
            .await
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(provider.list_calls(), 1);
        assert_eq!(clock.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_timeout_returns_partial_snapshot() {
        let provider = FakeCiProvider::new().then_runs(vec![passed("1"), running("2")]);
        let clock = ManualClock::new();

        let results = WorkflowPoller::new(&provider, &clock, config())
            .wait(&settings(), "abc", &mut IgnoreSnapshots)
            .await
            .unwrap();

        assert_eq!(results, vec![passed("1"), running("2")]);
        let cfg = config();
        assert!(clock.elapsed() <= cfg.timeout + cfg.poll_interval);
        // lag 60s, then every 30s up to 300s: queries at 60, 90, ..., 300
        assert_eq!(provider.list_calls(), 9);
    }

    #[tokio::test]
    async fn test_query_failure_is_fatal() {
        let provider = FakeCiProvider::new()
            .then_runs(vec![running("1")])
            .then_error(ProviderError::Http {
                status: 502,
                message: "bad gateway".to_string(),
            });
        let clock = ManualClock::new();

        let err = WorkflowPoller::new(&provider, &clock, config())
            .wait(&settings(), "abc", &mut IgnoreSnapshots)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Http { status: 502, .. }));
        assert_eq!(provider.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_commit_is_fatal() {
        let provider = FakeCiProvider::new()
            .then_runs(vec![passed("1")])
            .without_commit();
        let clock = ManualClock::new();

        let err = WorkflowPoller::new(&provider, &clock, config())
            .wait(&settings(), "abc", &mut IgnoreSnapshots)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::CommitNotFound { .. }));
        assert_eq!(provider.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_observer_errors_do_not_stop_polling() {
        let provider = FakeCiProvider::new()
            .then_runs(vec![running("1")])
            .then_runs(vec![passed("1")]);
        let clock = ManualClock::new();
        let mut observer = CountingObserver {
            fail: true,
            ..Default::default()
        };

        let results = WorkflowPoller::new(&provider, &clock, config())
            .wait(&settings(), "abc", &mut observer)
            .await
            .unwrap();

        assert_eq!(results, vec![passed("1")]);
        assert_eq!(observer.seen, vec![1]);
    }

    #[tokio::test]
    async fn test_start_lag_is_clamped_to_timeout() {
        let provider = FakeCiProvider::new().then_runs(vec![running("1")]);
        let clock = ManualClock::new();
        let cfg = PollConfig {
            start_lag: Duration::from_secs(600),
            poll_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(120),
        };

        let results = WorkflowPoller::new(&provider, &clock, cfg.clone())
            .wait(&settings(), "abc", &mut IgnoreSnapshots)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(clock.elapsed(), cfg.timeout);
        assert_eq!(provider.list_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_provider_is_bounded() {
        let provider = FakeCiProvider::new()
            .then_runs(vec![running("1")])
            .with_latency(Duration::from_secs(3600));
        let clock = TokioClock;
        let cfg = config();
        let started = Instant::now();

        let err = WorkflowPoller::new(&provider, &clock, cfg.clone())
            .wait(&settings(), "abc", &mut IgnoreSnapshots)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Timeout(_)));
        // one second of slack for timer resolution
        assert!(started.elapsed() <= cfg.timeout + cfg.poll_interval + Duration::from_secs(1));
        assert!(started.elapsed() >= cfg.timeout);
    }

    /// Observer standing in for a slow progress comment.
    struct SlowObserver {
        delay: Duration,
        started: usize,
    }

    #[async_trait]
    impl SnapshotObserver for SlowObserver {
        async fn on_snapshot(&mut self, _snapshot: &[WorkflowResult]) -> anyhow::Result<()> {
            self.started += 1;
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_observer_stays_within_bound() {
        let provider = FakeCiProvider::new().then_runs(vec![running("1")]);
        let clock = TokioClock;
        let cfg = config();
        let mut observer = SlowObserver {
            delay: Duration::from_secs(200),
            started: 0,
        };
        let started = Instant::now();

        let results = WorkflowPoller::new(&provider, &clock, cfg.clone())
            .wait(&settings(), "abc", &mut observer)
            .await
            .unwrap();

        assert_eq!(results, vec![running("1")]);
        // lag 60s, query, observer until 260s, sleep to 290s, query, observer cut at 300s
        assert_eq!(provider.list_calls(), 2);
        assert_eq!(observer.started, 2);
        // one second of slack for timer resolution
        assert!(started.elapsed() <= cfg.timeout + cfg.poll_interval + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_observer_overrunning_clock_ends_wait() {
        let provider = FakeCiProvider::new().then_runs(vec![running("1")]);
        let clock = ManualClock::new();

        struct ClockHog<'a> {
            clock: &'a ManualClock,
        }

        #[async_trait]
        impl SnapshotObserver for ClockHog<'_> {
            async fn on_snapshot(&mut self, _snapshot: &[WorkflowResult]) -> anyhow::Result<()> {
                self.clock.sleep(Duration::from_secs(500)).await;
                Ok(())
            }
        }

        let results = WorkflowPoller::new(&provider, &clock, config())
            .wait(&settings(), "abc", &mut ClockHog { clock: &clock })
            .await
            .unwrap();

        assert_eq!(results, vec![running("1")]);
        assert_eq!(provider.list_calls(), 1, "no query after the budget is spent");
        assert_eq!(clock.elapsed(), Duration::from_secs(60 + 500), "no sleep after the budget is spent");
    }
}
