//! GHA Relay - GitHub Actions adapter for the Radicle CI broker
//!
//! The `gha-relay` command reads one trigger request from stdin, writes the
//! `triggered` and `finished` responses to stdout, and logs to stderr.
//!
//! Every option can also be given through the environment variable shown in
//! `--help`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use uuid::Uuid;

use gha_relay_clients::{GitCli, GitHubClient, RadicleHttpd};
use gha_relay_core::telemetry::{init_tracing, parse_level};
use gha_relay_core::{
    expand_home, EventContext, PollConfig, RelayConfig, RelayServer, SettingsResolver,
    StreamBroker, TokioClock, VERSION,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "gha-relay")]
#[command(author = "Stevedores Org")]
#[command(version = VERSION)]
#[command(about = "Relay GitHub Actions results for Radicle pushes and patches", long_about = None)]
struct Cli {
    /// Log verbosity: debug, info, warn or error
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log line format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Emit JSON-formatted log lines (same as `--log-format json`)
    #[arg(long)]
    json: bool,

    /// Radicle home; repositories are read from its `storage` directory
    #[arg(long, env = "RAD_HOME", default_value = "~/.radicle")]
    radicle_home: PathBuf,

    /// Radicle httpd base URL used for patch comments
    #[arg(long, env = "RAD_HTTPD_URL", default_value = gha_relay_clients::radicle::DEFAULT_HTTPD_URL)]
    radicle_httpd_url: String,

    /// Radicle httpd session token
    #[arg(long, env = "RAD_SESSION_TOKEN", default_value = "", hide_env_values = true)]
    radicle_session_token: String,

    /// GitHub personal access token; empty queries anonymously
    #[arg(long, env = "GITHUB_PAT", default_value = "", hide_env_values = true)]
    github_token: String,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = gha_relay_clients::github::DEFAULT_API_URL)]
    github_api_url: String,

    /// Seconds to wait before the first workflow query (0 selects the default)
    #[arg(long, env = "WORKFLOWS_START_LAG_SECS", default_value_t = 0)]
    start_lag_secs: u64,

    /// Seconds between workflow queries (0 selects the default)
    #[arg(long, env = "WORKFLOWS_POLL_INTERVAL_SECS", default_value_t = 0)]
    poll_interval_secs: u64,

    /// Total seconds to wait for workflows (0 selects the default)
    #[arg(long, env = "WORKFLOWS_POLL_TIMEOUT_SECS", default_value_t = 0)]
    poll_timeout_secs: u64,

    /// Parent directory of per-event scratch checkouts (default: system temp dir)
    #[arg(long, env = "GHA_RELAY_SCRATCH_ROOT")]
    scratch_root: Option<PathBuf>,
}

impl Cli {
    fn json_logs(&self) -> bool {
        self.json || self.log_format == LogFormat::Json
    }

    fn relay_config(&self) -> RelayConfig {
        let defaults = RelayConfig::default();
        RelayConfig {
            radicle_home: expand_home(&self.radicle_home),
            radicle_httpd_url: self.radicle_httpd_url.clone(),
            radicle_session_token: self.radicle_session_token.clone(),
            github_token: self.github_token.clone(),
            github_api_url: self.github_api_url.clone(),
            scratch_root: self.scratch_root.clone().unwrap_or(defaults.scratch_root),
            poll: PollConfig::from_secs(
                self.start_lag_secs,
                self.poll_interval_secs,
                self.poll_timeout_secs,
            ),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs(), parse_level(&cli.log_level));
    run(cli.relay_config()).await
}

async fn run(config: RelayConfig) -> Result<()> {
    info!(
        version = VERSION,
        radicle_home = %config.radicle_home.display(),
        radicle_httpd_url = %config.radicle_httpd_url,
        radicle_session_token_len = config.radicle_session_token.len(),
        github_api_url = %config.github_api_url,
        github_token_len = config.github_token.len(),
        start_lag = ?config.poll.start_lag,
        poll_interval = ?config.poll.poll_interval,
        poll_timeout = ?config.poll.timeout,
        "starting GitHub Actions relay"
    );

    let event_id = Uuid::new_v4().to_string();
    let ctx = EventContext {
        scratch_path: config.scratch_path(&event_id),
        event_id,
    };

    let provider = GitHubClient::new(&config.github_api_url, &config.github_token)
        .context("could not build GitHub client")?;
    let comments = RadicleHttpd::new(&config.radicle_httpd_url, &config.radicle_session_token)
        .context("could not build Radicle httpd client")?;
    let server = RelayServer::new(
        SettingsResolver::new(Arc::new(GitCli::new()), config.radicle_home.clone()),
        Arc::new(provider),
        Arc::new(comments),
        Arc::new(TokioClock),
        config.poll.clone(),
    );

    let mut broker = StreamBroker::new(tokio::io::stdin(), tokio::io::stdout());
    server
        .run(&mut broker, &ctx)
        .await
        .context("could not respond to broker")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("gha-relay").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_build_relay_config() {
        let cli = parse(&[
            "--radicle-home",
            "/var/lib/radicle",
            "--radicle-httpd-url",
            "http://seed.example:8080",
            "--github-api-url",
            "https://ghe.example/api/v3",
            "--github-token",
            "ghp_secret",
            "--start-lag-secs",
            "5",
            "--poll-interval-secs",
            "10",
            "--poll-timeout-secs",
            "0",
            "--scratch-root",
            "/scratch",
        ]);
        let config = cli.relay_config();

        assert_eq!(config.radicle_home, PathBuf::from("/var/lib/radicle"));
        assert_eq!(config.radicle_httpd_url, "http://seed.example:8080");
        assert_eq!(config.github_api_url, "https://ghe.example/api/v3");
        assert_eq!(config.github_token, "ghp_secret");
        assert_eq!(config.poll.start_lag, Duration::from_secs(5));
        assert_eq!(config.poll.poll_interval, Duration::from_secs(10));
        assert_eq!(config.poll.timeout, gha_relay_core::config::DEFAULT_POLL_TIMEOUT);
        assert_eq!(config.scratch_path("e1"), PathBuf::from("/scratch/gha-relay-e1"));
    }

    #[test]
    fn test_log_format_selection() {
        assert!(parse(&["--json", "--log-format", "text"]).json_logs());
        assert!(parse(&["--log-format", "json"]).json_logs());
        assert!(!parse(&["--log-format", "text"]).json_logs());
    }

    #[test]
    fn test_rejects_non_numeric_durations() {
        let result = Cli::try_parse_from(["gha-relay", "--poll-interval-secs", "soon"]);
        assert!(result.is_err());
    }
}
