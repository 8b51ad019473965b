//! Relay configuration.
//!
//! Values are supplied by the binary (flags with environment fallbacks); a
//! zero duration selects the default, matching the broker deployment docs.

use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_START_LAG: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Timing of the poll/wait engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before the first query, so GitHub can register new runs.
    pub start_lag: Duration,
    pub poll_interval: Duration,
    /// Total wait budget, start lag included.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            start_lag: DEFAULT_START_LAG,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollConfig {
    /// Build from whole seconds; zero selects the default.
    pub fn from_secs(start_lag: u64, poll_interval: u64, timeout: u64) -> Self {
        let or_default = |secs: u64, default: Duration| {
            if secs == 0 {
                default
            } else {
                Duration::from_secs(secs)
            }
        };
        Self {
            start_lag: or_default(start_lag, DEFAULT_START_LAG),
            poll_interval: or_default(poll_interval, DEFAULT_POLL_INTERVAL),
            timeout: or_default(timeout, DEFAULT_POLL_TIMEOUT),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Radicle home; repositories live under `<home>/storage`.
    pub radicle_home: PathBuf,
    pub radicle_httpd_url: String,
    pub radicle_session_token: String,
    pub github_token: String,
    pub github_api_url: String,
    /// Parent of the per-event scratch directories.
    pub scratch_root: PathBuf,
    pub poll: PollConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            radicle_home: expand_home("~/.radicle"),
            radicle_httpd_url: "http://127.0.0.1:8080".to_string(),
            radicle_session_token: String::new(),
            github_token: String::new(),
            github_api_url: "https://api.github.com".to_string(),
            scratch_root: std::env::temp_dir(),
            poll: PollConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Scratch directory for one event, unique per correlation id.
    pub fn scratch_path(&self, event_id: &str) -> PathBuf {
        self.scratch_root.join(format!("gha-relay-{event_id}"))
    }
}

/// Expand a leading `~` to the user's home directory.
///
/// Left untouched when no home directory is known.
pub fn expand_home(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME").filter(|home| !home.is_empty()) {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_selects_defaults() {
        let cfg = PollConfig::from_secs(0, 0, 0);
        assert_eq!(cfg, PollConfig::default());
    }

    #[test]
    fn test_explicit_values() {
        let cfg = PollConfig::from_secs(5, 10, 120);
        assert_eq!(cfg.start_lag, Duration::from_secs(5));
        assert_eq!(cfg.poll_interval, Duration::from_secs(10));
        assert_eq!(cfg.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/var/lib/radicle"), PathBuf::from("/var/lib/radicle"));
        assert_eq!(expand_home("relative/~dir"), PathBuf::from("relative/~dir"));
    }

    #[test]
    fn test_expand_home_prefix() {
        let Some(home) = std::env::var_os("HOME").filter(|h| !h.is_empty()) else {
            return;
        };
        assert_eq!(expand_home("~/.radicle"), PathBuf::from(home).join(".radicle"));
    }

    #[test]
    fn test_scratch_path_is_per_event() {
        let cfg = RelayConfig {
            scratch_root: PathBuf::from("/tmp"),
            ..Default::default()
        };
        assert_eq!(cfg.scratch_path("abc"), PathBuf::from("/tmp/gha-relay-abc"));
        assert_ne!(cfg.scratch_path("abc"), cfg.scratch_path("def"));
    }
}
