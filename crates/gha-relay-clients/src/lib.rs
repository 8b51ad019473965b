//! Concrete collaborators for the GitHub Actions relay.
//!
//! - [`GitCli`]: repository materialization through the `git` binary
//! - [`GitHubClient`]: commit lookup and workflow runs over the GitHub REST API
//! - [`RadicleHttpd`]: patch revision comments through Radicle httpd

pub mod git;
pub mod github;
pub mod radicle;

pub use git::GitCli;
pub use github::GitHubClient;
pub use radicle::RadicleHttpd;
