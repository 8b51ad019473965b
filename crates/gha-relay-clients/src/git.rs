//! Repository materialization through the `git` binary.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use gha_relay_core::error::SourceControlError;
use gha_relay_core::ops::SourceControl;

/// [`SourceControl`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `git` executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run git, returning trimmed stdout.
    ///
    /// The first argument names the failed command in errors.
    async fn run<I, S>(&self, cwd: Option<&Path>, args: I) -> Result<String, SourceControlError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args
            .into_iter()
            .map(|arg| arg.as_ref().to_os_string())
            .collect();
        let command = args
            .first()
            .map(|arg| arg.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        debug!(?args, "running git");
        let output = cmd.output().await?;
        if !output.status.success() {
            return Err(SourceControlError::Command {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn commit_exists(&self, repo: &Path, commit: &str) -> bool {
        let object = format!("{commit}^{{commit}}");
        self.run(Some(repo), ["cat-file", "-e", object.as_str()])
            .await
            .is_ok()
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn materialize(
        &self,
        remote_url: &str,
        commit: &str,
        destination: &Path,
    ) -> Result<(), SourceControlError> {
        self.run(
            None,
            [
                OsStr::new("clone"),
                OsStr::new("--quiet"),
                OsStr::new(remote_url),
                destination.as_os_str(),
            ],
        )
        .await?;

        // Patch revisions live outside the default branch.
        self.run(
            Some(destination),
            ["fetch", "--quiet", "--update-head-ok", "origin", "+refs/*:refs/*"],
        )
        .await?;

        if !self.commit_exists(destination, commit).await {
            return Err(SourceControlError::CommitNotFound(commit.to_string()));
        }

        self.run(
            Some(destination),
            [
                "-c",
                "advice.detachedHead=false",
                "checkout",
                "--quiet",
                "--detach",
                commit,
            ],
        )
        .await?;

        self.run(
            Some(destination),
            ["submodule", "update", "--init", "--recursive", "--quiet"],
        )
        .await?;

        debug!(url = %remote_url, commit = %commit, path = %destination.display(), "repository materialized");
        Ok(())
    }
}
