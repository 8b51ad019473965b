//! CI-setup resolution: does this repository use GitHub Actions at a commit?
//!
//! The repository is materialized into a per-event scratch directory, the
//! settings file and workflow directory are inspected, and the scratch
//! directory is removed again on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ResolverError;
use crate::ops::SourceControl;
use crate::workflow::CiSettings;

/// Settings file, relative to the repository root.
pub const SETTINGS_PATH: &str = ".radicle/github_actions.yaml";

/// Workflow definitions directory, relative to the repository root.
pub const WORKFLOWS_DIR: &str = ".github/workflows";

/// Strip the `rad:` scheme from a repository id.
pub fn normalize_repo_id(repo_id: &str) -> &str {
    repo_id.strip_prefix("rad:").unwrap_or(repo_id)
}

/// Exclusively owned scratch directory, removed on drop.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn claim(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "released scratch directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "could not remove scratch directory"
            ),
        }
    }
}

/// Resolves the [`CiSettings`] of a repository at a commit.
pub struct SettingsResolver {
    source: Arc<dyn SourceControl>,
    radicle_home: PathBuf,
}

impl SettingsResolver {
    pub fn new(source: Arc<dyn SourceControl>, radicle_home: impl Into<PathBuf>) -> Self {
        Self {
            source,
            radicle_home: radicle_home.into(),
        }
    }

    /// Local storage URL of a repository.
    pub fn storage_url(&self, repo_id: &str) -> String {
        format!(
            "file://{}/storage/{}",
            self.radicle_home.display(),
            normalize_repo_id(repo_id)
        )
    }

    /// `Ok(None)` means no usable CI setup: missing or unparseable settings,
    /// empty coordinates, or no workflow files. Only a materialization failure
    /// is an error.
    pub async fn resolve(
        &self,
        repo_id: &str,
        commit: &str,
        scratch_path: &Path,
    ) -> Result<Option<CiSettings>, ResolverError> {
        let scratch = ScratchDir::claim(scratch_path);
        let url = self.storage_url(repo_id);

        info!(repo = %repo_id, url = %url, to = %scratch.path().display(), "cloning project");
        self.source
            .materialize(&url, commit, scratch.path())
            .await
            .map_err(|source| ResolverError::Materialize {
                url: url.clone(),
                commit: commit.to_string(),
                source,
            })?;

        let settings = match read_settings(&scratch.path().join(SETTINGS_PATH)) {
            Some(settings) if settings.is_complete() => settings,
            Some(_) => {
                warn!("empty GitHub Actions setup found");
                return Ok(None);
            }
            None => return Ok(None),
        };

        let workflows = list_workflow_files(&scratch.path().join(WORKFLOWS_DIR));
        if workflows.is_empty() {
            warn!("no GitHub Actions workflows files found");
            return Ok(None);
        }
        debug!(?workflows, "found GitHub Actions workflow files");

        Ok(Some(settings))
    }
}

fn read_settings(path: &Path) -> Option<CiSettings> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            info!(file = %path.display(), error = %e, "no GitHub Actions settings file found");
            return None;
        }
    };
    match serde_yaml::from_str(&content) {
        Ok(settings) => Some(settings),
        Err(e) => {
            info!(file = %path.display(), error = %e, "could not decode GitHub Actions settings file");
            None
        }
    }
}

/// `.yaml`/`.yml` files directly inside `dir`, sorted. Subdirectories are
/// not descended into; a missing directory yields an empty list.
pub fn list_workflow_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "workflows directory not readable");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}
