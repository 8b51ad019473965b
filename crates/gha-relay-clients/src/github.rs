//! GitHub REST client for commit lookup and workflow runs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use gha_relay_core::error::ProviderError;
use gha_relay_core::ops::CiProvider;
use gha_relay_core::workflow::{
    WorkflowArtifact, WorkflowConclusion, WorkflowResult, WorkflowStatus,
};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Whole-request timeout for a GitHub API call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const PER_PAGE: usize = 30;
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("gha-relay/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct RunsPage {
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    workflow_runs: Vec<RunPayload>,
}

#[derive(Debug, Deserialize)]
struct RunPayload {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtifactsPage {
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    artifacts: Vec<ArtifactPayload>,
}

#[derive(Debug, Deserialize)]
struct ArtifactPayload {
    id: u64,
    #[serde(default)]
    name: String,
    /// API URL of the artifact.
    #[serde(default)]
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// [`CiProvider`] backed by the GitHub REST API.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    /// An empty token queries anonymously (public repositories only, with a
    /// low rate limit).
    pub fn new(api_url: &str, token: &str) -> Result<Self, ProviderError> {
        Self::with_timeout(api_url, token, REQUEST_TIMEOUT)
    }

    /// Like [`GitHubClient::new`] with a custom request timeout.
    pub fn with_timeout(
        api_url: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: Some(token.to_string()).filter(|t| !t.is_empty()),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let response = self.get(path, query).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(http_error(status, response).await);
        }
        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}{}", self.api_url, path);
        debug!(%url, "GitHub request");
        let mut request = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))
    }

    async fn list_artifacts(
        &self,
        owner: &str,
        repo: &str,
        run_id: u64,
    ) -> Result<Vec<ArtifactPayload>, (Vec<ArtifactPayload>, ProviderError)> {
        let path = format!("/repos/{owner}/{repo}/actions/runs/{run_id}/artifacts");
        let mut artifacts = Vec::new();
        let mut page = 1;
        loop {
            let body: ArtifactsPage = match self.get_json(&path, &page_query(page)).await {
                Ok(body) => body,
                Err(e) => return Err((artifacts, e)),
            };
            let fetched = body.artifacts.len();
            artifacts.extend(body.artifacts);
            if is_last_page(fetched, artifacts.len(), body.total_count) {
                return Ok(artifacts);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl CiProvider for GitHubClient {
    async fn check_commit_exists(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
    ) -> Result<(), ProviderError> {
        let response = self
            .get(&format!("/repos/{owner}/{repo}/commits/{commit}"), &[])
            .await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(ProviderError::CommitNotFound {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                    commit: commit.to_string(),
                })
            }
            status => Err(http_error(status, response).await),
        }
    }

    async fn list_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
    ) -> Result<Vec<WorkflowResult>, ProviderError> {
        let path = format!("/repos/{owner}/{repo}/actions/runs");
        let mut results = Vec::new();
        let mut page = 1;
        loop {
            let mut query = page_query(page);
            query.push(("head_sha", commit.to_string()));
            let body: RunsPage = self.get_json(&path, &query).await?;

            let fetched = body.workflow_runs.len();
            for run in body.workflow_runs {
                let artifacts = match self.list_artifacts(owner, repo, run.id).await {
                    Ok(artifacts) => artifacts,
                    Err((partial, e)) => {
                        warn!(run_id = run.id, error = %e, "could not fetch workflow artifacts");
                        partial
                    }
                };
                results.push(to_workflow_result(owner, repo, run, artifacts));
            }

            if is_last_page(fetched, results.len(), body.total_count) {
                return Ok(results);
            }
            page += 1;
        }
    }
}

fn page_query(page: usize) -> Vec<(&'static str, String)> {
    vec![("per_page", PER_PAGE.to_string()), ("page", page.to_string())]
}

fn is_last_page(fetched: usize, seen: usize, total: usize) -> bool {
    fetched < PER_PAGE || seen >= total
}

async fn http_error(status: StatusCode, response: reqwest::Response) -> ProviderError {
    let body: ErrorBody = response.json().await.unwrap_or_default();
    ProviderError::Http {
        status: status.as_u16(),
        message: body.message,
    }
}

fn map_status(status: Option<&str>) -> WorkflowStatus {
    match status {
        Some("completed") => WorkflowStatus::Completed,
        Some("in_progress") => WorkflowStatus::InProgress,
        _ => WorkflowStatus::Queued,
    }
}

fn to_workflow_result(
    owner: &str,
    repo: &str,
    run: RunPayload,
    artifacts: Vec<ArtifactPayload>,
) -> WorkflowResult {
    let mut result = WorkflowResult::new(
        run.id.to_string(),
        run.name.unwrap_or_default(),
        map_status(run.status.as_deref()),
    );
    if let Some(conclusion) = run.conclusion.filter(|c| !c.is_empty()) {
        result = result.with_conclusion(WorkflowConclusion::from_label(&conclusion));
    }
    for artifact in artifacts {
        result = result.with_artifact(WorkflowArtifact {
            id: artifact.id.to_string(),
            name: artifact.name,
            url: format!(
                "https://github.com/{owner}/{repo}/actions/runs/{}/artifacts/{}",
                run.id, artifact.id
            ),
            api_url: artifact.url,
        });
    }
    result
}
