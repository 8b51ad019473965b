//! Radicle httpd client for patch revision comments.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use gha_relay_core::error::CommentError;
use gha_relay_core::ops::CommentClient;

pub const DEFAULT_HTTPD_URL: &str = "http://127.0.0.1:8080";

/// Whole-request timeout for a comment call.
pub const COMMENT_TIMEOUT: Duration = Duration::from_secs(20);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_COMMENT: &str = "revision.comment";
const EDIT_COMMENT: &str = "revision.comment.edit";

/// Patch action body sent to httpd.
#[derive(Debug, Serialize)]
struct CommentAction<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
    body: &'a str,
    revision: &'a str,
    embeds: Vec<String>,
}

impl<'a> CommentAction<'a> {
    fn new(body: &'a str, revision: &'a str, existing_comment_id: Option<&'a str>) -> Self {
        Self {
            kind: if existing_comment_id.is_some() {
                EDIT_COMMENT
            } else {
                CREATE_COMMENT
            },
            comment: existing_comment_id,
            body,
            revision,
            embeds: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ActionResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

/// [`CommentClient`] backed by the Radicle httpd patch API.
#[derive(Clone)]
pub struct RadicleHttpd {
    http: reqwest::Client,
    base_url: String,
    session_token: String,
}

impl RadicleHttpd {
    pub fn new(base_url: &str, session_token: &str) -> Result<Self, CommentError> {
        Self::with_timeout(base_url, session_token, COMMENT_TIMEOUT)
    }

    /// Like [`RadicleHttpd::new`] with a custom request timeout.
    pub fn with_timeout(
        base_url: &str,
        session_token: &str,
        timeout: Duration,
    ) -> Result<Self, CommentError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| CommentError::Request(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_token: session_token.to_string(),
        })
    }

    fn patch_url(&self, repo_id: &str, patch_id: &str) -> String {
        format!("{}/api/v1/projects/{repo_id}/patches/{patch_id}", self.base_url)
    }
}

#[async_trait]
impl CommentClient for RadicleHttpd {
    async fn post_or_edit_comment(
        &self,
        repo_id: &str,
        patch_id: &str,
        revision_id: &str,
        body: &str,
        existing_comment_id: Option<&str>,
    ) -> Result<String, CommentError> {
        let action = CommentAction::new(body, revision_id, existing_comment_id);
        let url = self.patch_url(repo_id, patch_id);
        debug!(%url, kind = action.kind, "patch comment request");

        let response = self
            .http
            .patch(&url)
            .bearer_auth(&self.session_token)
            .json(&action)
            .send()
            .await
            .map_err(|e| CommentError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text);
            error!(status = status.as_u16(), %message, "request responded with error code");
            return Err(CommentError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let reply: ActionResponse = response.json().await.unwrap_or_default();
        debug!(success = reply.success, id = %reply.id, "patch comment response");
        match existing_comment_id {
            Some(id) if reply.id.is_empty() => Ok(id.to_string()),
            _ => Ok(reply.id),
        }
    }
}

fn error_message(text: &str) -> String {
    serde_json::from_str::<ErrorBody>(text)
        .map(|body| body.error)
        .or_else(|_| serde_json::from_str::<String>(text))
        .unwrap_or_else(|_| text.trim().to_string())
}
