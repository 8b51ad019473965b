//! Error taxonomy for the relay.
//!
//! Every fatal kind converts into [`RelayError`], which is what the top-level
//! failure response reports. [`CommentError`] never reaches it: comment
//! failures are logged and absorbed where they happen.

use std::time::Duration;

/// Malformed or unsupported broker input.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("could not read request message: {0}")]
    Read(#[source] std::io::Error),

    #[error("could not unmarshal request: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("not supported message request: {0}")]
    UnsupportedRequest(String),

    #[error("not supported message protocol version: {0}")]
    UnsupportedVersion(u32),

    #[error("not supported event type: {0}")]
    UnsupportedEventType(String),

    #[error("could not unmarshal request message to {event_type} event message: {source}")]
    InvalidPayload {
        event_type: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure to materialize repository content.
#[derive(Debug, thiserror::Error)]
pub enum SourceControlError {
    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("commit {0} not found in repository")]
    CommitNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal CI-setup resolution failure. "No CI configured" is not an error.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("failed to materialize {url} at {commit}: {source}")]
    Materialize {
        url: String,
        commit: String,
        #[source]
        source: SourceControlError,
    },
}

/// CI provider query failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("commit {commit} not found in {owner}/{repo}")]
    CommitNotFound {
        owner: String,
        repo: String,
        commit: String,
    },

    #[error("provider responded with HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("provider request failed: {0}")]
    Request(String),

    #[error("could not decode provider response: {0}")]
    Decode(String),

    #[error("provider query timed out after {0:?}")]
    Timeout(Duration),
}

/// Comment client failure. Always non-fatal.
#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("no revision found in patch {patch_id}")]
    MissingRevision { patch_id: String },

    #[error("HTTP{status} {message}")]
    Http { status: u16, message: String },

    #[error("comment request failed: {0}")]
    Request(String),

    #[error("comment request timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure to write to the broker channel.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("could not encode response: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("could not write response: {0}")]
    Write(#[from] std::io::Error),
}

/// Fatal pipeline error: aborts the event and triggers the failure response.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("event pipeline panicked: {0}")]
    Panic(String),
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
