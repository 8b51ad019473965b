//! GHA Relay Core Library
//!
//! Relays GitHub Actions workflow status for Radicle pushes and patches to a
//! Radicle CI broker speaking line-delimited JSON.

pub mod aggregate;
pub mod broker;
pub mod comment;
pub mod config;
pub mod error;
pub mod fakes;
pub mod obs;
pub mod ops;
pub mod poll;
pub mod server;
pub mod settings;
pub mod telemetry;
pub mod workflow;

pub use aggregate::{aggregate, AggregateOutcome};

pub use broker::{
    Broker, ErrorResponse, OverallResult, PatchEvent, PushEvent, RequestEvent, ResponseKind,
    ResponseMessage, StreamBroker, WorkflowDetails,
};

pub use comment::{CommentContext, CommentPoster, CommentState};

pub use config::{expand_home, PollConfig, RelayConfig};

pub use error::{
    BrokerError, CommentError, ProtocolError, ProviderError, RelayError, ResolverError, Result,
    SourceControlError,
};

pub use ops::{CiProvider, CommentClient, SourceControl};

pub use poll::{Clock, IgnoreSnapshots, SnapshotObserver, TokioClock, WorkflowPoller};

pub use server::{EventContext, RelayServer};

pub use settings::SettingsResolver;

pub use workflow::{
    CiSettings, WorkflowArtifact, WorkflowConclusion, WorkflowResult, WorkflowStatus,
};

/// Version reported by `--version` and in the startup log line.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
