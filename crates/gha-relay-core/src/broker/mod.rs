//! Broker protocol: request decoding and response channel.
//!
//! The broker writes one JSON request to our input and reads exactly two
//! JSON responses back: `triggered`, then a terminal `finished`.

pub mod decode;
pub mod request;
pub mod response;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{BrokerError, ProtocolError};

pub use decode::{decode, SUPPORTED_PROTOCOL_VERSIONS, TRIGGER_REQUEST};
pub use request::{
    Identity, PatchConflict, PatchDetails, PatchEvent, PatchState, PushEvent, Repository,
    RequestEvent, Revision,
};
pub use response::{
    ErrorMessage, ErrorResponse, OverallResult, ResponseKind, ResponseMessage, RunId,
    WorkflowDetails,
};

/// Request/response channel to the broker.
#[async_trait]
pub trait Broker: Send {
    /// Read and decode the request message.
    async fn read_request(&mut self) -> Result<RequestEvent, ProtocolError>;

    /// Write a regular response.
    async fn serve_response(&mut self, response: &ResponseMessage) -> Result<(), BrokerError>;

    /// Write the terminal failure response.
    async fn serve_error_response(&mut self, response: &ErrorResponse) -> Result<(), BrokerError>;
}

/// [`Broker`] over a byte stream pair, typically stdin/stdout.
pub struct StreamBroker<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> StreamBroker<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Give back the writer, e.g. to inspect what was written.
    pub fn into_writer(self) -> W {
        self.writer
    }

    async fn write_json<T: serde::Serialize + Sync>(&mut self, message: &T) -> Result<(), BrokerError> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<R, W> Broker for StreamBroker<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read_request(&mut self) -> Result<RequestEvent, ProtocolError> {
        let mut input = Vec::new();
        self.reader
            .read_to_end(&mut input)
            .await
            .map_err(ProtocolError::Read)?;
        input.retain(|b| *b != b'\n' && *b != b'\r');
        debug!(message = %String::from_utf8_lossy(&input), "received message from broker");
        decode(&input)
    }

    async fn serve_response(&mut self, response: &ResponseMessage) -> Result<(), BrokerError> {
        debug!(response = ?response.response, "sending message to broker");
        self.write_json(response).await
    }

    async fn serve_error_response(&mut self, response: &ErrorResponse) -> Result<(), BrokerError> {
        debug!(error = %response.result.error, "sending error message to broker");
        self.write_json(response).await
    }
}
