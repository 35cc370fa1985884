use crate::rpc::ConnectionState;
use serde_json::Value;
use thiserror::Error;

/// The connection could not carry a request.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum TransportError {
    /// A send was attempted while the connection was not `Open`.
    #[error("connection is not open (state: {0})")]
    NotOpen(ConnectionState),
    /// The handshake failed; the connection went straight to `Closed`.
    #[error("failed to connect: {0}")]
    ConnectFailed(String),
    /// The connection closed while the caller was waiting for it.
    #[error("connection closed")]
    Closed,
    #[error("failed to encode request: {0}")]
    Encode(String),
}

/// A correlator invariant was violated. Non-recoverable for that correlator.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum CorrelationError {
    #[error("request id {0} is still outstanding and cannot be reused")]
    DuplicateId(u32),
    #[error("correlator halted after a correlation fault")]
    Halted,
}

/// A response arrived for an id with no outstanding waiter.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("discarded response for unknown or completed request id {id}")]
pub struct StaleResponseError {
    pub id: u32,
}

/// Everything a typed operation can fail with.
#[derive(Debug, Error)]
pub enum RpcClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Correlation(#[from] CorrelationError),
    /// The server answered with a non-success status; `body` is its error payload.
    #[error("request failed with status {status}: {body}")]
    Application { status: u16, body: Value },
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// A frame named this request's id but was not a valid response envelope.
    #[error("malformed response for request {id}: {reason}")]
    MalformedResponse { id: u32, reason: String },
    /// The waiter was dropped before a response arrived, e.g. because the
    /// correlator or its connection was discarded.
    #[error("request aborted before a response arrived")]
    Aborted,
}

impl RpcClientError {
    /// The server-provided error body, if this is an application failure.
    pub fn application_body(&self) -> Option<&Value> {
        match self {
            RpcClientError::Application { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RpcClientError::Application { status, .. } => Some(*status),
            _ => None,
        }
    }
}
