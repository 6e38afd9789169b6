//! Client error types.
//!
//! Nothing here is fatal to the process: connection and write failures
//! trigger reconnects, malformed frames are discarded, timeouts are
//! skipped per command. The only consumer-visible effect of any of these
//! is snapshot staleness plus the surfaced connection state.

use std::io;
use std::time::Duration;

use thiserror::Error;

use stovelink_core::ValueError;
use stovelink_protocol::ProtocolError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Opening the transport session failed (refused or timed out).
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Writing a frame failed mid-session.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// An inbound frame could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A raw value did not match its command's parsing rule.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// No answer for a command within the allowed time.
    #[error("no answer for '{command}' within {timeout:?}")]
    ResponseTimeout { command: String, timeout: Duration },

    /// A request for the same command is already outstanding.
    #[error("request for '{command}' already outstanding")]
    DuplicateRequest { command: String },

    /// The inbound frame sequence ended while a request was waiting.
    #[error("connection closed")]
    ConnectionClosed,

    /// A non-request operation ran out of time.
    #[error("timeout during {operation}")]
    Timeout { operation: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Serializing output failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error outside the send path.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a response timeout naming the command.
    pub fn response_timeout(command: impl Into<String>, timeout: Duration) -> Self {
        Self::ResponseTimeout {
            command: command.into(),
            timeout,
        }
    }

    /// Creates a duplicate request error naming the command.
    pub fn duplicate_request(command: impl Into<String>) -> Self {
        Self::DuplicateRequest {
            command: command.into(),
        }
    }
}
