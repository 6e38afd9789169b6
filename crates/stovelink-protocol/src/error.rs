//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while decoding an inbound frame.
///
/// A malformed frame is never fatal to a session: the caller logs it,
/// discards the frame, and keeps reading.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame text is not valid base64.
    #[error("frame is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// Decoded payload contained no `=` separator.
    #[error("decoded frame has no '=' separator: {payload:?}")]
    MissingSeparator { payload: String },

    /// Decoded payload contained a control character other than the
    /// frame terminator.
    #[error("decoded frame contains control byte 0x{byte:02x}")]
    ControlCharacter { byte: u8 },

    /// Decoded payload is not valid UTF-8 text.
    #[error("decoded frame is not valid text")]
    NotText(#[from] std::string::FromUtf8Error),
}
