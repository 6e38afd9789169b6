//! Frame encoding and decoding.
//!
//! Both directions carry one base64 text per frame, terminated by a single
//! carriage return that is not part of the base64 payload:
//!
//! ```text
//! outbound:  base64("_req=" + command) CR
//! inbound:   base64(command + "=" + value) CR
//! ```
//!
//! Value interpretation (integer, enum, series, ...) is the caller's job,
//! driven by the command registry; the codec only splits name from value.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::{ProtocolError, ProtocolResult};

/// Byte terminating every frame in both directions.
pub const FRAME_TERMINATOR: u8 = b'\r';

/// Key under which the device expects value requests.
pub const REQUEST_KEY: &str = "_req";

/// Encodes a request for the named command into a complete wire frame,
/// trailing terminator included.
pub fn encode_request(command: &str) -> String {
    let mut frame = STANDARD.encode(format!("{}={}", REQUEST_KEY, command));
    frame.push(FRAME_TERMINATOR as char);
    frame
}

/// Decodes one inbound frame into `(command, raw_value)`.
///
/// Accepts the frame with or without its trailing terminator, so both a
/// raw wire frame and the output of [`crate::FrameSplitter`] decode.
pub fn decode_frame(frame: &str) -> ProtocolResult<(String, String)> {
    let text = frame
        .strip_suffix(FRAME_TERMINATOR as char)
        .unwrap_or(frame)
        .trim();

    let bytes = STANDARD.decode(text)?;
    if let Some(&byte) = bytes.iter().find(|b| b.is_ascii_control()) {
        return Err(ProtocolError::ControlCharacter { byte });
    }
    let payload = String::from_utf8(bytes)?;

    match payload.split_once('=') {
        Some((name, value)) => Ok((name.trim().to_string(), value.trim().to_string())),
        None => Err(ProtocolError::MissingSeparator { payload }),
    }
}
