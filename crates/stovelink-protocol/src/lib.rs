//! Wire codec for the stove protocol.
//!
//! The device exposes named values over a persistent plaintext stream
//! socket. Every message in either direction is one frame:
//!
//! ```text
//! +--------------------------------------+----+
//! | base64 of ASCII "key=value"          | CR |
//! +--------------------------------------+----+
//! ```
//!
//! Requests use the reserved key `_req` with the command name as value;
//! answers echo the command name as key. There are no sequence numbers and
//! no heartbeat: the command name is the only correlation key available,
//! which is an inherent limitation of the device protocol.
//!
//! # Example
//!
//! ```rust
//! use stovelink_protocol::{decode_frame, encode_request};
//!
//! let frame = encode_request("appPhase");
//! assert_eq!(frame, "X3JlcT1hcHBQaGFzZQ==\r");
//!
//! let (name, value) = decode_frame("YXBwUGhhc2U9NA==\r").unwrap();
//! assert_eq!((name.as_str(), value.as_str()), ("appPhase", "4"));
//! ```

mod codec;
mod error;
mod framing;

pub use codec::{FRAME_TERMINATOR, REQUEST_KEY, decode_frame, encode_request};
pub use error::{ProtocolError, ProtocolResult};
pub use framing::FrameSplitter;
