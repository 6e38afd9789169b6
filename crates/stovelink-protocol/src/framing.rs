//! Incremental frame splitting for a byte stream.
//!
//! The device speaks over a plain stream socket, so frame boundaries have
//! to be recovered from the carriage-return terminator. [`FrameSplitter`]
//! accepts bytes in whatever chunks the transport delivers them and yields
//! complete frames in order; a partial frame stays buffered until its
//! terminator arrives.

use crate::codec::FRAME_TERMINATOR;

/// Reassembles carriage-return-terminated frames from arbitrary chunks.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buffer: Vec<u8>,
}

impl FrameSplitter {
    /// Creates an empty splitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of received bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pops the next complete frame, without its terminator.
    ///
    /// Returns `None` while no terminator is buffered. Frames are decoded
    /// as lossy UTF-8; the codec rejects anything that was damaged.
    pub fn next_frame(&mut self) -> Option<String> {
        let end = self
            .buffer
            .iter()
            .position(|&byte| byte == FRAME_TERMINATOR)?;
        let frame: Vec<u8> = self.buffer.drain(..=end).take(end).collect();
        Some(String::from_utf8_lossy(&frame).into_owned())
    }

    /// Number of buffered bytes belonging to an incomplete frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_complete_frame() {
        let mut splitter = FrameSplitter::new();
        splitter.push(b"YXBwUGhhc2U9NA==\r");

        assert_eq!(splitter.next_frame().as_deref(), Some("YXBwUGhhc2U9NA=="));
        assert_eq!(splitter.next_frame(), None);
        assert_eq!(splitter.pending(), 0);
    }

    #[test]
    fn frame_split_across_chunks() {
        let mut splitter = FrameSplitter::new();
        splitter.push(b"YXBwUGhh");
        assert_eq!(splitter.next_frame(), None);
        assert_eq!(splitter.pending(), 8);

        splitter.push(b"c2U9NA==\r");
        assert_eq!(splitter.next_frame().as_deref(), Some("YXBwUGhhc2U9NA=="));
    }

    #[test]
    fn multiple_frames_in_one_chunk() {
        let mut splitter = FrameSplitter::new();
        splitter.push(b"Zmlyc3Q=\rc2Vjb25k\r");

        assert_eq!(splitter.next_frame().as_deref(), Some("Zmlyc3Q="));
        assert_eq!(splitter.next_frame().as_deref(), Some("c2Vjb25k"));
        assert_eq!(splitter.next_frame(), None);
    }

    #[test]
    fn terminator_less_chunk_stays_buffered() {
        let mut splitter = FrameSplitter::new();
        splitter.push(b"garbage with no terminator");

        assert_eq!(splitter.next_frame(), None);
        assert_eq!(splitter.pending(), 26);

        // A later well-formed frame still comes out whole.
        splitter.push(b"\rYXBwVD0yMQ==\r");
        assert_eq!(
            splitter.next_frame().as_deref(),
            Some("garbage with no terminator")
        );
        assert_eq!(splitter.next_frame().as_deref(), Some("YXBwVD0yMQ=="));
    }

    #[test]
    fn empty_frame_between_terminators() {
        let mut splitter = FrameSplitter::new();
        splitter.push(b"\r\r");

        assert_eq!(splitter.next_frame().as_deref(), Some(""));
        assert_eq!(splitter.next_frame().as_deref(), Some(""));
        assert_eq!(splitter.next_frame(), None);
    }
}
