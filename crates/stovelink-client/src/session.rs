//! Transport session: one persistent stream to the device.
//!
//! The session owns the TCP connection and splits it into a write half and
//! an inbound frame sequence. A background reader task reassembles
//! carriage-return-terminated frames from whatever chunks the socket
//! delivers; the sequence ends when the stream closes or errors, which is
//! the disconnection signal the facade acts on. A partial frame without
//! its terminator is buffered across reads and never delivered early.

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use stovelink_protocol::FrameSplitter;

use crate::config::StoveConfig;
use crate::error::{ClientError, ClientResult};

const READ_CHUNK: usize = 1024;
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// A live session to the device.
pub struct Session {
    writer: SessionWriter,
    frames: SessionFrames,
}

impl Session {
    /// Opens a session to the configured device address.
    pub async fn open(config: &StoveConfig) -> ClientResult<Self> {
        let addr = config.addr();
        debug!(addr = %addr, "opening session");

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                ClientError::connection(format!(
                    "connect to {} timed out after {:?}",
                    addr, config.connect_timeout
                ))
            })?
            .map_err(|err| ClientError::connection(format!("connect to {} failed: {}", addr, err)))?;

        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let reader_task = tokio::spawn(read_frames(read_half, frame_tx));

        Ok(Self {
            writer: SessionWriter { half: write_half },
            frames: SessionFrames {
                rx: frame_rx,
                reader_task,
            },
        })
    }

    /// Sends one complete wire frame.
    pub async fn send(&mut self, frame: &str) -> ClientResult<()> {
        self.writer.send(frame).await
    }

    /// Receives the next inbound frame; `None` means the stream ended.
    pub async fn next_frame(&mut self) -> Option<String> {
        self.frames.next().await
    }

    /// Splits the session so the writer and the inbound sequence can be
    /// owned by different components.
    pub fn into_parts(self) -> (SessionWriter, SessionFrames) {
        (self.writer, self.frames)
    }

    /// Closes the session. Safe to call more than once.
    pub async fn close(&mut self) {
        self.writer.close().await;
        self.frames.reader_task.abort();
    }
}

/// Write half of a session.
pub struct SessionWriter {
    half: OwnedWriteHalf,
}

impl SessionWriter {
    /// Writes one frame to the stream.
    pub async fn send(&mut self, frame: &str) -> ClientResult<()> {
        self.half
            .write_all(frame.as_bytes())
            .await
            .map_err(ClientError::Write)?;
        self.half.flush().await.map_err(ClientError::Write)
    }

    /// Shuts down the write direction. Safe to call more than once.
    pub async fn close(&mut self) {
        let _ = self.half.shutdown().await;
    }
}

/// Inbound frame sequence of a session.
pub struct SessionFrames {
    rx: mpsc::Receiver<String>,
    reader_task: JoinHandle<()>,
}

impl SessionFrames {
    /// Next complete frame, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Drop for SessionFrames {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

/// Reader loop: socket chunks in, complete frames out.
async fn read_frames(mut half: OwnedReadHalf, tx: mpsc::Sender<String>) {
    let mut splitter = FrameSplitter::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        match half.read(&mut chunk).await {
            Ok(0) => {
                debug!("stream closed by peer");
                break;
            }
            Ok(n) => {
                splitter.push(&chunk[..n]);
                while let Some(frame) = splitter.next_frame() {
                    if tx.send(frame).await.is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                debug!(error = %err, "stream read failed");
                break;
            }
        }
    }

    if splitter.pending() > 0 {
        debug!(
            bytes = splitter.pending(),
            "discarding incomplete frame at end of stream"
        );
    }
}
