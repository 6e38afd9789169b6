//! Request/response correlation.
//!
//! The protocol has no sequence numbers: the command name echoed in every
//! answer is the only correlation key. The correlator keeps at most one
//! outstanding request per command name, routes each decoded answer to its
//! waiter, and forwards answers nobody asked for as unsolicited updates.
//! The device is known to push values proactively and to answer out of
//! order, and neither may be treated as a fault.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use stovelink_protocol::{decode_frame, encode_request};

use crate::error::{ClientError, ClientResult};
use crate::session::{Session, SessionFrames, SessionWriter};

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<String>>>>;

/// An answer the device sent without a matching outstanding request.
pub type UnsolicitedAnswer = (String, String);

/// Matches outgoing command requests to inbound answers by name.
pub struct Correlator {
    writer: Mutex<SessionWriter>,
    pending: PendingMap,
    dispatch_task: JoinHandle<()>,
}

impl Correlator {
    /// Takes ownership of a session and starts dispatching its inbound
    /// frames. Unmatched answers are forwarded on `unsolicited_tx`; that
    /// channel closing with the dispatcher signals the end of the inbound
    /// sequence.
    pub fn spawn(session: Session, unsolicited_tx: mpsc::Sender<UnsolicitedAnswer>) -> Self {
        let (writer, frames) = session.into_parts();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let dispatch_task = tokio::spawn(dispatch(frames, pending.clone(), unsolicited_tx));

        Self {
            writer: Mutex::new(writer),
            pending,
            dispatch_task,
        }
    }

    /// Sends `_req=<command>` and waits for the matching answer.
    ///
    /// Fails fast with [`ClientError::DuplicateRequest`] if a request for
    /// the same command is already outstanding; the earlier request keeps
    /// its claim on the answer.
    pub async fn request(&self, command: &str, timeout: Duration) -> ClientResult<String> {
        if self.dispatch_task.is_finished() {
            return Err(ClientError::ConnectionClosed);
        }

        let answer_rx = {
            let mut pending = self.pending.lock().await;
            if pending.contains_key(command) {
                return Err(ClientError::duplicate_request(command));
            }
            let (tx, rx) = oneshot::channel();
            pending.insert(command.to_string(), tx);
            rx
        };

        let frame = encode_request(command);
        if let Err(err) = self.writer.lock().await.send(&frame).await {
            self.pending.lock().await.remove(command);
            return Err(err);
        }

        match tokio::time::timeout(timeout, answer_rx).await {
            Ok(Ok(value)) => Ok(value),
            // Sender dropped: the dispatcher exited with the stream.
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().await.remove(command);
                Err(ClientError::response_timeout(command, timeout))
            }
        }
    }

    /// True once the inbound sequence has ended.
    pub fn is_closed(&self) -> bool {
        self.dispatch_task.is_finished()
    }

    /// Stops dispatching and closes the write half.
    pub async fn shutdown(&self) {
        self.dispatch_task.abort();
        self.pending.lock().await.clear();
        self.writer.lock().await.close().await;
    }
}

/// Dispatch loop: decode inbound frames and route them.
async fn dispatch(
    mut frames: SessionFrames,
    pending: PendingMap,
    unsolicited_tx: mpsc::Sender<UnsolicitedAnswer>,
) {
    while let Some(frame) = frames.next().await {
        match decode_frame(&frame) {
            Ok((name, value)) => {
                let waiter = pending.lock().await.remove(&name);
                match waiter {
                    // The waiter may have timed out in the meantime.
                    Some(tx) => {
                        let _ = tx.send(value);
                    }
                    None => {
                        debug!(command = %name, "unsolicited answer");
                        if unsolicited_tx.send((name, value)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, frame = %frame, "discarding malformed frame");
            }
        }
    }

    // Stream ended: wake outstanding requests by dropping their senders.
    pending.lock().await.clear();
    debug!("inbound sequence ended");
}
