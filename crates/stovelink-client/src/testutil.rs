//! Scripted loopback stand-in for the stove, used by the async tests.
//!
//! Speaks the real wire protocol over TCP: reads base64/CR request frames,
//! answers from a configurable table, and can be told to stay silent,
//! delay, push unsolicited frames, or drop the connection. Accepts
//! sequential connections so reconnect behavior can be exercised.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};

use stovelink_protocol::{FrameSplitter, decode_frame};

#[derive(Debug)]
enum Control {
    Answer(String, String),
    Ignore(String),
    Silent(bool),
    Delay(Duration),
    Push(String),
    CloseConnection,
}

#[derive(Default)]
struct Script {
    answers: HashMap<String, String>,
    ignored: HashSet<String>,
    silent: bool,
    delay: Duration,
}

/// Handle to the fake device task.
pub(crate) struct FakeStove {
    port: u16,
    control: mpsc::Sender<Control>,
    requests: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
}

impl FakeStove {
    /// Binds a loopback listener and starts serving connections.
    pub(crate) async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (control_tx, control_rx) = mpsc::channel(64);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        tokio::spawn(serve(
            listener,
            control_rx,
            requests.clone(),
            connections.clone(),
        ));

        Self {
            port,
            control: control_tx,
            requests,
            connections,
        }
    }

    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    /// Sets the canned answer for a command.
    pub(crate) async fn answer(&self, command: &str, value: &str) {
        self.control
            .send(Control::Answer(command.to_string(), value.to_string()))
            .await
            .unwrap();
    }

    /// Makes the device never answer the given command.
    pub(crate) async fn ignore(&self, command: &str) {
        self.control
            .send(Control::Ignore(command.to_string()))
            .await
            .unwrap();
    }

    /// While silent, no request is answered.
    pub(crate) async fn silent(&self, silent: bool) {
        self.control.send(Control::Silent(silent)).await.unwrap();
    }

    /// Delays every answer by the given duration.
    pub(crate) async fn delay_answers(&self, delay: Duration) {
        self.control.send(Control::Delay(delay)).await.unwrap();
    }

    /// Pushes an unsolicited, well-formed answer frame.
    pub(crate) async fn push_answer(&self, command: &str, value: &str) {
        let mut frame = STANDARD.encode(format!("{}={}", command, value));
        frame.push('\r');
        self.control.send(Control::Push(frame)).await.unwrap();
    }

    /// Pushes raw bytes, malformed or otherwise.
    pub(crate) async fn push_raw(&self, raw: &str) {
        self.control
            .send(Control::Push(raw.to_string()))
            .await
            .unwrap();
    }

    /// Drops the current connection; the listener keeps accepting.
    pub(crate) async fn close_connection(&self) {
        self.control.send(Control::CloseConnection).await.unwrap();
    }

    /// Names of all requests received so far, in arrival order.
    pub(crate) async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }

    /// How many times the given command has been requested.
    pub(crate) async fn request_count(&self, command: &str) -> usize {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|name| name.as_str() == command)
            .count()
    }

    /// Number of connections accepted so far.
    pub(crate) fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn serve(
    listener: TcpListener,
    mut control: mpsc::Receiver<Control>,
    requests: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
) {
    let mut script = Script::default();

    loop {
        let (stream, _) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(_) => return,
        };
        connections.fetch_add(1, Ordering::SeqCst);

        let (mut read_half, mut write_half) = stream.into_split();
        let mut splitter = FrameSplitter::new();
        let mut chunk = [0u8; 1024];

        'connection: loop {
            // Biased so queued script changes apply before the next read.
            tokio::select! {
                biased;
                cmd = control.recv() => {
                    match cmd {
                        Some(Control::Answer(command, value)) => {
                            script.ignored.remove(&command);
                            script.answers.insert(command, value);
                        }
                        Some(Control::Ignore(command)) => {
                            script.ignored.insert(command);
                        }
                        Some(Control::Silent(silent)) => script.silent = silent,
                        Some(Control::Delay(delay)) => script.delay = delay,
                        Some(Control::Push(frame)) => {
                            if write_half.write_all(frame.as_bytes()).await.is_err() {
                                break 'connection;
                            }
                        }
                        Some(Control::CloseConnection) => break 'connection,
                        None => return,
                    }
                }
                read = read_half.read(&mut chunk) => {
                    let n = match read {
                        Ok(0) | Err(_) => break 'connection,
                        Ok(n) => n,
                    };
                    splitter.push(&chunk[..n]);
                    while let Some(frame) = splitter.next_frame() {
                        let Ok((key, command)) = decode_frame(&frame) else {
                            continue;
                        };
                        if key != "_req" {
                            continue;
                        }
                        requests.lock().await.push(command.clone());

                        if script.silent || script.ignored.contains(&command) {
                            continue;
                        }
                        if !script.delay.is_zero() {
                            tokio::time::sleep(script.delay).await;
                        }
                        let value = script
                            .answers
                            .get(&command)
                            .cloned()
                            .unwrap_or_else(|| "0".to_string());
                        let mut answer = STANDARD.encode(format!("{}={}", command, value));
                        answer.push('\r');
                        if write_half.write_all(answer.as_bytes()).await.is_err() {
                            break 'connection;
                        }
                    }
                }
            }
        }
    }
}
