//! Client facade: connection lifecycle, snapshot ownership, subscriptions.
//!
//! The facade owns the session, correlator, and scheduler, and runs the
//! connection state machine: connect with capped exponential
//! backoff, fetch the identity tier, poll until the link degrades past
//! recovery or the inbound sequence ends, tear down, repeat. Consumers
//! never issue commands themselves; they read the snapshot or subscribe
//! to per-command updates.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use stovelink_core::{Command, ConnectionState, StoveSnapshot, StoveUpdate};

use crate::config::StoveConfig;
use crate::correlator::{Correlator, UnsolicitedAnswer};
use crate::error::{ClientError, ClientResult};
use crate::scheduler::{PollScheduler, TierEvent};
use crate::session::Session;

const UPDATE_CHANNEL_CAPACITY: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 16;
const BROADCAST_CAPACITY: usize = 256;

/// The single object consumers interact with.
///
/// Dropping the client aborts the connection task; prefer [`close`] for an
/// orderly shutdown that also closes the socket.
///
/// [`close`]: StoveClient::close
pub struct StoveClient {
    config: StoveConfig,
    state_rx: watch::Receiver<ConnectionState>,
    snapshot_rx: watch::Receiver<StoveSnapshot>,
    updates_tx: broadcast::Sender<StoveUpdate>,
    shutdown_tx: watch::Sender<bool>,
    runner: Option<JoinHandle<()>>,
}

impl StoveClient {
    /// Starts the client; connection management begins immediately.
    pub fn new(config: StoveConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (snapshot_tx, snapshot_rx) = watch::channel(StoveSnapshot::new());
        let (updates_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let runner = tokio::spawn(run_client(
            config.clone(),
            state_tx,
            snapshot_tx,
            updates_tx.clone(),
            shutdown_rx,
        ));

        Self {
            config,
            state_rx,
            snapshot_rx,
            updates_tx,
            shutdown_tx,
            runner: Some(runner),
        }
    }

    /// Last-known snapshot. Non-blocking; returns a clone.
    pub fn snapshot(&self) -> StoveSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Current connection state. Non-blocking.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watches connection state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Subscribes to per-command updates as they land.
    pub fn subscribe(&self) -> broadcast::Receiver<StoveUpdate> {
        self.updates_tx.subscribe()
    }

    /// Waits until the snapshot holds a value for every listed command.
    pub async fn wait_until_populated<'a>(
        &self,
        commands: impl IntoIterator<Item = &'a str>,
        timeout: Duration,
    ) -> ClientResult<StoveSnapshot> {
        let names: Vec<&str> = commands.into_iter().collect();
        let mut snapshot_rx = self.snapshot_rx.clone();

        tokio::time::timeout(timeout, async move {
            loop {
                {
                    let snapshot = snapshot_rx.borrow_and_update();
                    if snapshot.contains_all(names.iter().copied()) {
                        return Ok(snapshot.clone());
                    }
                }
                if snapshot_rx.changed().await.is_err() {
                    return Err(ClientError::ConnectionClosed);
                }
            }
        })
        .await
        .map_err(|_| ClientError::Timeout {
            operation: "waiting for snapshot to populate".to_string(),
        })?
    }

    /// Shuts the client down, cancelling all pending waits and closing the
    /// session within one request-timeout interval.
    pub async fn close(mut self) {
        debug!("closing stove client");
        let _ = self.shutdown_tx.send(true);
        let grace = self.config.request_timeout;
        if let Some(mut runner) = self.runner.take()
            && tokio::time::timeout(grace, &mut runner).await.is_err()
        {
            warn!("connection task did not stop in time, aborting");
            runner.abort();
        }
    }
}

impl Drop for StoveClient {
    fn drop(&mut self) {
        if let Some(runner) = &self.runner {
            runner.abort();
        }
    }
}

/// Outer connection loop: backoff, connect, run, tear down, repeat.
async fn run_client(
    config: StoveConfig,
    state_tx: watch::Sender<ConnectionState>,
    snapshot_tx: watch::Sender<StoveSnapshot>,
    updates_tx: broadcast::Sender<StoveUpdate>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    while !*shutdown_rx.borrow() {
        let _ = state_tx.send(ConnectionState::Connecting);

        match Session::open(&config).await {
            Ok(session) => {
                info!(addr = %config.addr(), "session established");
                attempt = 0;
                run_session(
                    &config,
                    session,
                    &state_tx,
                    &snapshot_tx,
                    &updates_tx,
                    &mut shutdown_rx,
                )
                .await;
                let _ = state_tx.send(ConnectionState::Disconnected);
                // Reconnect promptly after a dropped session.
                attempt += 1;
            }
            Err(err) => {
                warn!(addr = %config.addr(), error = %err, "connection attempt failed");
                let _ = state_tx.send(ConnectionState::Disconnected);
                attempt += 1;
            }
        }

        if *shutdown_rx.borrow() {
            break;
        }
        let delay = config.backoff_delay(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "waiting before reconnect");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.changed() => {}
        }
    }

    let _ = state_tx.send(ConnectionState::Disconnected);
    debug!("connection task stopped");
}

/// Runs one established session until it ends.
async fn run_session(
    config: &StoveConfig,
    session: Session,
    state_tx: &watch::Sender<ConnectionState>,
    snapshot_tx: &watch::Sender<StoveSnapshot>,
    updates_tx: &broadcast::Sender<StoveUpdate>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    let (unsolicited_tx, mut unsolicited_rx) =
        mpsc::channel::<UnsolicitedAnswer>(UPDATE_CHANNEL_CAPACITY);
    let (poll_updates_tx, mut poll_updates_rx) =
        mpsc::channel::<StoveUpdate>(UPDATE_CHANNEL_CAPACITY);
    let (events_tx, mut events_rx) = mpsc::channel::<TierEvent>(EVENT_CHANNEL_CAPACITY);

    let correlator = Arc::new(Correlator::spawn(session, unsolicited_tx));
    let scheduler = Arc::new(PollScheduler::new(
        config,
        correlator.clone(),
        poll_updates_tx,
        events_tx,
    ));

    // Identity tier first; values are cached until the next reconnect.
    let info_ok = scheduler.fetch_info().await;
    while let Ok(update) = poll_updates_rx.try_recv() {
        apply_update(update, snapshot_tx, updates_tx);
    }
    debug!(succeeded = info_ok, "identity tier complete");
    let _ = state_tx.send(ConnectionState::Connected);

    let tier_tasks = scheduler.spawn_tiers(shutdown_rx.clone());

    let reason = loop {
        tokio::select! {
            maybe_update = poll_updates_rx.recv() => match maybe_update {
                Some(update) => apply_update(update, snapshot_tx, updates_tx),
                None => break "scheduler stopped",
            },
            maybe_answer = unsolicited_rx.recv() => match maybe_answer {
                Some((name, raw)) => apply_unsolicited(&name, &raw, snapshot_tx, updates_tx),
                // The dispatcher exited: the inbound sequence ended.
                None => break "stream closed",
            },
            maybe_event = events_rx.recv() => match maybe_event {
                Some(TierEvent::LinkDegraded) => {
                    warn!("link degraded");
                    let _ = state_tx.send(ConnectionState::Degraded);
                }
                Some(TierEvent::LinkRecovered) => {
                    info!("link recovered");
                    let _ = state_tx.send(ConnectionState::Connected);
                }
                Some(TierEvent::LinkLost) => break "link lost",
                Some(TierEvent::CycleCompleted { tier, succeeded, total }) => {
                    debug!(%tier, succeeded, total, "cycle completed");
                }
                None => break "scheduler stopped",
            },
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break "shutdown";
                }
            }
        }
    };

    info!(reason, "tearing down session");
    for task in tier_tasks {
        task.abort();
    }
    correlator.shutdown().await;
}

/// Applies a decoded update to the snapshot and fans it out.
fn apply_update(
    update: StoveUpdate,
    snapshot_tx: &watch::Sender<StoveSnapshot>,
    updates_tx: &broadcast::Sender<StoveUpdate>,
) {
    snapshot_tx.send_modify(|snapshot| snapshot.apply(&update));
    // No subscribers is fine.
    let _ = updates_tx.send(update);
}

/// Handles an answer the device pushed without a pending request.
fn apply_unsolicited(
    name: &str,
    raw: &str,
    snapshot_tx: &watch::Sender<StoveSnapshot>,
    updates_tx: &broadcast::Sender<StoveUpdate>,
) {
    let Some(command) = Command::find(name) else {
        warn!(command = %name, "discarding answer for unknown command");
        return;
    };
    match command.parse_value(raw) {
        Ok(value) => {
            debug!(command = %name, "unsolicited update");
            apply_update(StoveUpdate::now(name, value), snapshot_tx, updates_tx);
        }
        Err(err) => {
            warn!(command = %name, error = %err, "discarding unparseable unsolicited value");
        }
    }
}
