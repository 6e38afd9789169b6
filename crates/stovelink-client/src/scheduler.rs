//! Multi-cadence poll scheduler.
//!
//! Three cycles drive the known commands: live state on a short period,
//! statistics on a longer one, and the identity tier once per connection.
//! The tiers run as independent tasks over disjoint command sets, so a
//! stalled statistics poll never delays state freshness. Within a tier,
//! commands are requested one at a time in declared order.
//!
//! A failed command (timeout, malformed answer, unparseable value) is
//! logged and skipped for that cycle. Only a fully-failed state cycle
//! counts toward degradation; after `degraded_after` consecutive ones the
//! facade is told the link is degraded, and after `reconnect_after` more
//! that it is lost.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use stovelink_core::{CadenceTier, Command, StoveUpdate};

use crate::config::StoveConfig;
use crate::correlator::Correlator;

/// Cycle outcomes reported to the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierEvent {
    /// One tier cycle finished, with its success count.
    CycleCompleted {
        tier: CadenceTier,
        succeeded: usize,
        total: usize,
    },
    /// Consecutive fully-failed state cycles crossed the degradation
    /// threshold.
    LinkDegraded,
    /// A state cycle succeeded again after degradation.
    LinkRecovered,
    /// Degradation persisted; the session should be torn down.
    LinkLost,
}

/// Drives repeated correlated requests per cadence tier.
pub struct PollScheduler {
    correlator: Arc<Correlator>,
    updates: mpsc::Sender<StoveUpdate>,
    events: mpsc::Sender<TierEvent>,
    request_timeout: Duration,
    state_interval: Duration,
    statistics_interval: Duration,
    degraded_after: u32,
    reconnect_after: u32,
}

impl PollScheduler {
    /// Creates a scheduler over an established correlator.
    pub fn new(
        config: &StoveConfig,
        correlator: Arc<Correlator>,
        updates: mpsc::Sender<StoveUpdate>,
        events: mpsc::Sender<TierEvent>,
    ) -> Self {
        Self {
            correlator,
            updates,
            events,
            request_timeout: config.request_timeout,
            state_interval: config.state_interval,
            statistics_interval: config.statistics_interval,
            degraded_after: config.degraded_after.max(1),
            reconnect_after: config.reconnect_after.max(1),
        }
    }

    /// Fetches the identity tier once, best effort. Returns how many
    /// commands answered.
    pub async fn fetch_info(&self) -> usize {
        let mut succeeded = 0;
        for command in Command::for_tier(CadenceTier::Info) {
            if self.poll_one(command).await {
                succeeded += 1;
            }
        }
        debug!(
            succeeded,
            total = Command::for_tier(CadenceTier::Info).count(),
            "identity tier fetched"
        );
        succeeded
    }

    /// Spawns the repeating state and statistics cycles.
    pub fn spawn_tiers(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.clone().run_tier(
                CadenceTier::State,
                self.state_interval,
                shutdown.clone(),
            )),
            tokio::spawn(self.clone().run_tier(
                CadenceTier::Statistics,
                self.statistics_interval,
                shutdown,
            )),
        ]
    }

    async fn run_tier(
        self: Arc<Self>,
        tier: CadenceTier,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let total = Command::for_tier(tier).count();
        let mut consecutive_failures: u32 = 0;
        let mut degraded = false;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let mut succeeded = 0;
            for command in Command::for_tier(tier) {
                if *shutdown.borrow() {
                    return;
                }
                if self.poll_one(command).await {
                    succeeded += 1;
                }
            }

            if self
                .events
                .send(TierEvent::CycleCompleted {
                    tier,
                    succeeded,
                    total,
                })
                .await
                .is_err()
            {
                return;
            }

            if tier != CadenceTier::State {
                continue;
            }

            if succeeded == 0 {
                consecutive_failures += 1;
                if consecutive_failures == self.degraded_after {
                    degraded = true;
                    warn!(failures = consecutive_failures, "state tier degraded");
                    if self.events.send(TierEvent::LinkDegraded).await.is_err() {
                        return;
                    }
                } else if consecutive_failures == self.degraded_after + self.reconnect_after {
                    warn!(failures = consecutive_failures, "state tier lost");
                    let _ = self.events.send(TierEvent::LinkLost).await;
                    return;
                }
            } else {
                if degraded {
                    info!("state tier recovered");
                    degraded = false;
                    if self.events.send(TierEvent::LinkRecovered).await.is_err() {
                        return;
                    }
                }
                consecutive_failures = 0;
            }
        }
    }

    /// Requests one command and forwards the decoded update.
    async fn poll_one(&self, command: &'static Command) -> bool {
        match self
            .correlator
            .request(command.name, self.request_timeout)
            .await
        {
            Ok(raw) => match command.parse_value(&raw) {
                Ok(value) => {
                    let update = StoveUpdate::now(command.name, value);
                    self.updates.send(update).await.is_ok()
                }
                Err(err) => {
                    warn!(command = command.name, error = %err, "discarding unparseable value");
                    false
                }
            },
            Err(err) => {
                debug!(command = command.name, error = %err, "poll failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::Correlator;
    use crate::session::Session;
    use crate::testutil::FakeStove;
    use stovelink_core::StoveValue;

    fn test_config(port: u16) -> StoveConfig {
        StoveConfig::new("127.0.0.1")
            .with_port(port)
            .with_connect_timeout(Duration::from_secs(2))
            .with_request_timeout(Duration::from_millis(60))
            .with_state_interval(Duration::from_millis(30))
            .with_statistics_interval(Duration::from_millis(30))
    }

    struct Harness {
        scheduler: Arc<PollScheduler>,
        updates: mpsc::Receiver<StoveUpdate>,
        events: mpsc::Receiver<TierEvent>,
        shutdown: watch::Sender<bool>,
    }

    async fn harness(config: StoveConfig) -> Harness {
        let session = Session::open(&config).await.unwrap();
        let (unsolicited_tx, _unsolicited_rx) = mpsc::channel(16);
        let correlator = Arc::new(Correlator::spawn(session, unsolicited_tx));
        let (updates_tx, updates_rx) = mpsc::channel(256);
        let (events_tx, events_rx) = mpsc::channel(256);
        let scheduler = Arc::new(PollScheduler::new(
            &config,
            correlator,
            updates_tx,
            events_tx,
        ));
        let (shutdown_tx, _) = watch::channel(false);
        Harness {
            scheduler,
            updates: updates_rx,
            events: events_rx,
            shutdown: shutdown_tx,
        }
    }

    #[tokio::test]
    async fn info_tier_fetches_all_identity_commands() {
        let stove = FakeStove::spawn().await;
        stove.answer("_oemser", "12345").await;
        stove.answer("_wversion", "V2.13").await;

        let harness = harness(test_config(stove.port())).await;
        let succeeded = harness.scheduler.fetch_info().await;
        assert_eq!(succeeded, 5);

        let requested = stove.requests().await;
        assert_eq!(
            requested,
            vec!["_oemdev", "_oemver", "_wversion", "_oemser", "_ledBri"]
        );
    }

    #[tokio::test]
    async fn state_cycle_emits_updates_in_declared_order() {
        let stove = FakeStove::spawn().await;
        stove.answer("appPhase", "2").await;
        stove.answer("appT", "248.5").await;
        // Quiet the statistics tier so only state updates arrive.
        for command in ["appPTx", "appP30Tx", "appPT[0;59]", "appP30T[0;29]", "appIQDarst"] {
            stove.ignore(command).await;
        }

        let mut harness = harness(test_config(stove.port())).await;
        let tasks = harness
            .scheduler
            .spawn_tiers(harness.shutdown.subscribe());

        // First two updates of the first cycle follow declared order.
        let first = harness.updates.recv().await.unwrap();
        assert_eq!(first.command, "appPhase");
        assert_eq!(first.value, StoveValue::Integer(2));
        let second = harness.updates.recv().await.unwrap();
        assert_eq!(second.command, "appT");
        assert_eq!(second.value, StoveValue::Decimal(248.5));

        harness.shutdown.send(true).unwrap();
        for task in tasks {
            task.abort();
        }
    }

    #[tokio::test]
    async fn stalled_statistics_tier_does_not_block_state_tier() {
        let stove = FakeStove::spawn().await;
        for command in ["appPTx", "appP30Tx", "appPT[0;59]", "appP30T[0;29]", "appIQDarst"] {
            stove.ignore(command).await;
        }

        let mut harness = harness(test_config(stove.port())).await;
        let tasks = harness
            .scheduler
            .spawn_tiers(harness.shutdown.subscribe());

        // With every statistics command timing out, one statistics cycle
        // takes ~300ms. Meanwhile the state tier should complete several
        // cycles on its 30ms period.
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(stove.request_count("appT").await >= 3);
        assert!(stove.request_count("appPTx").await >= 1);

        let mut state_updates = 0;
        while let Ok(update) = harness.updates.try_recv() {
            if update.command == "appT" {
                state_updates += 1;
            }
        }
        assert!(state_updates >= 3);

        harness.shutdown.send(true).unwrap();
        for task in tasks {
            task.abort();
        }
    }

    #[tokio::test]
    async fn degradation_and_recovery_events() {
        let stove = FakeStove::spawn().await;
        stove.silent(true).await;

        let config = test_config(stove.port()).with_degradation(2, 100);
        let mut harness = harness(config).await;
        let tasks = harness
            .scheduler
            .spawn_tiers(harness.shutdown.subscribe());

        // Wait for the degradation event to surface.
        let degraded = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match harness.events.recv().await {
                    Some(TierEvent::LinkDegraded) => return true,
                    Some(_) => continue,
                    None => return false,
                }
            }
        })
        .await
        .unwrap();
        assert!(degraded);

        // Device answers again: the next successful cycle reports recovery.
        stove.silent(false).await;
        let recovered = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match harness.events.recv().await {
                    Some(TierEvent::LinkRecovered) => return true,
                    Some(_) => continue,
                    None => return false,
                }
            }
        })
        .await
        .unwrap();
        assert!(recovered);

        harness.shutdown.send(true).unwrap();
        for task in tasks {
            task.abort();
        }
    }

    #[tokio::test]
    async fn persistent_failure_reports_link_lost() {
        let stove = FakeStove::spawn().await;
        stove.silent(true).await;

        let config = test_config(stove.port()).with_degradation(2, 1);
        let mut harness = harness(config).await;
        let tasks = harness
            .scheduler
            .spawn_tiers(harness.shutdown.subscribe());

        let lost = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match harness.events.recv().await {
                    Some(TierEvent::LinkLost) => return true,
                    Some(_) => continue,
                    None => return false,
                }
            }
        })
        .await
        .unwrap();
        assert!(lost);

        harness.shutdown.send(true).unwrap();
        for task in tasks {
            task.abort();
        }
    }
}
