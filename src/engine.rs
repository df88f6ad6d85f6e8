//! The spin engine: queue, lifecycle state machine and background workers.
//!
//! `submit_spin` blocks the caller only until the ledger issues the bet
//! commitment; everything after WAITING runs on a spawned task per spin.
//! The provisional outcome is always computed before the claim is
//! attempted, and outcome information only ever gains precision
//! (unset -> unverified -> verified). A spin that produced any outcome
//! always finishes COMPLETED; claim failures are absorbed, logged and
//! downgraded to an unverified result.

use crate::adapter::SlotAdapter;
use crate::config::QueueSettings;
use crate::errors::{SpinError, SpinResult};
use crate::spin::{BetCommitment, QueuedSpin, SpinOutcome, SpinStatus, SpinTicket};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Orchestrates concurrent in-flight spins against one adapter.
///
/// Cheap to clone; clones share the queue and pending pool.
#[derive(Clone)]
pub struct SpinEngine {
    adapter: Arc<dyn SlotAdapter>,
    queue: Arc<DashMap<Uuid, QueuedSpin>>,
    pending: Arc<DashMap<Uuid, Vec<oneshot::Sender<SpinOutcome>>>>,
    settings: QueueSettings,
}

impl SpinEngine {
    pub fn new(adapter: Arc<dyn SlotAdapter>, settings: QueueSettings) -> Self {
        Self {
            adapter,
            queue: Arc::new(DashMap::new()),
            pending: Arc::new(DashMap::new()),
            settings,
        }
    }

    /// Submit a wager. Returns once the commitment exists; the rest of the
    /// lifecycle runs in the background. Submission failure is terminal for
    /// the spin — a paid stake is never silently resubmitted.
    pub async fn submit_spin(&self, stake_per_line: u64, line_count: u32) -> SpinResult<Uuid> {
        self.adapter.initialize().await?;

        let mut spin = QueuedSpin::new(stake_per_line, line_count);
        spin.status = SpinStatus::Submitting;
        let id = spin.id;
        self.queue.insert(id, spin);

        tracing::info!(spin = %id, stake_per_line, line_count, "Submitting spin");

        match self.adapter.submit_spin(stake_per_line, line_count).await {
            Ok(commitment) => {
                self.update_spin(&id, |spin| {
                    spin.commitment = Some(commitment.clone());
                    spin.status = SpinStatus::Waiting;
                });
                let engine = self.clone();
                tokio::spawn(async move {
                    engine
                        .run_to_completion(id, commitment, stake_per_line, line_count)
                        .await;
                });
                Ok(id)
            }
            Err(e) => {
                tracing::warn!(spin = %id, error = %e, "Submission failed");
                self.finish_without_outcome(&id, SpinStatus::Failed, &e);
                Err(e)
            }
        }
    }

    /// The background lifecycle: WAITING -> PROCESSING -> READY_TO_CLAIM ->
    /// CLAIMING -> COMPLETED, with EXPIRED/FAILED on the documented edges.
    async fn run_to_completion(
        self,
        id: Uuid,
        commitment: BetCommitment,
        stake_per_line: u64,
        line_count: u32,
    ) {
        if let Err(e) = self.wait_for_claim_round(&id, &commitment).await {
            tracing::warn!(spin = %id, error = %e, "Claim round never became available");
            self.finish_without_outcome(&id, SpinStatus::Expired, &e);
            return;
        }

        self.set_status(&id, SpinStatus::Processing);
        let provisional = self
            .adapter
            .outcome_from_seed(&commitment, stake_per_line, line_count)
            .await;
        match provisional {
            Ok(outcome) => {
                tracing::debug!(
                    spin = %id,
                    payout = outcome.total_payout,
                    "Provisional outcome computed"
                );
                self.update_spin(&id, |spin| {
                    spin.record_outcome(outcome);
                    spin.status = SpinStatus::ReadyToClaim;
                });
            }
            Err(e) => {
                // No outcome of any kind could be produced.
                tracing::warn!(spin = %id, error = %e, "Provisional computation failed");
                self.finish_without_outcome(&id, SpinStatus::Failed, &e);
                return;
            }
        }

        // The claim window is a contract-side bound; once it has passed the
        // claim would be rejected anyway, so the provisional result stands.
        if let Ok(round) = self.adapter.current_round().await {
            if round > commitment.claim_round + self.settings.claim_window_rounds {
                let e = SpinError::Timeout {
                    waiting_for: format!("claim window of spin {}", id),
                    waited_ms: 0,
                };
                tracing::warn!(spin = %id, round, "Claim window missed");
                self.set_status(&id, SpinStatus::Expired);
                self.update_spin(&id, |spin| spin.error = Some(e.to_string()));
                self.abandon_waiters(&id);
                return;
            }
        }

        self.set_status(&id, SpinStatus::Claiming);
        match self
            .adapter
            .claim_spin(&commitment, stake_per_line, line_count)
            .await
        {
            Ok(outcome) => {
                self.update_spin(&id, |spin| {
                    if !spin.record_outcome(outcome) {
                        // Guard refused a downgrade; should not happen since
                        // the claim path never returns less than we hold.
                        tracing::warn!(spin = %id, "Discarded regressive claim outcome");
                    }
                });
            }
            Err(e) => {
                // Even the fallback path failed; the stored provisional
                // outcome is promoted to the final, unverified result.
                tracing::warn!(spin = %id, error = %e, "Claim and fallback failed, provisional outcome stands");
            }
        }

        self.set_status(&id, SpinStatus::Completed);
        if let Some(spin) = self.queue.get(&id) {
            if let Some(outcome) = &spin.outcome {
                tracing::info!(
                    spin = %id,
                    payout = outcome.total_payout,
                    verified = outcome.verified,
                    "Spin completed"
                );
            }
        }
        self.notify_waiters(&id);
    }

    /// Poll the round height until the claim round is sealed. Transient
    /// errors are retried with the configured cadence; exhausting the
    /// attempt budget expires the spin.
    async fn wait_for_claim_round(
        &self,
        id: &Uuid,
        commitment: &BetCommitment,
    ) -> SpinResult<()> {
        let interval = Duration::from_millis(self.settings.poll_interval_ms);
        for attempt in 0..self.settings.max_poll_attempts {
            if attempt > 0 {
                tokio::time::sleep(interval).await;
                self.update_spin(id, |spin| spin.note_poll_retry());
            }
            match self.adapter.current_round().await {
                Ok(round) if round >= commitment.claim_round => return Ok(()),
                Ok(_) => {}
                Err(e) if e.is_transient() => {
                    tracing::debug!(spin = %id, error = %e, "Round poll failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(SpinError::Timeout {
            waiting_for: format!("round {}", commitment.claim_round),
            waited_ms: self.settings.poll_interval_ms * self.settings.max_poll_attempts as u64,
        })
    }

    /// Latest outcome of a spin, provisional or final.
    pub fn current_outcome(&self, id: &Uuid) -> Option<SpinOutcome> {
        self.queue.get(id).and_then(|spin| spin.outcome.clone())
    }

    /// Full record of a spin.
    pub fn spin(&self, id: &Uuid) -> Option<QueuedSpin> {
        self.queue.get(id).map(|spin| spin.clone())
    }

    /// Plain-data snapshot of the whole queue, oldest first.
    pub fn queue_state(&self) -> Vec<SpinTicket> {
        let mut spins: Vec<QueuedSpin> =
            self.queue.iter().map(|entry| entry.value().clone()).collect();
        spins.sort_by_key(|spin| spin.created_at);
        spins.iter().map(SpinTicket::from).collect()
    }

    /// Remove a terminal spin from the active queue and hand it to the
    /// caller for reporting. Non-terminal spins stay queued.
    pub fn take_finished(&self, id: &Uuid) -> Option<QueuedSpin> {
        let terminal = self
            .queue
            .get(id)
            .map(|spin| spin.status.is_terminal())
            .unwrap_or(false);
        if terminal {
            self.queue.remove(id).map(|(_, spin)| spin)
        } else {
            None
        }
    }

    /// Wait until a spin completes and return its final outcome. Fails for
    /// spins that ended without one (FAILED/EXPIRED) or when `timeout`
    /// elapses first.
    pub async fn wait_for_completion(
        &self,
        id: &Uuid,
        timeout: Duration,
    ) -> SpinResult<SpinOutcome> {
        if let Some(result) = self.try_finished(id)? {
            return Ok(result);
        }

        let (tx, rx) = oneshot::channel();
        self.pending.entry(*id).or_default().push(tx);

        // Completion may have raced the registration.
        if let Some(result) = self.try_finished(id)? {
            return Ok(result);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => {
                // Senders dropped: the spin ended without an outcome.
                self.try_finished(id)?.ok_or(SpinError::UnknownSpin(*id))
            }
            Err(_) => {
                self.pending.remove(id);
                Err(SpinError::Timeout {
                    waiting_for: format!("completion of spin {}", id),
                    waited_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Terminal check: `Ok(Some)` when completed with an outcome, `Err` for
    /// FAILED/EXPIRED, `Ok(None)` while still in flight.
    fn try_finished(&self, id: &Uuid) -> SpinResult<Option<SpinOutcome>> {
        let spin = self.queue.get(id).ok_or(SpinError::UnknownSpin(*id))?;
        match spin.status {
            SpinStatus::Completed => Ok(spin.outcome.clone()),
            SpinStatus::Failed => Err(SpinError::TransactionFailed(
                spin.error.clone().unwrap_or_else(|| "Spin failed".to_string()),
            )),
            SpinStatus::Expired => Err(SpinError::Timeout {
                waiting_for: format!("claim round of spin {}", id),
                waited_ms: 0,
            }),
            _ => Ok(None),
        }
    }

    fn update_spin<F: FnOnce(&mut QueuedSpin)>(&self, id: &Uuid, apply: F) {
        if let Some(mut spin) = self.queue.get_mut(id) {
            apply(&mut spin);
        }
    }

    fn set_status(&self, id: &Uuid, status: SpinStatus) {
        self.update_spin(id, |spin| spin.status = status);
    }

    fn finish_without_outcome(&self, id: &Uuid, status: SpinStatus, error: &SpinError) {
        self.update_spin(id, |spin| {
            spin.status = status;
            spin.error = Some(error.to_string());
        });
        self.abandon_waiters(id);
    }

    fn notify_waiters(&self, id: &Uuid) {
        if let Some((_, senders)) = self.pending.remove(id) {
            if let Some(outcome) = self.current_outcome(id) {
                for sender in senders {
                    let _ = sender.send(outcome.clone());
                }
            }
        }
    }

    /// Dropping the senders wakes waiters with a closed-channel error.
    fn abandon_waiters(&self, id: &Uuid) {
        self.pending.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SimulatedAdapter;
    use crate::config::{EngineSettings, QueueSettings};

    fn fast_queue() -> QueueSettings {
        QueueSettings {
            poll_interval_ms: 10,
            max_poll_attempts: 200,
            claim_window_rounds: 1_000,
            claim_timeout_ms: 1_000,
        }
    }

    fn engine_over_simulated() -> (SpinEngine, Arc<SimulatedAdapter>) {
        let adapter = Arc::new(SimulatedAdapter::with_default_machine(
            &EngineSettings::default(),
        ));
        let engine = SpinEngine::new(adapter.clone(), fast_queue());
        (engine, adapter)
    }

    #[tokio::test]
    async fn test_happy_path_completes_verified() {
        let (engine, adapter) = engine_over_simulated();
        let _miner = adapter.ledger().spawn_miner(Duration::from_millis(20));

        let id = engine.submit_spin(10_000, 20).await.unwrap();
        let outcome = engine
            .wait_for_completion(&id, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(outcome.verified);
        let spin = engine.spin(&id).unwrap();
        assert_eq!(spin.status, SpinStatus::Completed);
        assert_eq!(spin.total_stake, 200_000);
        let commitment = spin.commitment.unwrap();
        assert_eq!(commitment.claim_round, commitment.submit_round + 1);
    }

    #[tokio::test]
    async fn test_claim_failure_still_completes_unverified() {
        let (engine, adapter) = engine_over_simulated();
        adapter.ledger().set_fail_claims(true);
        let _miner = adapter.ledger().spawn_miner(Duration::from_millis(20));

        let id = engine.submit_spin(10_000, 20).await.unwrap();
        let outcome = engine
            .wait_for_completion(&id, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!outcome.verified);
        assert_eq!(engine.spin(&id).unwrap().status, SpinStatus::Completed);
        // The player still sees a full result.
        assert_eq!(outcome.grid.reel_count(), 5);
    }

    #[tokio::test]
    async fn test_submission_failure_is_terminal() {
        let (engine, _adapter) = engine_over_simulated();

        // Stake below the machine minimum never reaches the ledger.
        let err = engine.submit_spin(1, 20).await.unwrap_err();
        assert!(matches!(err, SpinError::InvalidWager(_)));

        let tickets = engine.queue_state();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].status, SpinStatus::Failed);
        assert!(tickets[0].error.is_some());
    }

    #[tokio::test]
    async fn test_stalled_chain_expires_spin() {
        let adapter = Arc::new(SimulatedAdapter::with_default_machine(
            &EngineSettings::default(),
        ));
        let mut settings = fast_queue();
        settings.max_poll_attempts = 3;
        let engine = SpinEngine::new(adapter.clone(), settings);

        // No miner: the claim round is never sealed.
        let id = engine.submit_spin(10_000, 20).await.unwrap();
        let err = engine
            .wait_for_completion(&id, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, SpinError::Timeout { .. }));
        let spin = engine.spin(&id).unwrap();
        assert_eq!(spin.status, SpinStatus::Expired);
        assert!(spin.outcome.is_none());
        assert!(spin.poll_retries > 0);
    }

    #[tokio::test]
    async fn test_concurrent_spins_complete_independently() {
        let (engine, adapter) = engine_over_simulated();
        let _miner = adapter.ledger().spawn_miner(Duration::from_millis(10));

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(engine.submit_spin(10_000, 10).await.unwrap());
        }
        for id in &ids {
            let outcome = engine
                .wait_for_completion(id, Duration::from_secs(5))
                .await
                .unwrap();
            assert!(outcome.verified);
        }
        assert_eq!(engine.queue_state().len(), 5);
    }

    #[tokio::test]
    async fn test_take_finished_removes_from_queue() {
        let (engine, adapter) = engine_over_simulated();
        let _miner = adapter.ledger().spawn_miner(Duration::from_millis(10));

        let id = engine.submit_spin(10_000, 5).await.unwrap();
        engine
            .wait_for_completion(&id, Duration::from_secs(5))
            .await
            .unwrap();

        let spin = engine.take_finished(&id).unwrap();
        assert_eq!(spin.status, SpinStatus::Completed);
        assert!(engine.spin(&id).is_none());
        assert!(engine.take_finished(&id).is_none());
    }

    #[tokio::test]
    async fn test_unknown_spin() {
        let (engine, _adapter) = engine_over_simulated();
        let err = engine
            .wait_for_completion(&Uuid::new_v4(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, SpinError::UnknownSpin(_)));
    }
}
