//! Live adapters: the real submission/claim protocol against a slot
//! contract, shared by both machine types.
//!
//! `LiveCore` owns the protocol; `LiveFiveReelAdapter` and
//! `LiveWaysAdapter` wrap it with the evaluation rule their contract
//! family uses. The claim path is an explicit two-branch design: the
//! authoritative on-ledger claim when it succeeds, the identical local
//! computation (flagged unverified) when it does not.

use crate::adapter::{local_outcome, validate_wager, SlotAdapter};
use crate::config::EngineSettings;
use crate::errors::{SpinError, SpinResult};
use crate::evaluator::MIN_RUN;
use crate::ledger::{
    app_escrow_address, AppCallSpec, LedgerClient, PaymentSpec, StateValue, TransactionSigner,
    TransactionSpec,
};
use crate::paytable::{MachineConfig, Paytable, PaytableEntry, PaylineSet, ReelLayout, WinRule};
use crate::spin::{BetCommitment, SpinOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Shared protocol implementation for the live variants.
pub(crate) struct LiveCore {
    app_id: u64,
    win_rule: WinRule,
    claim_timeout: Duration,
    pub(crate) ledger: Arc<dyn LedgerClient>,
    pub(crate) signer: Arc<dyn TransactionSigner>,
    config: OnceCell<Arc<MachineConfig>>,
}

impl LiveCore {
    pub(crate) fn new(
        settings: &EngineSettings,
        win_rule: WinRule,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransactionSigner>,
    ) -> Self {
        Self {
            app_id: settings.app_id,
            win_rule,
            claim_timeout: Duration::from_millis(settings.queue.claim_timeout_ms),
            ledger,
            signer,
            config: OnceCell::new(),
        }
    }

    pub(crate) async fn initialize(&self) -> SpinResult<()> {
        self.config
            .get_or_try_init(|| async {
                let config = self.fetch_config().await?;
                config.validate()?;
                tracing::info!(
                    app_id = self.app_id,
                    rule = %config.win_rule,
                    paylines = config.paylines.len(),
                    "Machine configuration resolved"
                );
                Ok(Arc::new(config))
            })
            .await
            .map(|_| ())
    }

    pub(crate) fn require_config(&self) -> SpinResult<Arc<MachineConfig>> {
        self.config
            .get()
            .cloned()
            .ok_or_else(|| SpinError::NotInitialized("Machine configuration not fetched".to_string()))
    }

    /// Resolve the machine configuration from the contract's global state.
    /// Every required entry must be present; there are no fallback values.
    async fn fetch_config(&self) -> SpinResult<MachineConfig> {
        let state = self.ledger.app_global_state(self.app_id).await?;

        let reel_symbols = String::from_utf8(required_bytes(&state, "reel_symbols")?.to_vec())
            .map_err(|_| SpinError::NotInitialized("reel_symbols is not UTF-8".to_string()))?;
        let reel_count = required_uint(&state, "reel_count")? as usize;
        let reel_length = required_uint(&state, "reel_length")? as usize;
        let window_height = required_uint(&state, "window_height")? as usize;
        let layout = ReelLayout::new(reel_symbols, reel_count, reel_length, window_height)
            .map_err(|e| SpinError::NotInitialized(format!("Bad reel layout: {}", e)))?;

        let paylines = match self.win_rule {
            WinRule::Paylines => {
                let count = required_uint(&state, "payline_count")? as usize;
                let mut patterns = Vec::with_capacity(count);
                for i in 0..count {
                    let bytes = required_bytes(&state, &format!("payline:{}", i))?;
                    patterns.push(bytes.to_vec());
                }
                PaylineSet::new(patterns)
            }
            WinRule::Ways => PaylineSet::empty(),
        };

        // One multiplier entry per (strip symbol, qualifying run length);
        // a missing entry means the contract is not fully provisioned.
        let mut entries = Vec::new();
        for symbol in layout.alphabet() {
            for run in MIN_RUN..=reel_count as u8 {
                let key = format!("pay:{}:{}", symbol, run);
                let multiplier = required_uint(&state, &key)?;
                entries.push(PaytableEntry {
                    symbol,
                    run_length: run,
                    multiplier,
                });
            }
        }

        Ok(MachineConfig {
            win_rule: self.win_rule,
            layout,
            paylines,
            paytable: Paytable::new(entries),
            min_stake_per_line: required_uint(&state, "min_stake")?,
            max_stake_per_line: required_uint(&state, "max_stake")?,
            max_lines: required_uint(&state, "max_lines")? as u32,
            max_payout_multiplier: required_uint(&state, "max_payout_multiplier")?,
        })
    }

    pub(crate) async fn submit_spin(
        &self,
        stake_per_line: u64,
        line_count: u32,
    ) -> SpinResult<BetCommitment> {
        let config = self.require_config()?;
        validate_wager(&config, stake_per_line, line_count)?;

        let params = self.ledger.suggested_params().await?;
        let total_stake = stake_per_line * line_count as u64;
        let required = total_stake + params.min_fee;

        let available = self.ledger.account_balance(self.signer.address()).await?;
        if available < required {
            return Err(SpinError::InsufficientBalance {
                available,
                required,
            });
        }

        // Fresh per submission: the contract mixes this into the bet key so
        // identical wagers in one round still commit to distinct keys.
        let player_index: u64 = rand::random();

        let group = [
            TransactionSpec::Payment(PaymentSpec {
                sender: self.signer.address().to_string(),
                receiver: app_escrow_address(self.app_id),
                amount: required,
            }),
            TransactionSpec::AppCall(AppCallSpec {
                sender: self.signer.address().to_string(),
                app_id: self.app_id,
                method: "spin".to_string(),
                args: vec![
                    stake_per_line.to_be_bytes().to_vec(),
                    line_count.to_be_bytes().to_vec(),
                    player_index.to_be_bytes().to_vec(),
                ],
            }),
        ];

        let receipt = self
            .ledger
            .submit_group(&group, self.signer.as_ref())
            .await
            .map_err(|e| SpinError::TransactionFailed(e.to_string()))?;

        let key = receipt
            .return_value
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                SpinError::TransactionFailed("Spin call returned no bet key".to_string())
            })?;

        tracing::debug!(
            tx_id = %receipt.tx_id,
            round = receipt.confirmed_round,
            key = %hex::encode(&key),
            "Spin submitted"
        );

        Ok(BetCommitment::new(key, receipt.tx_id, receipt.confirmed_round))
    }

    pub(crate) async fn outcome_from_seed(
        &self,
        commitment: &BetCommitment,
        stake_per_line: u64,
        line_count: u32,
    ) -> SpinResult<SpinOutcome> {
        let config = self.require_config()?;
        let seed = self.ledger.block_seed(commitment.claim_round).await?;
        Ok(local_outcome(
            &config,
            commitment,
            seed,
            stake_per_line,
            line_count,
            false,
        ))
    }

    pub(crate) async fn claim_spin(
        &self,
        commitment: &BetCommitment,
        stake_per_line: u64,
        line_count: u32,
    ) -> SpinResult<SpinOutcome> {
        let config = self.require_config()?;

        let claim = tokio::time::timeout(self.claim_timeout, self.attempt_claim(commitment)).await;
        match claim {
            Ok(Ok((claimed_payout, claim_tx_id))) => {
                let seed = self.ledger.block_seed(commitment.claim_round).await?;
                let mut outcome = local_outcome(
                    &config,
                    commitment,
                    seed,
                    stake_per_line,
                    line_count,
                    true,
                );
                if outcome.total_payout != claimed_payout {
                    // The ledger moved the money; its figure wins.
                    tracing::warn!(
                        bet_key = %commitment.key_hex(),
                        local = outcome.total_payout,
                        claimed = claimed_payout,
                        "Claimed payout differs from local computation"
                    );
                    outcome.total_payout = claimed_payout;
                }
                outcome.claim_tx_id = Some(claim_tx_id);
                Ok(outcome)
            }
            Ok(Err(e)) => {
                self.claim_fallback(&config, commitment, stake_per_line, line_count, &e)
                    .await
            }
            Err(_) => {
                let e = SpinError::Timeout {
                    waiting_for: format!("claim of bet {}", commitment.key_hex()),
                    waited_ms: self.claim_timeout.as_millis() as u64,
                };
                self.claim_fallback(&config, commitment, stake_per_line, line_count, &e)
                    .await
            }
        }
    }

    /// The unverified branch: identical grid/evaluator path, locally fetched
    /// seed. Only errors when the seed itself cannot be read.
    async fn claim_fallback(
        &self,
        config: &Arc<MachineConfig>,
        commitment: &BetCommitment,
        stake_per_line: u64,
        line_count: u32,
        cause: &SpinError,
    ) -> SpinResult<SpinOutcome> {
        tracing::warn!(
            bet_key = %commitment.key_hex(),
            error = %cause,
            "Claim failed, computing outcome locally"
        );
        let seed = self.ledger.block_seed(commitment.claim_round).await?;
        Ok(local_outcome(
            config,
            commitment,
            seed,
            stake_per_line,
            line_count,
            false,
        ))
    }

    async fn attempt_claim(&self, commitment: &BetCommitment) -> SpinResult<(u64, String)> {
        let group = [TransactionSpec::AppCall(AppCallSpec {
            sender: self.signer.address().to_string(),
            app_id: self.app_id,
            method: "claim".to_string(),
            args: vec![commitment.key.clone()],
        })];

        let receipt = self.ledger.submit_group(&group, self.signer.as_ref()).await?;
        let payout_bytes = receipt.return_value.ok_or_else(|| {
            SpinError::ContractError("Claim call returned no payout".to_string())
        })?;
        let payout = parse_u64_be(&payout_bytes).ok_or_else(|| {
            SpinError::ContractError(format!(
                "Claim returned {} bytes, expected 8",
                payout_bytes.len()
            ))
        })?;
        Ok((payout, receipt.tx_id))
    }
}

fn parse_u64_be(bytes: &[u8]) -> Option<u64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(arr))
}

fn required_uint(state: &HashMap<String, StateValue>, key: &str) -> SpinResult<u64> {
    state
        .get(key)
        .and_then(StateValue::as_uint)
        .ok_or_else(|| SpinError::NotInitialized(format!("Missing contract state entry '{}'", key)))
}

fn required_bytes<'a>(
    state: &'a HashMap<String, StateValue>,
    key: &str,
) -> SpinResult<&'a [u8]> {
    state
        .get(key)
        .and_then(StateValue::as_bytes)
        .ok_or_else(|| SpinError::NotInitialized(format!("Missing contract state entry '{}'", key)))
}

/// Live adapter for fixed-payline five-reel machines.
pub struct LiveFiveReelAdapter {
    core: LiveCore,
}

impl LiveFiveReelAdapter {
    pub fn new(
        settings: &EngineSettings,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransactionSigner>,
    ) -> Self {
        Self {
            core: LiveCore::new(settings, WinRule::Paylines, ledger, signer),
        }
    }
}

/// Live adapter for ways-to-win machines.
pub struct LiveWaysAdapter {
    core: LiveCore,
}

impl LiveWaysAdapter {
    pub fn new(
        settings: &EngineSettings,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransactionSigner>,
    ) -> Self {
        Self {
            core: LiveCore::new(settings, WinRule::Ways, ledger, signer),
        }
    }
}

/// Implement `SlotAdapter` by delegating to a `core: LiveCore` field.
macro_rules! delegate_slot_adapter {
    ($adapter:ty) => {
        #[async_trait]
        impl SlotAdapter for $adapter {
            async fn initialize(&self) -> SpinResult<()> {
                self.core.initialize().await
            }

            fn machine_config(&self) -> SpinResult<Arc<MachineConfig>> {
                self.core.require_config()
            }

            async fn submit_spin(
                &self,
                stake_per_line: u64,
                line_count: u32,
            ) -> SpinResult<BetCommitment> {
                self.core.submit_spin(stake_per_line, line_count).await
            }

            async fn outcome_from_seed(
                &self,
                commitment: &BetCommitment,
                stake_per_line: u64,
                line_count: u32,
            ) -> SpinResult<SpinOutcome> {
                self.core
                    .outcome_from_seed(commitment, stake_per_line, line_count)
                    .await
            }

            async fn claim_spin(
                &self,
                commitment: &BetCommitment,
                stake_per_line: u64,
                line_count: u32,
            ) -> SpinResult<SpinOutcome> {
                self.core
                    .claim_spin(commitment, stake_per_line, line_count)
                    .await
            }

            async fn balance(&self, address: &str) -> SpinResult<u64> {
                self.core.ledger.account_balance(address).await
            }

            async fn current_round(&self) -> SpinResult<u64> {
                self.core.ledger.current_round().await
            }

            fn wallet_address(&self) -> &str {
                self.core.signer.address()
            }
        }
    };
}

pub(crate) use delegate_slot_adapter;

delegate_slot_adapter!(LiveFiveReelAdapter);
delegate_slot_adapter!(LiveWaysAdapter);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MachineType, SettingsBuilder};
    use crate::ledger::{ChainParams, ConfirmedGroup, StaticSigner};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Ledger stub with a configurable global state and a fetch counter.
    struct StubLedger {
        state: HashMap<String, StateValue>,
        fetches: AtomicU32,
    }

    impl StubLedger {
        fn with_state(state: HashMap<String, StateValue>) -> Self {
            Self {
                state,
                fetches: AtomicU32::new(0),
            }
        }

        fn complete_state() -> HashMap<String, StateValue> {
            crate::adapter::simulated::machine_global_state(&MachineConfig::five_reel_default())
        }
    }

    #[async_trait]
    impl LedgerClient for StubLedger {
        async fn suggested_params(&self) -> SpinResult<ChainParams> {
            Ok(ChainParams {
                min_fee: 1_000,
                last_round: 1,
                genesis_id: "stub-v1".to_string(),
            })
        }

        async fn submit_group(
            &self,
            _group: &[TransactionSpec],
            _signer: &dyn TransactionSigner,
        ) -> SpinResult<ConfirmedGroup> {
            Err(SpinError::Network("stub has no consensus".to_string()))
        }

        async fn account_balance(&self, _address: &str) -> SpinResult<u64> {
            Ok(0)
        }

        async fn current_round(&self) -> SpinResult<u64> {
            Ok(1)
        }

        async fn block_seed(&self, _round: u64) -> SpinResult<[u8; 32]> {
            Ok([0u8; 32])
        }

        async fn app_global_state(
            &self,
            _app_id: u64,
        ) -> SpinResult<HashMap<String, StateValue>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.state.clone())
        }
    }

    fn adapter_over(ledger: Arc<StubLedger>) -> LiveFiveReelAdapter {
        let settings = SettingsBuilder::new()
            .machine(MachineType::FiveReel)
            .app_id(7)
            .build();
        LiveFiveReelAdapter::new(&settings, ledger, Arc::new(StaticSigner::new("PLAYER")))
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let ledger = Arc::new(StubLedger::with_state(StubLedger::complete_state()));
        let adapter = adapter_over(ledger.clone());

        adapter.initialize().await.unwrap();
        adapter.initialize().await.unwrap();

        assert_eq!(ledger.fetches.load(Ordering::SeqCst), 1);
        assert!(adapter.machine_config().is_ok());
    }

    #[tokio::test]
    async fn test_missing_multiplier_refuses_to_initialize() {
        let mut state = StubLedger::complete_state();
        state.remove("pay:A:5");
        let adapter = adapter_over(Arc::new(StubLedger::with_state(state)));

        let err = adapter.initialize().await.unwrap_err();
        assert!(matches!(err, SpinError::NotInitialized(_)));
        assert!(err.to_string().contains("pay:A:5"));
        assert!(adapter.machine_config().is_err());
    }

    #[tokio::test]
    async fn test_uninitialized_adapter_refuses_spins() {
        let ledger = Arc::new(StubLedger::with_state(StubLedger::complete_state()));
        let adapter = adapter_over(ledger);

        let err = adapter.submit_spin(1_000_000, 20).await.unwrap_err();
        assert!(matches!(err, SpinError::NotInitialized(_)));
    }

    #[tokio::test]
    async fn test_insufficient_balance_blocks_submission() {
        let ledger = Arc::new(StubLedger::with_state(StubLedger::complete_state()));
        let adapter = adapter_over(ledger);
        adapter.initialize().await.unwrap();

        // StubLedger reports a zero balance.
        let err = adapter.submit_spin(1_000_000, 20).await.unwrap_err();
        match err {
            SpinError::InsufficientBalance {
                available,
                required,
            } => {
                assert_eq!(available, 0);
                assert_eq!(required, 20_000_000 + 1_000);
            }
            other => panic!("Expected InsufficientBalance, got {}", other),
        }
    }
}
