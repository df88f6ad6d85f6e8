//! Simulated machine: an in-memory ledger plus an adapter over it.
//!
//! The in-memory ledger speaks the same `LedgerClient` protocol the live
//! adapters use, so the full submission/claim path is exercised without a
//! network. Its "contract" claims through the same grid/evaluator code the
//! adapters use locally, which makes chain-vs-local agreement testable.
//! Knobs for tests: funding, manual round advance, forced seeds and claim
//! failure injection.

use crate::adapter::live::LiveCore;
use crate::adapter::SlotAdapter;
use crate::config::{EngineSettings, SettingsBuilder};
use crate::errors::{SpinError, SpinResult};
use crate::evaluator;
use crate::grid;
use crate::ledger::{
    ChainParams, ConfirmedGroup, LedgerClient, PaymentSpec, StateValue, StaticSigner,
    TransactionSigner, TransactionSpec,
};
use crate::paytable::{MachineConfig, WinRule};
use crate::spin::{BetCommitment, SpinOutcome};
use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Application id the simulated contract answers under.
pub const SIM_APP_ID: u64 = 1;

/// Default wallet the simulated adapter spins for.
pub const SIM_PLAYER: &str = "SIM-PLAYER";

const SIM_MIN_FEE: u64 = 1_000;
const SIM_INITIAL_BALANCE: u64 = 1_000_000_000_000;

/// Project a machine configuration into contract global-state entries, the
/// inverse of the live adapter's configuration fetch.
pub fn machine_global_state(config: &MachineConfig) -> HashMap<String, StateValue> {
    let mut state = HashMap::new();
    state.insert(
        "reel_symbols".to_string(),
        StateValue::Bytes(config.layout.reel_symbols.as_bytes().to_vec()),
    );
    state.insert(
        "reel_count".to_string(),
        StateValue::Uint(config.layout.reel_count as u64),
    );
    state.insert(
        "reel_length".to_string(),
        StateValue::Uint(config.layout.reel_length as u64),
    );
    state.insert(
        "window_height".to_string(),
        StateValue::Uint(config.layout.window_height as u64),
    );
    if config.win_rule == WinRule::Paylines {
        state.insert(
            "payline_count".to_string(),
            StateValue::Uint(config.paylines.len() as u64),
        );
        for (i, pattern) in config.paylines.iter().enumerate() {
            state.insert(format!("payline:{}", i), StateValue::Bytes(pattern.clone()));
        }
    }
    for entry in config.paytable.entries() {
        state.insert(
            format!("pay:{}:{}", entry.symbol, entry.run_length),
            StateValue::Uint(entry.multiplier),
        );
    }
    state.insert(
        "min_stake".to_string(),
        StateValue::Uint(config.min_stake_per_line),
    );
    state.insert(
        "max_stake".to_string(),
        StateValue::Uint(config.max_stake_per_line),
    );
    state.insert(
        "max_lines".to_string(),
        StateValue::Uint(config.max_lines as u64),
    );
    state.insert(
        "max_payout_multiplier".to_string(),
        StateValue::Uint(config.max_payout_multiplier),
    );
    state
}

struct SimBet {
    stake_per_line: u64,
    line_count: u32,
    claim_round: u64,
    claimed: bool,
}

/// In-memory ledger with the slot contract baked in.
pub struct InMemoryLedger {
    config: Arc<MachineConfig>,
    balances: DashMap<String, u64>,
    round: AtomicU64,
    genesis_seed: [u8; 32],
    bets: DashMap<String, SimBet>,
    payments: Mutex<Vec<PaymentSpec>>,
    seed_overrides: DashMap<u64, [u8; 32]>,
    fail_claims: AtomicBool,
    config_fetches: AtomicU32,
}

impl InMemoryLedger {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            config: Arc::new(config),
            balances: DashMap::new(),
            round: AtomicU64::new(1),
            genesis_seed: [0x5Eu8; 32],
            bets: DashMap::new(),
            payments: Mutex::new(Vec::new()),
            seed_overrides: DashMap::new(),
            fail_claims: AtomicBool::new(false),
            config_fetches: AtomicU32::new(0),
        }
    }

    /// Randomize the genesis entropy so each run sees different grids.
    pub fn with_random_entropy(mut self) -> Self {
        self.genesis_seed = rand::random();
        self
    }

    pub fn min_fee(&self) -> u64 {
        SIM_MIN_FEE
    }

    pub fn fund(&self, address: &str, amount: u64) {
        *self.balances.entry(address.to_string()).or_insert(0) += amount;
    }

    /// Seal `count` further rounds.
    pub fn advance_rounds(&self, count: u64) {
        self.round.fetch_add(count, Ordering::SeqCst);
    }

    /// Pin the seed of a specific round.
    pub fn force_seed(&self, round: u64, seed: [u8; 32]) {
        self.seed_overrides.insert(round, seed);
    }

    /// Make every subsequent claim call fail at the contract level.
    pub fn set_fail_claims(&self, fail: bool) {
        self.fail_claims.store(fail, Ordering::SeqCst);
    }

    /// Payments observed so far, submission order.
    pub fn payments(&self) -> Vec<PaymentSpec> {
        self.payments.lock().expect("payments lock").clone()
    }

    /// Number of configuration fetches served.
    pub fn config_fetch_count(&self) -> u32 {
        self.config_fetches.load(Ordering::SeqCst)
    }

    /// Background task sealing a round every `interval`.
    pub fn spawn_miner(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let ledger = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tick.tick().await;
                ledger.round.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    fn seed_for(&self, round: u64) -> [u8; 32] {
        if let Some(seed) = self.seed_overrides.get(&round) {
            return *seed;
        }
        let mut hasher = Sha256::new();
        hasher.update(self.genesis_seed);
        hasher.update(round.to_be_bytes());
        hasher.finalize().into()
    }

    fn debit(&self, address: &str, amount: u64) -> SpinResult<()> {
        let mut balance = self.balances.entry(address.to_string()).or_insert(0);
        if *balance < amount {
            return Err(SpinError::TransactionFailed(format!(
                "Overspend by {}: {} < {}",
                address, *balance, amount
            )));
        }
        *balance -= amount;
        Ok(())
    }

    fn handle_spin(
        &self,
        payment: &PaymentSpec,
        sender: &str,
        args: &[Vec<u8>],
    ) -> SpinResult<ConfirmedGroup> {
        let stake_per_line = parse_u64(args.first()).ok_or_else(|| {
            SpinError::TransactionFailed("Spin call missing stake argument".to_string())
        })?;
        let line_count = parse_u32(args.get(1)).ok_or_else(|| {
            SpinError::TransactionFailed("Spin call missing line-count argument".to_string())
        })?;
        let player_index = parse_u64(args.get(2)).ok_or_else(|| {
            SpinError::TransactionFailed("Spin call missing player index".to_string())
        })?;

        let required = stake_per_line * line_count as u64 + SIM_MIN_FEE;
        if payment.amount < required {
            return Err(SpinError::TransactionFailed(format!(
                "Underpaid spin: {} < {}",
                payment.amount, required
            )));
        }

        self.debit(&payment.sender, payment.amount)?;
        self.fund(&payment.receiver, payment.amount);
        self.payments
            .lock()
            .expect("payments lock")
            .push(payment.clone());

        let confirmed_round = self.round.fetch_add(1, Ordering::SeqCst) + 1;

        let mut hasher = Sha256::new();
        hasher.update(sender.as_bytes());
        hasher.update(confirmed_round.to_be_bytes());
        hasher.update(stake_per_line.to_be_bytes());
        hasher.update(line_count.to_be_bytes());
        hasher.update(player_index.to_be_bytes());
        let key: [u8; 32] = hasher.finalize().into();
        let key_hex = hex::encode(key);

        self.bets.insert(
            key_hex.clone(),
            SimBet {
                stake_per_line,
                line_count,
                claim_round: confirmed_round + 1,
                claimed: false,
            },
        );

        Ok(ConfirmedGroup {
            tx_id: format!("SIMTX-{}", &key_hex[..16]),
            confirmed_round,
            return_value: Some(key.to_vec()),
            logs: vec![],
        })
    }

    fn handle_claim(&self, sender: &str, args: &[Vec<u8>]) -> SpinResult<ConfirmedGroup> {
        if self.fail_claims.load(Ordering::SeqCst) {
            return Err(SpinError::ContractError(
                "Claim rejected by failure injection".to_string(),
            ));
        }

        let key = args.first().ok_or_else(|| {
            SpinError::ContractError("Claim call missing bet key".to_string())
        })?;
        let key_hex = hex::encode(key);

        let mut bet = self
            .bets
            .get_mut(&key_hex)
            .ok_or_else(|| SpinError::ContractError(format!("Unknown bet {}", key_hex)))?;
        if bet.claimed {
            return Err(SpinError::ContractError(format!(
                "Bet {} already claimed",
                key_hex
            )));
        }
        if bet.claim_round > self.round.load(Ordering::SeqCst) {
            return Err(SpinError::ContractError(format!(
                "Round {} not sealed yet",
                bet.claim_round
            )));
        }

        // Authoritative contract computation: same derivation and evaluation
        // the adapters run locally.
        let seed = self.seed_for(bet.claim_round);
        let window = grid::generate(key, &seed, &self.config.layout);
        let summary =
            evaluator::evaluate(&window, &self.config, bet.stake_per_line, bet.line_count);

        bet.claimed = true;
        drop(bet);

        if summary.total_payout > 0 {
            self.fund(sender, summary.total_payout);
        }

        let confirmed_round = self.round.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ConfirmedGroup {
            tx_id: format!("SIMCLAIM-{}", &key_hex[..16]),
            confirmed_round,
            return_value: Some(summary.total_payout.to_be_bytes().to_vec()),
            logs: vec![],
        })
    }
}

fn parse_u64(bytes: Option<&Vec<u8>>) -> Option<u64> {
    let arr: [u8; 8] = bytes?.as_slice().try_into().ok()?;
    Some(u64::from_be_bytes(arr))
}

fn parse_u32(bytes: Option<&Vec<u8>>) -> Option<u32> {
    let arr: [u8; 4] = bytes?.as_slice().try_into().ok()?;
    Some(u32::from_be_bytes(arr))
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn suggested_params(&self) -> SpinResult<ChainParams> {
        Ok(ChainParams {
            min_fee: SIM_MIN_FEE,
            last_round: self.round.load(Ordering::SeqCst),
            genesis_id: "simnet-v1".to_string(),
        })
    }

    async fn submit_group(
        &self,
        group: &[TransactionSpec],
        signer: &dyn TransactionSigner,
    ) -> SpinResult<ConfirmedGroup> {
        let call = group
            .iter()
            .find_map(|tx| match tx {
                TransactionSpec::AppCall(call) => Some(call),
                TransactionSpec::Payment(_) => None,
            })
            .ok_or_else(|| {
                SpinError::TransactionFailed("Group carries no application call".to_string())
            })?;

        match call.method.as_str() {
            "spin" => {
                let payment = group
                    .iter()
                    .find_map(|tx| match tx {
                        TransactionSpec::Payment(p) => Some(p),
                        TransactionSpec::AppCall(_) => None,
                    })
                    .ok_or_else(|| {
                        SpinError::TransactionFailed(
                            "Spin group carries no payment".to_string(),
                        )
                    })?;
                self.handle_spin(payment, signer.address(), &call.args)
            }
            "claim" => self.handle_claim(signer.address(), &call.args),
            other => Err(SpinError::ContractError(format!(
                "Unknown method '{}'",
                other
            ))),
        }
    }

    async fn account_balance(&self, address: &str) -> SpinResult<u64> {
        Ok(self.balances.get(address).map(|b| *b).unwrap_or(0))
    }

    async fn current_round(&self) -> SpinResult<u64> {
        Ok(self.round.load(Ordering::SeqCst))
    }

    async fn block_seed(&self, round: u64) -> SpinResult<[u8; 32]> {
        if round > self.round.load(Ordering::SeqCst) {
            return Err(SpinError::Network(format!(
                "Round {} not sealed yet",
                round
            )));
        }
        Ok(self.seed_for(round))
    }

    async fn app_global_state(&self, app_id: u64) -> SpinResult<HashMap<String, StateValue>> {
        if app_id != SIM_APP_ID {
            return Err(SpinError::ContractError(format!(
                "Unknown application {}",
                app_id
            )));
        }
        self.config_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(machine_global_state(&self.config))
    }
}

/// The simulated adapter variant: the live protocol core over an in-memory
/// ledger, pre-funded and ready to spin.
pub struct SimulatedAdapter {
    core: LiveCore,
    ledger: Arc<InMemoryLedger>,
}

impl SimulatedAdapter {
    /// Simulated machine with the reference five-reel configuration.
    pub fn with_default_machine(settings: &EngineSettings) -> Self {
        Self::new(MachineConfig::five_reel_default(), settings)
    }

    pub fn new(config: MachineConfig, settings: &EngineSettings) -> Self {
        let win_rule = config.win_rule;
        let ledger = Arc::new(InMemoryLedger::new(config));
        ledger.fund(SIM_PLAYER, SIM_INITIAL_BALANCE);

        let core_settings = SettingsBuilder::new()
            .machine(settings.machine)
            .app_id(SIM_APP_ID)
            .queue(settings.queue.clone())
            .build();
        let ledger_client: Arc<dyn LedgerClient> = ledger.clone();
        let core = LiveCore::new(
            &core_settings,
            win_rule,
            ledger_client,
            Arc::new(StaticSigner::new(SIM_PLAYER)),
        );
        Self { core, ledger }
    }

    /// Test/demo controls over the underlying ledger.
    pub fn ledger(&self) -> &Arc<InMemoryLedger> {
        &self.ledger
    }
}

crate::adapter::live::delegate_slot_adapter!(SimulatedAdapter);
