//! Blockchain adapters: the capability interface between the spin engine
//! and a concrete machine contract.
//!
//! A closed set of variants implements `SlotAdapter`: the in-memory
//! `SimulatedAdapter` and the live `LiveFiveReelAdapter` /
//! `LiveWaysAdapter`, which share one submission/claim protocol and differ
//! only in how the evaluator interprets the grid.

pub mod live;
pub mod simulated;

pub use live::{LiveFiveReelAdapter, LiveWaysAdapter};
pub use simulated::{InMemoryLedger, SimulatedAdapter};

use crate::errors::{SpinError, SpinResult};
use crate::evaluator;
use crate::grid;
use crate::paytable::MachineConfig;
use crate::spin::{BetCommitment, SpinOutcome};
use async_trait::async_trait;
use std::sync::Arc;

/// Capability interface over a slot-machine contract.
#[async_trait]
pub trait SlotAdapter: Send + Sync {
    /// Resolve and cache the machine configuration. Idempotent: concurrent
    /// and repeated calls coalesce into at most one underlying fetch.
    async fn initialize(&self) -> SpinResult<()>;

    /// The cached configuration. `NotInitialized` before `initialize`.
    fn machine_config(&self) -> SpinResult<Arc<MachineConfig>>;

    /// Pay the stake and commit to a future round's seed in one atomic
    /// two-transaction group. Returns the ledger-issued bet commitment.
    async fn submit_spin(&self, stake_per_line: u64, line_count: u32)
        -> SpinResult<BetCommitment>;

    /// Compute the provisional outcome from the claim round's seed, without
    /// any claim transaction. Usable the instant that round exists.
    async fn outcome_from_seed(
        &self,
        commitment: &BetCommitment,
        stake_per_line: u64,
        line_count: u32,
    ) -> SpinResult<SpinOutcome>;

    /// Attempt the authoritative on-ledger claim. Success carries the
    /// ledger's payout figure and `verified = true`; on claim failure the
    /// adapter falls back to the identical local computation with
    /// `verified = false` and only errors when even that is impossible.
    async fn claim_spin(
        &self,
        commitment: &BetCommitment,
        stake_per_line: u64,
        line_count: u32,
    ) -> SpinResult<SpinOutcome>;

    async fn balance(&self, address: &str) -> SpinResult<u64>;

    async fn current_round(&self) -> SpinResult<u64>;

    /// The wallet address this adapter spins for.
    fn wallet_address(&self) -> &str;
}

/// Check a wager against the machine bounds before any ledger traffic.
pub(crate) fn validate_wager(
    config: &MachineConfig,
    stake_per_line: u64,
    line_count: u32,
) -> SpinResult<()> {
    if stake_per_line < config.min_stake_per_line || stake_per_line > config.max_stake_per_line {
        return Err(SpinError::InvalidWager(format!(
            "stake_per_line {} outside {}..{}",
            stake_per_line, config.min_stake_per_line, config.max_stake_per_line
        )));
    }
    if line_count == 0 || line_count > config.max_lines {
        return Err(SpinError::InvalidWager(format!(
            "line_count {} outside 1..{}",
            line_count, config.max_lines
        )));
    }
    Ok(())
}

/// The single local computation path shared by provisional outcomes, claim
/// fallbacks and the simulated ledger's authoritative claim.
pub(crate) fn local_outcome(
    config: &MachineConfig,
    commitment: &BetCommitment,
    seed: [u8; 32],
    stake_per_line: u64,
    line_count: u32,
    verified: bool,
) -> SpinOutcome {
    let grid = grid::generate(&commitment.key, &seed, &config.layout);
    let summary = evaluator::evaluate(&grid, config, stake_per_line, line_count);
    SpinOutcome {
        grid,
        winning_lines: summary.winning_lines,
        total_payout: summary.total_payout,
        seed_round: commitment.claim_round,
        seed,
        bet_key: commitment.key.clone(),
        verified,
        claim_tx_id: None,
    }
}
