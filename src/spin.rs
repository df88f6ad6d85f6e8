//! Core data model: bet commitments, queued spins and outcomes.

use crate::grid::Grid;
use crate::paytable::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque handle correlating a submitted wager with its later outcome.
///
/// Issued by the ledger at submission time and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BetCommitment {
    /// The bet key returned by the contract's spin call.
    pub key: Vec<u8>,
    /// Transaction id of the submission group.
    pub tx_id: String,
    /// Round the submission confirmed in.
    pub submit_round: u64,
    /// First round whose seed was unknown at submission time.
    pub claim_round: u64,
}

impl BetCommitment {
    pub fn new(key: Vec<u8>, tx_id: String, submit_round: u64) -> Self {
        Self {
            key,
            tx_id,
            submit_round,
            claim_round: submit_round + 1,
        }
    }

    pub fn key_hex(&self) -> String {
        hex::encode(&self.key)
    }
}

/// Lifecycle states of a queued spin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpinStatus {
    Pending,
    Submitting,
    Waiting,
    Processing,
    ReadyToClaim,
    Claiming,
    Completed,
    Failed,
    Expired,
}

impl SpinStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SpinStatus::Completed | SpinStatus::Failed | SpinStatus::Expired
        )
    }
}

impl fmt::Display for SpinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpinStatus::Pending => "pending",
            SpinStatus::Submitting => "submitting",
            SpinStatus::Waiting => "waiting",
            SpinStatus::Processing => "processing",
            SpinStatus::ReadyToClaim => "ready_to_claim",
            SpinStatus::Claiming => "claiming",
            SpinStatus::Completed => "completed",
            SpinStatus::Failed => "failed",
            SpinStatus::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

/// One winning line of a spin.
///
/// For payline machines `pattern` is the row-per-reel path that matched; for
/// ways machines the pattern is empty, `line_index` enumerates winning
/// symbols and `ways` counts the position combinations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WinningLine {
    pub line_index: u32,
    pub symbol: Symbol,
    pub run_length: u8,
    pub pattern: Vec<u8>,
    pub ways: u32,
    pub payout: u64,
}

/// A complete spin result, provisional or final.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpinOutcome {
    pub grid: Grid,
    pub winning_lines: Vec<WinningLine>,
    pub total_payout: u64,
    /// Round whose seed produced the grid.
    pub seed_round: u64,
    pub seed: [u8; 32],
    pub bet_key: Vec<u8>,
    /// True only when the payout figure came from the ledger's own claim.
    pub verified: bool,
    /// Claim transaction id, present on verified outcomes.
    pub claim_tx_id: Option<String>,
}

/// The engine's unit of work. Created by the caller, mutated only by the
/// engine, removed from the active queue once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedSpin {
    pub id: Uuid,
    pub status: SpinStatus,
    pub stake_per_line: u64,
    pub line_count: u32,
    pub total_stake: u64,
    pub created_at: DateTime<Utc>,
    pub commitment: Option<BetCommitment>,
    pub outcome: Option<SpinOutcome>,
    pub error: Option<String>,
    /// Retry bookkeeping for read-only round polling, never for submission.
    pub poll_retries: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
}

impl QueuedSpin {
    pub fn new(stake_per_line: u64, line_count: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: SpinStatus::Pending,
            stake_per_line,
            line_count,
            total_stake: stake_per_line * line_count as u64,
            created_at: Utc::now(),
            commitment: None,
            outcome: None,
            error: None,
            poll_retries: 0,
            last_retry_at: None,
        }
    }

    /// Store an outcome, preserving the information ordering: an outcome is
    /// assigned at most twice (provisional then final) and a verified
    /// outcome is never replaced by an unverified one. Returns whether the
    /// outcome was accepted.
    pub fn record_outcome(&mut self, outcome: SpinOutcome) -> bool {
        if let Some(existing) = &self.outcome {
            if existing.verified && !outcome.verified {
                return false;
            }
        }
        self.outcome = Some(outcome);
        true
    }

    pub fn note_poll_retry(&mut self) {
        self.poll_retries += 1;
        self.last_retry_at = Some(Utc::now());
    }
}

/// Plain-data queue snapshot entry for the caller-facing API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinTicket {
    pub id: Uuid,
    pub status: SpinStatus,
    pub total_stake: u64,
    pub payout: Option<u64>,
    pub verified: Option<bool>,
    pub error: Option<String>,
}

impl From<&QueuedSpin> for SpinTicket {
    fn from(spin: &QueuedSpin) -> Self {
        Self {
            id: spin.id,
            status: spin.status,
            total_stake: spin.total_stake,
            payout: spin.outcome.as_ref().map(|o| o.total_payout),
            verified: spin.outcome.as_ref().map(|o| o.verified),
            error: spin.error.clone(),
        }
    }
}
