//! Reelspin - Verifiable Spin Engine for an On-Chain Slot Machine
//!
//! Turns a placed wager into a verifiable game outcome against a
//! blockchain-backed randomness source: submits the stake as an atomic
//! two-transaction commitment, derives the symbol grid deterministically
//! from the bet commitment and a later block seed, evaluates wins with
//! exact integer semantics, and reconciles the locally computed outcome
//! with the ledger's authoritative claim in the background.

pub mod adapter;
pub mod config;
pub mod engine;
pub mod errors;
pub mod evaluator;
pub mod factory;
pub mod grid;
pub mod ledger;
pub mod paytable;
pub mod spin;

pub use adapter::{
    InMemoryLedger, LiveFiveReelAdapter, LiveWaysAdapter, SimulatedAdapter, SlotAdapter,
};
pub use config::{EngineSettings, MachineType, QueueSettings, SettingsBuilder, SettingsLoader};
pub use engine::SpinEngine;
pub use errors::{SpinError, SpinResult};
pub use factory::AdapterFactory;
pub use grid::Grid;
pub use ledger::{LedgerClient, StaticSigner, TransactionSigner};
pub use paytable::{MachineConfig, Paytable, PaylineSet, ReelLayout, Symbol, WinRule};
pub use spin::{BetCommitment, QueuedSpin, SpinOutcome, SpinStatus, SpinTicket, WinningLine};
