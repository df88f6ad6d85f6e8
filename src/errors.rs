//! Error types for the spin engine
//!
//! One crate-wide taxonomy. Pre-flight and submission errors surface to the
//! caller; claim-time errors are absorbed by the adapter's local-fallback
//! path and downgraded to an unverified outcome.

use thiserror::Error;

/// Root error type for all spin-engine operations
#[derive(Debug, Error)]
pub enum SpinError {
    /// Adapter was asked to serve a spin before its contract configuration
    /// resolved. Fatal for the adapter instance; the caller must re-init.
    #[error("Adapter not initialized: {0}")]
    NotInitialized(String),

    /// Pre-submission balance check failed. Recoverable; the player adjusts
    /// the stake.
    #[error("Insufficient balance: {available} available, {required} required")]
    InsufficientBalance { available: u64, required: u64 },

    /// The ledger rejected the submission group. Terminal for that spin; a
    /// paid stake is never silently retried.
    #[error("Transaction submission failed: {0}")]
    TransactionFailed(String),

    /// The contract rejected a call at the application level.
    #[error("Contract error: {0}")]
    ContractError(String),

    /// Transient transport-level failure. Retried for read-only polling,
    /// never for financial submission.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out after {waited_ms}ms waiting for {waiting_for}")]
    Timeout { waiting_for: String, waited_ms: u64 },

    #[error("Invalid configuration for {field}: '{value}' ({reason})")]
    Configuration {
        field: String,
        value: String,
        reason: String,
    },

    /// Stake or line selection outside the machine's bounds. Caught before
    /// any ledger traffic.
    #[error("Invalid wager: {0}")]
    InvalidWager(String),

    #[error("Unknown spin: {0}")]
    UnknownSpin(uuid::Uuid),
}

impl SpinError {
    /// Whether a read-only operation hitting this error may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, SpinError::Network(_) | SpinError::Timeout { .. })
    }
}

/// Convenience type alias for Results
pub type SpinResult<T> = Result<T, SpinError>;
