//! The ledger seam: everything the engine needs from the chain, behind
//! injected capabilities.
//!
//! Exact transaction encoding and signing are out of scope; adapters build
//! plain transaction descriptions and hand them to a `LedgerClient`
//! implementation together with a `TransactionSigner` (wallet address plus
//! an async sign function).

use crate::errors::SpinResult;
use async_trait::async_trait;
use std::collections::HashMap;

/// Chain-level parameters read per submission, never hardcoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParams {
    /// Flat protocol fee per transaction group, in smallest units.
    pub min_fee: u64,
    /// Last round the ledger has sealed.
    pub last_round: u64,
    pub genesis_id: String,
}

/// A payment leg of a transaction group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSpec {
    pub sender: String,
    pub receiver: String,
    pub amount: u64,
}

/// An application-call leg of a transaction group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppCallSpec {
    pub sender: String,
    pub app_id: u64,
    pub method: String,
    pub args: Vec<Vec<u8>>,
}

/// One transaction inside an atomic group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionSpec {
    Payment(PaymentSpec),
    AppCall(AppCallSpec),
}

/// Result of a confirmed group: id, inclusion round and the application
/// call's typed return value and log entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedGroup {
    pub tx_id: String,
    pub confirmed_round: u64,
    pub return_value: Option<Vec<u8>>,
    pub logs: Vec<Vec<u8>>,
}

/// A value in the application's global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateValue {
    Uint(u64),
    Bytes(Vec<u8>),
}

impl StateValue {
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            StateValue::Uint(v) => Some(*v),
            StateValue::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            StateValue::Bytes(b) => Some(b),
            StateValue::Uint(_) => None,
        }
    }
}

/// Wallet capability: an address and an async sign function. Key handling
/// lives with the implementor.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> &str;

    async fn sign(&self, payload: &[u8]) -> SpinResult<Vec<u8>>;
}

/// Ledger/network capability consumed by the adapters.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current fee and round parameters.
    async fn suggested_params(&self) -> SpinResult<ChainParams>;

    /// Submit an atomic group signed by `signer`; resolves once confirmed.
    async fn submit_group(
        &self,
        group: &[TransactionSpec],
        signer: &dyn TransactionSigner,
    ) -> SpinResult<ConfirmedGroup>;

    async fn account_balance(&self, address: &str) -> SpinResult<u64>;

    async fn current_round(&self) -> SpinResult<u64>;

    /// 32-byte seed derived from the header of `round`'s block.
    async fn block_seed(&self, round: u64) -> SpinResult<[u8; 32]>;

    /// Global state of an application, for configuration resolution.
    async fn app_global_state(&self, app_id: u64) -> SpinResult<HashMap<String, StateValue>>;
}

/// Escrow account address of an application. The concrete derivation is a
/// ledger detail; this placeholder keys the simulated ledger and is replaced
/// by the chain SDK's derivation in live integrations.
pub fn app_escrow_address(app_id: u64) -> String {
    format!("APPESCROW{:016X}", app_id)
}

/// Signer for in-process use (simulated adapter, demo binary): carries an
/// address and "signs" by echoing the payload.
pub struct StaticSigner {
    address: String,
}

impl StaticSigner {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl TransactionSigner for StaticSigner {
    fn address(&self) -> &str {
        &self.address
    }

    async fn sign(&self, payload: &[u8]) -> SpinResult<Vec<u8>> {
        Ok(payload.to_vec())
    }
}
