//! Adapter construction.
//!
//! The factory is plain data owned by the caller's composition root and
//! passed by reference — no module-level singletons. It routes on the
//! machine-type discriminator in the settings, never on runtime type
//! inspection.

use crate::adapter::{LiveFiveReelAdapter, LiveWaysAdapter, SimulatedAdapter, SlotAdapter};
use crate::config::{EngineSettings, MachineType};
use crate::errors::{SpinError, SpinResult};
use crate::ledger::{LedgerClient, TransactionSigner};
use crate::paytable::MachineConfig;
use std::sync::Arc;

/// Builds the adapter variant the settings select.
pub struct AdapterFactory {
    settings: EngineSettings,
}

impl AdapterFactory {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Construct a live adapter over an injected ledger client and signer.
    pub fn create(
        &self,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransactionSigner>,
    ) -> SpinResult<Arc<dyn SlotAdapter>> {
        match self.settings.machine {
            MachineType::FiveReel => Ok(Arc::new(LiveFiveReelAdapter::new(
                &self.settings,
                ledger,
                signer,
            ))),
            MachineType::WaysToWin => Ok(Arc::new(LiveWaysAdapter::new(
                &self.settings,
                ledger,
                signer,
            ))),
            MachineType::Simulated => Err(SpinError::Configuration {
                field: "machine".to_string(),
                value: MachineType::Simulated.to_string(),
                reason: "Simulated machines carry their own ledger; use create_simulated"
                    .to_string(),
            }),
        }
    }

    /// Construct the simulated variant with its in-memory ledger. The
    /// machine shape follows the discriminator: ways settings get a ways
    /// machine, everything else the five-reel reference machine.
    pub fn create_simulated(&self) -> Arc<SimulatedAdapter> {
        let config = match self.settings.machine {
            MachineType::WaysToWin => MachineConfig::ways_default(),
            _ => MachineConfig::five_reel_default(),
        };
        Arc::new(SimulatedAdapter::new(config, &self.settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::simulated::SIM_PLAYER;
    use crate::adapter::InMemoryLedger;
    use crate::config::SettingsBuilder;
    use crate::ledger::StaticSigner;

    fn live_parts() -> (Arc<dyn LedgerClient>, Arc<dyn TransactionSigner>) {
        // An in-memory ledger stands in for the live client in tests.
        (
            Arc::new(InMemoryLedger::new(MachineConfig::five_reel_default())),
            Arc::new(StaticSigner::new(SIM_PLAYER)),
        )
    }

    #[test]
    fn test_routes_five_reel() {
        let factory = AdapterFactory::new(
            SettingsBuilder::new()
                .machine(MachineType::FiveReel)
                .app_id(1)
                .build(),
        );
        let (ledger, signer) = live_parts();
        let adapter = factory.create(ledger, signer).unwrap();
        assert_eq!(adapter.wallet_address(), SIM_PLAYER);
    }

    #[test]
    fn test_routes_ways() {
        let factory = AdapterFactory::new(
            SettingsBuilder::new()
                .machine(MachineType::WaysToWin)
                .app_id(1)
                .build(),
        );
        let (ledger, signer) = live_parts();
        assert!(factory.create(ledger, signer).is_ok());
    }

    #[test]
    fn test_simulated_requires_dedicated_constructor() {
        let factory = AdapterFactory::new(EngineSettings::default());
        let (ledger, signer) = live_parts();
        assert!(factory.create(ledger, signer).is_err());

        let adapter = factory.create_simulated();
        assert_eq!(adapter.wallet_address(), SIM_PLAYER);
    }

    #[tokio::test]
    async fn test_simulated_ways_machine_shape() {
        let factory = AdapterFactory::new(
            SettingsBuilder::new().machine(MachineType::WaysToWin).build(),
        );
        let adapter = factory.create_simulated();
        adapter.initialize().await.unwrap();
        let config = adapter.machine_config().unwrap();
        assert_eq!(config.win_rule, crate::paytable::WinRule::Ways);
        assert!(config.paylines.is_empty());
    }
}
