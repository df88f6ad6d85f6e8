//! Engine settings: machine selection, contract identity, network endpoint
//! and queue policy.
//!
//! Settings load from a TOML file with environment-variable overrides and
//! are validated before use. The adapter factory consumes the machine-type
//! discriminator; the engine consumes the queue policy.

use crate::errors::{SpinError, SpinResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Which adapter variant the factory constructs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MachineType {
    /// In-memory machine, no network. For tests and demos.
    Simulated,
    /// Live fixed-payline five-reel machine.
    FiveReel,
    /// Live ways-to-win machine.
    WaysToWin,
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineType::Simulated => write!(f, "simulated"),
            MachineType::FiveReel => write!(f, "fivereel"),
            MachineType::WaysToWin => write!(f, "waystowin"),
        }
    }
}

impl FromStr for MachineType {
    type Err = SpinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulated" => Ok(MachineType::Simulated),
            "fivereel" => Ok(MachineType::FiveReel),
            "waystowin" => Ok(MachineType::WaysToWin),
            other => Err(SpinError::Configuration {
                field: "machine".to_string(),
                value: other.to_string(),
                reason: "Expected simulated, fivereel or waystowin".to_string(),
            }),
        }
    }
}

/// Ledger endpoint selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkSettings {
    pub endpoint: String,
    /// API token for the node, empty when the endpoint is open.
    pub api_token: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4001".to_string(),
            api_token: String::new(),
        }
    }
}

/// Queue and polling policy for the spin engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueSettings {
    /// Delay between round-height polls.
    pub poll_interval_ms: u64,
    /// Poll attempts before a spin expires.
    pub max_poll_attempts: u32,
    /// Rounds past the claim round before a waiting spin expires.
    pub claim_window_rounds: u64,
    /// Budget for one claim attempt before falling back locally.
    pub claim_timeout_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            max_poll_attempts: 60,
            claim_window_rounds: 1_000,
            claim_timeout_ms: 15_000,
        }
    }
}

/// Complete engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineSettings {
    pub machine: MachineType,
    /// On-chain application id of the slot contract. Unused when simulated.
    pub app_id: u64,
    pub network: NetworkSettings,
    pub queue: QueueSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            machine: MachineType::Simulated,
            app_id: 0,
            network: NetworkSettings::default(),
            queue: QueueSettings::default(),
        }
    }
}

/// Settings loader with file and environment variable support.
pub struct SettingsLoader {
    config_path: Option<String>,
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load settings from file and environment variables.
    pub fn load(&self) -> SpinResult<EngineSettings> {
        let mut settings = if let Some(ref path) = self.config_path {
            self.load_from_file(path)?
        } else {
            EngineSettings::default()
        };

        self.apply_env_overrides(&mut settings)?;
        self.validate(&settings)?;
        Ok(settings)
    }

    fn load_from_file(&self, path: &str) -> SpinResult<EngineSettings> {
        let content = std::fs::read_to_string(path).map_err(|e| SpinError::Configuration {
            field: "config_path".to_string(),
            value: path.to_string(),
            reason: format!("Failed to read: {}", e),
        })?;

        toml::from_str(&content).map_err(|e| SpinError::Configuration {
            field: "config_path".to_string(),
            value: path.to_string(),
            reason: format!("Failed to parse TOML: {}", e),
        })
    }

    fn apply_env_overrides(&self, settings: &mut EngineSettings) -> SpinResult<()> {
        if let Ok(machine) = env::var("REELSPIN_MACHINE") {
            settings.machine = machine.parse()?;
        }
        if let Ok(app_id) = env::var("REELSPIN_APP_ID") {
            settings.app_id = app_id.parse().map_err(|_| SpinError::Configuration {
                field: "REELSPIN_APP_ID".to_string(),
                value: app_id,
                reason: "Invalid application id".to_string(),
            })?;
        }
        if let Ok(endpoint) = env::var("REELSPIN_ENDPOINT") {
            settings.network.endpoint = endpoint;
        }
        if let Ok(token) = env::var("REELSPIN_API_TOKEN") {
            settings.network.api_token = token;
        }
        if let Ok(interval) = env::var("REELSPIN_POLL_INTERVAL_MS") {
            settings.queue.poll_interval_ms =
                interval.parse().map_err(|_| SpinError::Configuration {
                    field: "REELSPIN_POLL_INTERVAL_MS".to_string(),
                    value: interval,
                    reason: "Invalid interval".to_string(),
                })?;
        }
        if let Ok(window) = env::var("REELSPIN_CLAIM_WINDOW_ROUNDS") {
            settings.queue.claim_window_rounds =
                window.parse().map_err(|_| SpinError::Configuration {
                    field: "REELSPIN_CLAIM_WINDOW_ROUNDS".to_string(),
                    value: window,
                    reason: "Invalid round count".to_string(),
                })?;
        }
        Ok(())
    }

    fn validate(&self, settings: &EngineSettings) -> SpinResult<()> {
        if settings.machine != MachineType::Simulated {
            if settings.app_id == 0 {
                return Err(SpinError::Configuration {
                    field: "app_id".to_string(),
                    value: "0".to_string(),
                    reason: "Live machines need a contract application id".to_string(),
                });
            }
            if settings.network.endpoint.is_empty() {
                return Err(SpinError::Configuration {
                    field: "network.endpoint".to_string(),
                    value: String::new(),
                    reason: "Live machines need a ledger endpoint".to_string(),
                });
            }
        }
        if settings.queue.poll_interval_ms == 0 {
            return Err(SpinError::Configuration {
                field: "queue.poll_interval_ms".to_string(),
                value: "0".to_string(),
                reason: "Polling interval cannot be zero".to_string(),
            });
        }
        if settings.queue.max_poll_attempts == 0 {
            return Err(SpinError::Configuration {
                field: "queue.max_poll_attempts".to_string(),
                value: "0".to_string(),
                reason: "At least one poll attempt is required".to_string(),
            });
        }
        if settings.queue.claim_window_rounds == 0 {
            return Err(SpinError::Configuration {
                field: "queue.claim_window_rounds".to_string(),
                value: "0".to_string(),
                reason: "Claim window cannot be zero".to_string(),
            });
        }
        Ok(())
    }

    /// Save settings to a TOML file.
    pub fn save(&self, settings: &EngineSettings, path: &str) -> SpinResult<()> {
        let toml_string = toml::to_string_pretty(settings).map_err(|e| SpinError::Configuration {
            field: "settings".to_string(),
            value: path.to_string(),
            reason: format!("Failed to serialize: {}", e),
        })?;

        std::fs::write(path, toml_string).map_err(|e| SpinError::Configuration {
            field: "config_path".to_string(),
            value: path.to_string(),
            reason: format!("Failed to write: {}", e),
        })
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder pattern for assembling settings in code.
pub struct SettingsBuilder {
    settings: EngineSettings,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            settings: EngineSettings::default(),
        }
    }

    pub fn machine(mut self, machine: MachineType) -> Self {
        self.settings.machine = machine;
        self
    }

    pub fn app_id(mut self, app_id: u64) -> Self {
        self.settings.app_id = app_id;
        self
    }

    pub fn network(mut self, network: NetworkSettings) -> Self {
        self.settings.network = network;
        self
    }

    pub fn queue(mut self, queue: QueueSettings) -> Self {
        self.settings.queue = queue;
        self
    }

    pub fn build(self) -> EngineSettings {
        self.settings
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
