// crates/cadence-consensus/src/config.rs
//
// Engine parameters and genesis configuration.
// Loaded from a TOML file or populated with sensible defaults.

use serde::{Deserialize, Serialize};
use std::fs;

use cadence_core::error::CadenceError;
use cadence_core::types::{Authority, AuthorityId, EpochConfiguration};

/// Static engine parameters, fixed for the lifetime of the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineParams {
    /// The amount of time, in slots, that each epoch should last.
    /// Changing this after the chain has started will brick block production.
    #[serde(default = "default_epoch_duration")]
    pub epoch_duration: u64,

    /// Minimum wall-clock period between blocks, in milliseconds. The slot
    /// duration is twice this, so an author can always propose within the
    /// majority of its slot.
    #[serde(default = "default_minimum_period_ms")]
    pub minimum_period_ms: u64,

    /// Soft cap on the authority-set size. Larger sets are carried through
    /// unchanged but logged, since they indicate a misconfigured host.
    #[serde(default = "default_max_authorities")]
    pub max_authorities: u32,
}

fn default_epoch_duration() -> u64 {
    200
}

fn default_minimum_period_ms() -> u64 {
    3000
}

fn default_max_authorities() -> u32 {
    100
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            epoch_duration: default_epoch_duration(),
            minimum_period_ms: default_minimum_period_ms(),
            max_authorities: default_max_authorities(),
        }
    }
}

impl EngineParams {
    /// Load parameters from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let params: EngineParams = toml::from_str(&contents)?;
        Ok(params)
    }

    /// Reject parameter sets the epoch arithmetic cannot run on.
    pub fn validate(&self) -> Result<(), CadenceError> {
        if self.epoch_duration == 0 {
            return Err(CadenceError::InvalidConfiguration(
                "epoch duration must be at least one slot".into(),
            ));
        }
        if self.minimum_period_ms == 0 {
            return Err(CadenceError::InvalidConfiguration(
                "minimum block period must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// One genesis authority as written in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAuthority {
    /// Hex-encoded sr25519 public key, with or without `0x` prefix.
    pub public_key: String,

    /// Informational voting weight.
    #[serde(default = "default_weight")]
    pub weight: u64,
}

fn default_weight() -> u64 {
    1
}

/// Genesis state for the engine: the initial authority set and the epoch
/// configuration in force until governance changes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Genesis authorities. May be empty when a session collaborator seeds
    /// the set through `initialize_authorities` instead.
    #[serde(default)]
    pub authorities: Vec<GenesisAuthority>,

    /// Leader-election parameters for epoch 0 and onwards.
    pub epoch_config: EpochConfiguration,
}

impl GenesisConfig {
    /// Load genesis configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: GenesisConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Decode the hex authority keys into the engine's authority type.
    pub fn parsed_authorities(&self) -> Result<Vec<Authority>, CadenceError> {
        self.authorities
            .iter()
            .map(|authority| {
                let id = AuthorityId::from_hex(&authority.public_key)?;
                Ok((id, authority.weight))
            })
            .collect()
    }
}
