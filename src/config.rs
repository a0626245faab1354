//! Strategy configuration
//!
//! Loaded from TOML. Addresses are `0x`-prefixed hex strings:
//!
//! ```toml
//! strategy_address = "0x1111111111111111111111111111111111111111"
//! asset = "0x2222222222222222222222222222222222222222"
//! pool = "0x3333333333333333333333333333333333333333"
//! governor = "0x4444444444444444444444444444444444444444"
//! strategist = "0x5555555555555555555555555555555555555555"
//! registrar = "0x6666666666666666666666666666666666666666"
//! default_validator_id = 15
//! initial_validators = [15, 16, 17]
//! ```

use crate::access::AccessControl;
use crate::error::{Result, StrategyError};
use crate::types::{Address, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Strategy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Address the strategy holds funds and delegations under
    pub strategy_address: Address,

    /// The single pool asset the strategy accepts
    pub asset: Address,

    /// Vault allowed to deposit and withdraw
    pub pool: Address,

    /// Governing authority (validator set, registrar)
    pub governor: Address,

    /// Strategist (default validator)
    pub strategist: Address,

    /// Registrar (undelegate, settle, rewards)
    pub registrar: Address,

    /// Validator that receives new deposits
    #[serde(default)]
    pub default_validator_id: Option<ValidatorId>,

    /// Validators supported from the start
    #[serde(default)]
    pub initial_validators: Vec<ValidatorId>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            strategy_address: Address::repeat_byte(0x11),
            asset: Address::repeat_byte(0x22),
            pool: Address::repeat_byte(0x33),
            governor: Address::repeat_byte(0x44),
            strategist: Address::repeat_byte(0x55),
            registrar: Address::repeat_byte(0x66),
            default_validator_id: None,
            initial_validators: Vec::new(),
        }
    }
}

impl StrategyConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: StrategyConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded strategy configuration from {}", path.display());
        Ok(config)
    }

    /// Reject zero addresses and duplicate validators
    pub fn validate(&self) -> Result<()> {
        let principals = [
            ("strategy_address", self.strategy_address),
            ("asset", self.asset),
            ("pool", self.pool),
            ("governor", self.governor),
            ("strategist", self.strategist),
            ("registrar", self.registrar),
        ];

        for (name, address) in principals {
            if address.is_zero() {
                return Err(StrategyError::InvalidConfig(format!(
                    "{} must not be the zero address",
                    name
                )));
            }
        }

        let mut seen = HashSet::new();
        for id in &self.initial_validators {
            if !seen.insert(*id) {
                return Err(StrategyError::InvalidConfig(format!(
                    "{} listed twice in initial_validators",
                    id
                )));
            }
        }

        Ok(())
    }

    /// Role principals as access control
    pub fn access_control(&self) -> AccessControl {
        AccessControl::new(self.pool, self.registrar, self.governor, self.strategist)
    }
}
