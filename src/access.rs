//! Role-based access control
//!
//! Each mutating entry point names exactly one role and checks the caller
//! against that role's principal before doing anything else.

use crate::error::{Result, StrategyError};
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Principals allowed to mutate strategy state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The vault that deposits and withdraws idle funds
    Pool,
    /// Operational role: undelegation, settlement and reward handling
    Registrar,
    /// Manages the supported validator set and the registrar
    Governor,
    /// Chooses the default delegation target
    Strategist,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Pool => write!(f, "pool"),
            Role::Registrar => write!(f, "registrar"),
            Role::Governor => write!(f, "governor"),
            Role::Strategist => write!(f, "strategist"),
        }
    }
}

/// Current principal for every role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    pool: Address,
    registrar: Address,
    governor: Address,
    strategist: Address,
}

impl AccessControl {
    /// Create access control with the given principals
    pub fn new(pool: Address, registrar: Address, governor: Address, strategist: Address) -> Self {
        Self {
            pool,
            registrar,
            governor,
            strategist,
        }
    }

    /// Principal currently holding `role`
    pub fn holder(&self, role: Role) -> Address {
        match role {
            Role::Pool => self.pool,
            Role::Registrar => self.registrar,
            Role::Governor => self.governor,
            Role::Strategist => self.strategist,
        }
    }

    /// Fail with `Unauthorized` unless `caller` holds `role`
    pub fn ensure(&self, role: Role, caller: &Address) -> Result<()> {
        if self.holder(role) != *caller {
            return Err(StrategyError::Unauthorized {
                role,
                caller: *caller,
            });
        }
        Ok(())
    }

    /// Replace the registrar principal
    pub fn set_registrar(&mut self, registrar: Address) {
        info!("Registrar changed from {} to {}", self.registrar, registrar);
        self.registrar = registrar;
    }
}
