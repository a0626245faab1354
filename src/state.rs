//! Strategy-owned state
//!
//! All mutable strategy state lives in one [`StrategyState`] value that is
//! passed by reference into each operation and can be snapshotted whole.

use crate::access::AccessControl;
use crate::config::StrategyConfig;
use crate::error::{Result, StrategyError};
use crate::registry::ValidatorRegistry;
use crate::types::{Address, Amount};
use crate::withdrawal::WithdrawalQueue;
use serde::{Deserialize, Serialize};

/// Fixed addresses the strategy operates with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accounts {
    /// Address holding idle funds and delegations
    pub strategy: Address,
    /// The single pool asset
    pub asset: Address,
    /// Vault receiving released funds
    pub pool: Address,
}

impl Accounts {
    /// Accounts named by a configuration
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            strategy: config.strategy_address,
            asset: config.asset,
            pool: config.pool,
        }
    }
}

/// Complete mutable state of the strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyState {
    /// Role principals
    pub access: AccessControl,

    /// Supported validators and default target
    pub registry: ValidatorRegistry,

    /// Unbonding tickets and the pending-withdrawals aggregate
    pub queue: WithdrawalQueue,
}

impl StrategyState {
    /// Fresh state for a configuration
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            access: config.access_control(),
            registry: ValidatorRegistry::new(&config.initial_validators, config.default_validator_id),
            queue: WithdrawalQueue::new(),
        }
    }

    /// Check the accounting invariants
    ///
    /// - pending withdrawals equal the sum of unsettled ticket amounts
    /// - every ticket id is below the next id to be assigned
    pub fn verify_consistency(&self) -> Result<()> {
        let unsettled: Amount = self
            .queue
            .open_tickets()
            .map(|ticket| ticket.requested_amount)
            .sum();

        if unsettled != self.queue.pending_withdrawals() {
            return Err(StrategyError::Inconsistent(format!(
                "pending withdrawals {} but unsettled tickets sum to {}",
                self.queue.pending_withdrawals(),
                unsettled
            )));
        }

        if let Some(last) = self.queue.last_withdraw_id() {
            if last >= self.queue.next_withdraw_id() {
                return Err(StrategyError::Inconsistent(format!(
                    "ticket {} at or beyond next withdraw id {}",
                    last,
                    self.queue.next_withdraw_id()
                )));
            }
        }

        Ok(())
    }
}
