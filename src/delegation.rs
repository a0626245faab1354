//! Delegation of pool capital
//!
//! This module implements:
//! - Deposits: idle pool asset delegated to the default validator
//! - Idle withdrawals: undelegated funds returned without touching stake
//! - Reward restaking: pending rewards compounded into principal
//! - Reward collection: pending rewards harvested to the pool

use crate::accountant::BalanceAccountant;
use crate::error::{Result, StrategyError};
use crate::events::StrategyEvent;
use crate::ledger::{AssetLedger, StakingLedger};
use crate::state::{Accounts, StrategyState};
use crate::types::{Address, Amount, ValidatorId};
use tracing::{debug, info};

/// Deposit, withdrawal and reward operations
pub struct DelegationManager;

impl DelegationManager {
    /// Delegate `amount` of idle asset to the default validator
    pub fn deposit<L: StakingLedger + AssetLedger>(
        state: &mut StrategyState,
        accounts: &Accounts,
        ledger: &mut L,
        asset: &Address,
        amount: Amount,
    ) -> Result<Vec<StrategyEvent>> {
        if *asset != accounts.asset {
            return Err(StrategyError::WrongAsset(*asset));
        }
        if amount == 0 {
            return Err(StrategyError::ZeroAmount);
        }

        let validator_id = state
            .registry
            .default_validator_id()
            .ok_or(StrategyError::NoDefaultValidator)?;

        let available = BalanceAccountant::idle_balance(accounts, &*ledger);
        if amount > available {
            return Err(StrategyError::InsufficientIdleBalance {
                requested: amount,
                available,
            });
        }

        ledger.delegate(&accounts.strategy, validator_id, amount)?;
        state.registry.record_delegation(validator_id);

        info!("Deposited {} and delegated to {}", amount, validator_id);

        Ok(vec![
            StrategyEvent::Deposit {
                asset: *asset,
                amount,
            },
            StrategyEvent::Delegated {
                validator_id,
                amount,
            },
        ])
    }

    /// Delegate the entire idle balance; no-op when there is none
    pub fn deposit_all<L: StakingLedger + AssetLedger>(
        state: &mut StrategyState,
        accounts: &Accounts,
        ledger: &mut L,
    ) -> Result<Vec<StrategyEvent>> {
        let idle = BalanceAccountant::idle_balance(accounts, &*ledger);
        if idle == 0 {
            debug!("deposit_all: no idle balance");
            return Ok(Vec::new());
        }
        Self::deposit(state, accounts, ledger, &accounts.asset, idle)
    }

    /// Send `amount` of idle asset to `recipient`
    pub fn withdraw<L: AssetLedger>(
        accounts: &Accounts,
        ledger: &mut L,
        recipient: &Address,
        asset: &Address,
        amount: Amount,
    ) -> Result<Vec<StrategyEvent>> {
        if recipient.is_zero() {
            return Err(StrategyError::ZeroRecipient);
        }
        if amount == 0 {
            return Err(StrategyError::ZeroAmount);
        }
        if *asset != accounts.asset {
            return Err(StrategyError::WrongAsset(*asset));
        }

        let available = BalanceAccountant::idle_balance(accounts, &*ledger);
        if amount > available {
            return Err(StrategyError::InsufficientIdleBalance {
                requested: amount,
                available,
            });
        }

        ledger.transfer(asset, &accounts.strategy, recipient, amount)?;

        info!("Withdrew {} idle to {}", amount, recipient);

        Ok(vec![StrategyEvent::Withdrawal {
            asset: *asset,
            recipient: *recipient,
            amount,
        }])
    }

    /// Sweep the entire idle balance to the pool; no-op when there is none
    pub fn withdraw_all<L: AssetLedger>(accounts: &Accounts, ledger: &mut L) -> Result<Vec<StrategyEvent>> {
        let idle = BalanceAccountant::idle_balance(accounts, &*ledger);
        if idle == 0 {
            debug!("withdraw_all: no idle balance");
            return Ok(Vec::new());
        }
        Self::withdraw(accounts, ledger, &accounts.pool, &accounts.asset, idle)
    }

    /// Compound pending rewards into principal on each validator
    ///
    /// Every id must be supported; nothing is restaked otherwise.
    pub fn restake_rewards<L: StakingLedger>(
        state: &StrategyState,
        accounts: &Accounts,
        ledger: &mut L,
        validator_ids: &[ValidatorId],
    ) -> Result<Vec<StrategyEvent>> {
        for id in validator_ids {
            state.registry.ensure_supported(*id)?;
        }

        let mut events = Vec::new();
        for id in validator_ids {
            if ledger.pending_rewards(&accounts.strategy, *id) == 0 {
                continue;
            }

            let amount = ledger.restake_rewards(&accounts.strategy, *id)?;
            info!("Restaked {} rewards on {}", amount, id);
            events.push(StrategyEvent::RewardsRestaked {
                validator_id: *id,
                amount,
            });
        }

        Ok(events)
    }

    /// Claim pending rewards on each validator and send them to the pool
    pub fn collect_rewards<L: StakingLedger + AssetLedger>(
        accounts: &Accounts,
        ledger: &mut L,
        validator_ids: &[ValidatorId],
    ) -> Result<(Amount, Vec<StrategyEvent>)> {
        let mut harvested: Amount = 0;
        for id in validator_ids {
            if ledger.pending_rewards(&accounts.strategy, *id) == 0 {
                continue;
            }
            let claimed = ledger.claim_rewards(&accounts.strategy, *id)?;
            debug!("Claimed {} rewards from {}", claimed, id);
            harvested += claimed;
        }

        if harvested == 0 {
            return Ok((0, Vec::new()));
        }

        ledger.transfer(&accounts.asset, &accounts.strategy, &accounts.pool, harvested)?;

        info!(
            "Collected {} rewards from {} validators to pool",
            harvested,
            validator_ids.len()
        );

        Ok((
            harvested,
            vec![StrategyEvent::Withdrawal {
                asset: accounts.asset,
                recipient: accounts.pool,
                amount: harvested,
            }],
        ))
    }
}
