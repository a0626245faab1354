//! Balance accounting
//!
//! The strategy's economic balance is:
//!
//! ```text
//! idle asset held by the strategy
//!   + Σ (active stake + pending rewards) over every tracked validator
//!   + pending withdrawals (unbonding, not yet released)
//! ```
//!
//! Undelegating moves value from active stake into pending withdrawals, so
//! the total is unchanged until settlement releases it. An open ticket whose
//! funds the ledger already released into idle is counted through idle only.

use crate::error::{Result, StrategyError};
use crate::ledger::{AssetLedger, StakingLedger};
use crate::state::{Accounts, StrategyState};
use crate::types::{Address, Amount, ValidatorId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Value held on one validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorBalance {
    /// Validator
    pub validator_id: ValidatorId,
    /// Active delegated stake
    pub stake: Amount,
    /// Unclaimed rewards
    pub pending_rewards: Amount,
}

impl ValidatorBalance {
    /// Stake plus rewards
    pub fn total(&self) -> Amount {
        self.stake + self.pending_rewards
    }
}

/// Components of the strategy balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBreakdown {
    /// Undelegated pool asset held by the strategy
    pub idle: Amount,
    /// Per-validator stake and rewards
    pub validators: Vec<ValidatorBalance>,
    /// Locked in unsettled tickets
    pub pending_withdrawals: Amount,
    /// Part of `pending_withdrawals` already released into idle, awaiting payout
    pub awaiting_payout: Amount,
}

impl BalanceBreakdown {
    /// Total economic balance
    pub fn total(&self) -> Amount {
        self.idle + self.delegated() + self.unbonding()
    }

    /// Pending withdrawals still locked on the ledger
    pub fn unbonding(&self) -> Amount {
        self.pending_withdrawals - self.awaiting_payout
    }

    /// Stake and rewards across validators
    pub fn delegated(&self) -> Amount {
        self.validators.iter().map(ValidatorBalance::total).sum()
    }
}

/// Read-only balance queries
pub struct BalanceAccountant;

impl BalanceAccountant {
    /// Total balance in `asset`; fails unless it is the pool asset
    pub fn check_balance<L: StakingLedger + AssetLedger>(
        state: &StrategyState,
        accounts: &Accounts,
        ledger: &L,
        asset: &Address,
    ) -> Result<Amount> {
        if *asset != accounts.asset {
            return Err(StrategyError::UnsupportedAsset(*asset));
        }

        let breakdown = Self::breakdown(state, accounts, ledger);
        let total = breakdown.total();

        debug!(
            "Balance {}: idle={} delegated={} pending_withdrawals={} awaiting_payout={}",
            total,
            breakdown.idle,
            breakdown.delegated(),
            breakdown.pending_withdrawals,
            breakdown.awaiting_payout
        );

        Ok(total)
    }

    /// Balance split into its components
    pub fn breakdown<L: StakingLedger + AssetLedger>(
        state: &StrategyState,
        accounts: &Accounts,
        ledger: &L,
    ) -> BalanceBreakdown {
        let validators = state
            .registry
            .tracked_validators()
            .into_iter()
            .map(|validator_id| ValidatorBalance {
                validator_id,
                stake: ledger.get_stake(&accounts.strategy, validator_id),
                pending_rewards: ledger.pending_rewards(&accounts.strategy, validator_id),
            })
            .collect();

        BalanceBreakdown {
            idle: Self::idle_balance(accounts, ledger),
            validators,
            pending_withdrawals: state.queue.pending_withdrawals(),
            awaiting_payout: state.queue.awaiting_payout(),
        }
    }

    /// Undelegated pool asset held by the strategy
    pub fn idle_balance<L: AssetLedger>(accounts: &Accounts, ledger: &L) -> Amount {
        ledger.balance_of(&accounts.asset, &accounts.strategy)
    }
}
