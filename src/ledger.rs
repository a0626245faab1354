//! External ledger interfaces
//!
//! The strategy never owns consensus-layer state. It talks to two
//! collaborators:
//! - [`StakingLedger`]: delegation, unbonding, rewards, slashing and clocks
//! - [`AssetLedger`]: balances and transfers of the pool asset
//!
//! Both are injected so the state machine runs unchanged against a live
//! adapter or the deterministic [`crate::simulation::SimulatedChain`].

use crate::error::Result;
use crate::types::{Address, Amount, RefundRatio, ValidatorId};
use serde::{Deserialize, Serialize};

/// Opaque handle returned by the ledger for an unbonding request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnbondingHandle(pub u64);

/// Consensus-layer staking facility
pub trait StakingLedger {
    /// Delegate `amount` of the delegator's liquid funds to `validator`
    fn delegate(&mut self, delegator: &Address, validator: ValidatorId, amount: Amount) -> Result<()>;

    /// Active stake of `delegator` on `validator`, excluding unbonding amounts
    fn get_stake(&self, delegator: &Address, validator: ValidatorId) -> Amount;

    /// Rewards accrued but not yet claimed or restaked
    fn pending_rewards(&self, delegator: &Address, validator: ValidatorId) -> Amount;

    /// Start unbonding `amount`; the funds stay locked until settled
    fn begin_unbonding(
        &mut self,
        delegator: &Address,
        validator: ValidatorId,
        amount: Amount,
    ) -> Result<UnbondingHandle>;

    /// Release a matured unbonding request to the delegator's liquid balance
    fn settle_unbonding(&mut self, delegator: &Address, handle: UnbondingHandle) -> Result<Amount>;

    /// Compound pending rewards into principal, returning the amount compounded
    fn restake_rewards(&mut self, delegator: &Address, validator: ValidatorId) -> Result<Amount>;

    /// Pay pending rewards to the delegator's liquid balance
    fn claim_rewards(&mut self, delegator: &Address, validator: ValidatorId) -> Result<Amount>;

    /// Whether `validator` has been slashed
    fn is_slashed(&self, validator: ValidatorId) -> bool;

    /// Refund ratio applied to unbonding requests on `validator`
    fn slashing_refund_ratio(&self, validator: ValidatorId) -> RefundRatio;

    /// Latest sealed epoch
    fn current_epoch(&self) -> u64;

    /// Ledger time in seconds
    fn current_time(&self) -> u64;

    /// Sealed epochs an unbonding request must wait
    fn min_unbond_epochs(&self) -> u64;

    /// Seconds an unbonding request must wait
    fn min_unbond_duration(&self) -> u64;
}

/// Token ledger for the pool asset
pub trait AssetLedger {
    /// Balance of `holder` in `asset`
    fn balance_of(&self, asset: &Address, holder: &Address) -> Amount;

    /// Move `amount` of `asset` from `from` to `to`
    fn transfer(&mut self, asset: &Address, from: &Address, to: &Address, amount: Amount) -> Result<()>;
}
