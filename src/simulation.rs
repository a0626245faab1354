//! Deterministic in-memory chain
//!
//! `SimulatedChain` implements both [`StakingLedger`] and [`AssetLedger`]
//! over shared state so that tests and dry runs can drive epochs, time,
//! reward accrual and slashing while a strategy holds a clone of the handle.
//!
//! Slashing is expressed only through the refund ratio applied when an
//! unbonding request settles; [`StakingLedger::get_stake`] keeps reporting
//! the pre-penalty stake.

use crate::error::{Result, StrategyError};
use crate::ledger::{AssetLedger, StakingLedger, UnbondingHandle};
use crate::types::{Address, Amount, RefundRatio, ValidatorId};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default minimum unbonding duration (14 days)
pub const DEFAULT_MIN_UNBOND_DURATION: u64 = 14 * 24 * 60 * 60;

/// Default minimum sealed epochs before release
pub const DEFAULT_MIN_UNBOND_EPOCHS: u64 = 4;

/// Default reward accrual per epoch in basis points of active stake
pub const DEFAULT_REWARD_BPS_PER_EPOCH: u128 = 10;

/// Ledger time at genesis
pub const GENESIS_TIME: u64 = 1_700_000_000;

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Token staked on the chain
    pub staking_asset: Address,
    /// Minimum seconds before an unbonding request settles
    pub min_unbond_duration: u64,
    /// Minimum sealed epochs before an unbonding request settles
    pub min_unbond_epochs: u64,
    /// Rewards per epoch in basis points of active stake
    pub reward_bps_per_epoch: u128,
}

impl ChainConfig {
    /// Defaults for the given staking asset
    pub fn new(staking_asset: Address) -> Self {
        Self {
            staking_asset,
            min_unbond_duration: DEFAULT_MIN_UNBOND_DURATION,
            min_unbond_epochs: DEFAULT_MIN_UNBOND_EPOCHS,
            reward_bps_per_epoch: DEFAULT_REWARD_BPS_PER_EPOCH,
        }
    }
}

#[derive(Debug, Clone)]
struct Unbonding {
    delegator: Address,
    validator: ValidatorId,
    amount: Amount,
    epoch: u64,
    time: u64,
    settled: bool,
}

#[derive(Debug)]
struct ChainState {
    config: ChainConfig,
    epoch: u64,
    time: u64,
    validators: BTreeSet<ValidatorId>,
    balances: HashMap<(Address, Address), Amount>,
    stakes: HashMap<(Address, ValidatorId), Amount>,
    rewards: HashMap<(Address, ValidatorId), Amount>,
    unbondings: HashMap<u64, Unbonding>,
    next_handle: u64,
    slashed: HashMap<ValidatorId, RefundRatio>,
}

impl ChainState {
    fn balance(&self, asset: &Address, holder: &Address) -> Amount {
        self.balances.get(&(*asset, *holder)).copied().unwrap_or(0)
    }

    fn credit(&mut self, asset: &Address, holder: &Address, amount: Amount) {
        *self.balances.entry((*asset, *holder)).or_insert(0) += amount;
    }

    fn debit(&mut self, asset: &Address, holder: &Address, amount: Amount) -> Result<()> {
        let balance = self.balance(asset, holder);
        if balance < amount {
            return Err(StrategyError::Ledger(format!(
                "{} holds {} of {}, cannot move {}",
                holder, balance, asset, amount
            )));
        }
        self.balances.insert((*asset, *holder), balance - amount);
        Ok(())
    }
}

/// Shared handle to a simulated chain
#[derive(Debug, Clone)]
pub struct SimulatedChain {
    inner: Arc<RwLock<ChainState>>,
}

impl SimulatedChain {
    /// Create a chain with default parameters
    pub fn new(staking_asset: Address) -> Self {
        Self::with_config(ChainConfig::new(staking_asset))
    }

    /// Create a chain with explicit parameters
    pub fn with_config(config: ChainConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ChainState {
                config,
                epoch: 0,
                time: GENESIS_TIME,
                validators: BTreeSet::new(),
                balances: HashMap::new(),
                stakes: HashMap::new(),
                rewards: HashMap::new(),
                unbondings: HashMap::new(),
                next_handle: 1,
                slashed: HashMap::new(),
            })),
        }
    }

    /// Register a validator that accepts delegations
    pub fn register_validator(&self, validator: ValidatorId) {
        self.inner.write().validators.insert(validator);
    }

    /// Create `amount` of `asset` out of thin air for `holder`
    pub fn mint(&self, asset: &Address, holder: &Address, amount: Amount) {
        self.inner.write().credit(asset, holder, amount);
    }

    /// Seal one epoch, accruing rewards on every unslashed active stake
    pub fn advance_epoch(&self) {
        let mut state = self.inner.write();
        state.epoch += 1;

        let bps = state.config.reward_bps_per_epoch;
        let accruals: Vec<_> = state
            .stakes
            .iter()
            .filter(|((_, validator), stake)| **stake > 0 && !state.slashed.contains_key(validator))
            .map(|(key, stake)| (*key, *stake * bps / 10_000))
            .collect();

        for (key, reward) in accruals {
            *state.rewards.entry(key).or_insert(0) += reward;
        }

        debug!("Sealed epoch {}", state.epoch);
    }

    /// Seal `count` epochs
    pub fn advance_epochs(&self, count: u64) {
        for _ in 0..count {
            self.advance_epoch();
        }
    }

    /// Move ledger time forward
    pub fn advance_time(&self, seconds: u64) {
        let mut state = self.inner.write();
        state.time += seconds;
    }

    /// Slash `validator`, leaving `ratio` of unbonding requests refundable
    ///
    /// The penalty is realized when stake is released: active stake keeps
    /// its reported size and is released at `ratio` once unbonded. A slashed
    /// validator stops accruing rewards and refuses new delegations.
    pub fn slash(&self, validator: ValidatorId, ratio: RefundRatio) {
        warn!("Slashing {} to refund ratio {}", validator, ratio);
        self.inner.write().slashed.insert(validator, ratio);
    }

    /// Liquid balance of `holder`
    pub fn balance(&self, asset: &Address, holder: &Address) -> Amount {
        self.inner.read().balance(asset, holder)
    }

    /// Amount locked in unsettled unbonding requests of `delegator`
    pub fn unbonding_total(&self, delegator: &Address) -> Amount {
        self.inner
            .read()
            .unbondings
            .values()
            .filter(|u| !u.settled && u.delegator == *delegator)
            .map(|u| u.amount)
            .sum()
    }
}

impl StakingLedger for SimulatedChain {
    fn delegate(&mut self, delegator: &Address, validator: ValidatorId, amount: Amount) -> Result<()> {
        let mut state = self.inner.write();

        if !state.validators.contains(&validator) {
            return Err(StrategyError::Ledger(format!("{} does not exist", validator)));
        }
        if state.slashed.contains_key(&validator) {
            return Err(StrategyError::Ledger(format!("{} is slashed", validator)));
        }

        let asset = state.config.staking_asset;
        state.debit(&asset, delegator, amount)?;
        *state.stakes.entry((*delegator, validator)).or_insert(0) += amount;

        info!("{} delegated {} to {}", delegator, amount, validator);
        Ok(())
    }

    fn get_stake(&self, delegator: &Address, validator: ValidatorId) -> Amount {
        self.inner
            .read()
            .stakes
            .get(&(*delegator, validator))
            .copied()
            .unwrap_or(0)
    }

    fn pending_rewards(&self, delegator: &Address, validator: ValidatorId) -> Amount {
        self.inner
            .read()
            .rewards
            .get(&(*delegator, validator))
            .copied()
            .unwrap_or(0)
    }

    fn begin_unbonding(
        &mut self,
        delegator: &Address,
        validator: ValidatorId,
        amount: Amount,
    ) -> Result<UnbondingHandle> {
        let mut state = self.inner.write();

        let stake = state.stakes.get(&(*delegator, validator)).copied().unwrap_or(0);
        if amount == 0 || amount > stake {
            return Err(StrategyError::Ledger(format!(
                "cannot unbond {} from {}, stake is {}",
                amount, validator, stake
            )));
        }

        state.stakes.insert((*delegator, validator), stake - amount);

        let handle = state.next_handle;
        state.next_handle += 1;
        let (epoch, time) = (state.epoch, state.time);
        state.unbondings.insert(
            handle,
            Unbonding {
                delegator: *delegator,
                validator,
                amount,
                epoch,
                time,
                settled: false,
            },
        );

        Ok(UnbondingHandle(handle))
    }

    fn settle_unbonding(&mut self, delegator: &Address, handle: UnbondingHandle) -> Result<Amount> {
        let mut state = self.inner.write();
        let (epoch, time) = (state.epoch, state.time);
        let (min_epochs, min_duration) = (state.config.min_unbond_epochs, state.config.min_unbond_duration);

        let request = state
            .unbondings
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| StrategyError::Ledger(format!("unknown unbonding request {}", handle.0)))?;

        if request.delegator != *delegator {
            return Err(StrategyError::Ledger(format!(
                "unbonding request {} belongs to {}",
                handle.0, request.delegator
            )));
        }
        if request.settled {
            return Err(StrategyError::Ledger(format!("unbonding request {} already released", handle.0)));
        }
        if time < request.time + min_duration || epoch < request.epoch + min_epochs {
            return Err(StrategyError::Ledger(format!("unbonding request {} not matured", handle.0)));
        }

        let ratio = state
            .slashed
            .get(&request.validator)
            .copied()
            .unwrap_or(RefundRatio::ONE);
        if ratio.is_zero() {
            return Err(StrategyError::Ledger(format!(
                "{} fully slashed, nothing to release",
                request.validator
            )));
        }

        let released = ratio.apply(request.amount);
        let asset = state.config.staking_asset;
        state.credit(&asset, delegator, released);
        if let Some(entry) = state.unbondings.get_mut(&handle.0) {
            entry.settled = true;
        }

        Ok(released)
    }

    fn restake_rewards(&mut self, delegator: &Address, validator: ValidatorId) -> Result<Amount> {
        let mut state = self.inner.write();
        let rewards = state.rewards.remove(&(*delegator, validator)).unwrap_or(0);
        *state.stakes.entry((*delegator, validator)).or_insert(0) += rewards;
        Ok(rewards)
    }

    fn claim_rewards(&mut self, delegator: &Address, validator: ValidatorId) -> Result<Amount> {
        let mut state = self.inner.write();
        let rewards = state.rewards.remove(&(*delegator, validator)).unwrap_or(0);
        let asset = state.config.staking_asset;
        state.credit(&asset, delegator, rewards);
        Ok(rewards)
    }

    fn is_slashed(&self, validator: ValidatorId) -> bool {
        self.inner.read().slashed.contains_key(&validator)
    }

    fn slashing_refund_ratio(&self, validator: ValidatorId) -> RefundRatio {
        self.inner
            .read()
            .slashed
            .get(&validator)
            .copied()
            .unwrap_or(RefundRatio::ONE)
    }

    fn current_epoch(&self) -> u64 {
        self.inner.read().epoch
    }

    fn current_time(&self) -> u64 {
        self.inner.read().time
    }

    fn min_unbond_epochs(&self) -> u64 {
        self.inner.read().config.min_unbond_epochs
    }

    fn min_unbond_duration(&self) -> u64 {
        self.inner.read().config.min_unbond_duration
    }
}

impl AssetLedger for SimulatedChain {
    fn balance_of(&self, asset: &Address, holder: &Address) -> Amount {
        self.balance(asset, holder)
    }

    fn transfer(&mut self, asset: &Address, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        let mut state = self.inner.write();
        state.debit(asset, from, amount)?;
        state.credit(asset, to, amount);
        Ok(())
    }
}
