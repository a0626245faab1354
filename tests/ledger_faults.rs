//! Settlement against a misbehaving ledger
//!
//! Wraps the simulated chain so payouts to the pool can be refused and
//! unbonding releases can come back short of what the refund ratio implies.

use silver_staking_strategy::{
    Address, Amount, AssetLedger, RefundRatio, Result, SimulatedChain, StakingLedger, StrategyConfig, StrategyError,
    StrategyEvent, UnbondingHandle, ValidatorId, ValidatorStakingStrategy,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const V: ValidatorId = ValidatorId(3);
const SINK: Address = Address::repeat_byte(0xee);

#[derive(Debug, Clone)]
struct FaultyLedger {
    chain: SimulatedChain,
    asset: Address,
    pool: Address,
    pool_paused: Arc<AtomicBool>,
    release_shortfall: Amount,
}

impl FaultyLedger {
    fn new(config: &StrategyConfig) -> Self {
        let chain = SimulatedChain::new(config.asset);
        chain.register_validator(V);
        Self {
            chain,
            asset: config.asset,
            pool: config.pool,
            pool_paused: Arc::new(AtomicBool::new(false)),
            release_shortfall: 0,
        }
    }

    fn pause_pool(&self, paused: bool) {
        self.pool_paused.store(paused, Ordering::SeqCst);
    }

    fn mature(&self) {
        self.chain.advance_time(self.chain.min_unbond_duration());
        self.chain.advance_epochs(self.chain.min_unbond_epochs());
    }
}

impl StakingLedger for FaultyLedger {
    fn delegate(&mut self, delegator: &Address, validator: ValidatorId, amount: Amount) -> Result<()> {
        self.chain.delegate(delegator, validator, amount)
    }

    fn get_stake(&self, delegator: &Address, validator: ValidatorId) -> Amount {
        self.chain.get_stake(delegator, validator)
    }

    fn pending_rewards(&self, delegator: &Address, validator: ValidatorId) -> Amount {
        self.chain.pending_rewards(delegator, validator)
    }

    fn begin_unbonding(&mut self, delegator: &Address, validator: ValidatorId, amount: Amount) -> Result<UnbondingHandle> {
        self.chain.begin_unbonding(delegator, validator, amount)
    }

    fn settle_unbonding(&mut self, delegator: &Address, handle: UnbondingHandle) -> Result<Amount> {
        let released = self.chain.settle_unbonding(delegator, handle)?;
        if self.release_shortfall > 0 {
            let asset = self.asset;
            self.chain.transfer(&asset, delegator, &SINK, self.release_shortfall)?;
        }
        Ok(released - self.release_shortfall)
    }

    fn restake_rewards(&mut self, delegator: &Address, validator: ValidatorId) -> Result<Amount> {
        self.chain.restake_rewards(delegator, validator)
    }

    fn claim_rewards(&mut self, delegator: &Address, validator: ValidatorId) -> Result<Amount> {
        self.chain.claim_rewards(delegator, validator)
    }

    fn is_slashed(&self, validator: ValidatorId) -> bool {
        self.chain.is_slashed(validator)
    }

    fn slashing_refund_ratio(&self, validator: ValidatorId) -> RefundRatio {
        self.chain.slashing_refund_ratio(validator)
    }

    fn current_epoch(&self) -> u64 {
        self.chain.current_epoch()
    }

    fn current_time(&self) -> u64 {
        self.chain.current_time()
    }

    fn min_unbond_epochs(&self) -> u64 {
        self.chain.min_unbond_epochs()
    }

    fn min_unbond_duration(&self) -> u64 {
        self.chain.min_unbond_duration()
    }
}

impl AssetLedger for FaultyLedger {
    fn balance_of(&self, asset: &Address, holder: &Address) -> Amount {
        self.chain.balance_of(asset, holder)
    }

    fn transfer(&mut self, asset: &Address, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        if *to == self.pool && self.pool_paused.load(Ordering::SeqCst) {
            return Err(StrategyError::Ledger("pool paused".to_string()));
        }
        self.chain.transfer(asset, from, to, amount)
    }
}

fn config() -> StrategyConfig {
    StrategyConfig {
        default_validator_id: Some(V),
        initial_validators: vec![V],
        ..StrategyConfig::default()
    }
}

fn withdrawn_events(strategy: &ValidatorStakingStrategy<FaultyLedger>) -> usize {
    strategy
        .events()
        .events()
        .filter(|event| matches!(event, StrategyEvent::Withdrawn { .. }))
        .count()
}

#[test]
fn test_failed_payout_keeps_release_and_retries_transfer_only() {
    let config = config();
    let ledger = FaultyLedger::new(&config);
    ledger.chain.mint(&config.asset, &config.strategy_address, 1_000);

    let mut strategy = ValidatorStakingStrategy::new(&config, ledger.clone()).unwrap();
    strategy.deposit(&config.pool, &config.asset, 1_000).unwrap();
    let id = strategy.undelegate(&config.registrar, V, 1_000).unwrap();
    ledger.mature();

    ledger.pause_pool(true);
    assert!(matches!(
        strategy.settle(&config.registrar, id),
        Err(StrategyError::Ledger(_))
    ));

    // Released funds sit idle and are counted once
    let ticket = strategy.withdrawal(id).unwrap();
    assert!(!ticket.settled);
    assert_eq!(ticket.released_amount, Some(1_000));
    assert_eq!(strategy.pending_withdrawals(), 1_000);
    assert_eq!(strategy.check_balance(&config.asset).unwrap(), 1_000);
    assert_eq!(ledger.chain.balance_of(&config.asset, &config.pool), 0);
    assert_eq!(withdrawn_events(&strategy), 0);
    strategy.state().verify_consistency().unwrap();

    // The recorded release survives a restart
    let mut strategy = ValidatorStakingStrategy::restore(&config, strategy.state().clone(), ledger.clone()).unwrap();

    ledger.pause_pool(false);
    assert_eq!(strategy.settle(&config.registrar, id).unwrap(), 1_000);

    let ticket = strategy.withdrawal(id).unwrap();
    assert!(ticket.settled);
    assert_eq!(ticket.withdrawn_amount, Some(1_000));
    assert_eq!(strategy.pending_withdrawals(), 0);
    assert_eq!(strategy.check_balance(&config.asset).unwrap(), 0);
    assert_eq!(ledger.chain.balance_of(&config.asset, &config.pool), 1_000);
    assert_eq!(withdrawn_events(&strategy), 1);

    assert!(matches!(
        strategy.settle(&config.registrar, id),
        Err(StrategyError::AlreadyWithdrawn(_))
    ));
    assert_eq!(ledger.chain.balance_of(&config.asset, &config.pool), 1_000);
}

#[test]
fn test_short_release_caps_payout() {
    let config = config();
    let mut ledger = FaultyLedger::new(&config);
    ledger.release_shortfall = 250;
    ledger.chain.mint(&config.asset, &config.strategy_address, 15_000);

    let mut strategy = ValidatorStakingStrategy::new(&config, ledger.clone()).unwrap();
    strategy.deposit(&config.pool, &config.asset, 15_000).unwrap();
    let id = strategy.undelegate(&config.registrar, V, 15_000).unwrap();

    // Ratio implies 14_250; the ledger hands back 14_000
    ledger.chain.slash(V, RefundRatio::from_bps(9_500).unwrap());
    ledger.mature();

    let paid = strategy.settle(&config.registrar, id).unwrap();
    assert_eq!(paid, 14_000);
    assert_eq!(ledger.chain.balance_of(&config.asset, &config.pool), 14_000);

    let ticket = strategy.withdrawal(id).unwrap();
    assert!(ticket.settled);
    assert_eq!(ticket.released_amount, Some(14_000));
    assert_eq!(ticket.withdrawn_amount, Some(14_000));
    assert_eq!(strategy.pending_withdrawals(), 0);
    assert_eq!(strategy.check_balance(&config.asset).unwrap(), 0);

    assert_eq!(
        strategy.events().last(),
        Some(&StrategyEvent::Withdrawn {
            withdraw_id: id,
            validator_id: V,
            undelegated_amount: 15_000,
            withdrawn_amount: 14_000,
        })
    );
}
