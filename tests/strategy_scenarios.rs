//! End-to-end strategy scenarios against the simulated chain
//!
//! Covers deposit and reward accrual, undelegation and settlement,
//! slashed settlement, timing guards and idempotence, plus a property test
//! over random operation sequences.

use silver_staking_strategy::{
    AssetLedger, RefundRatio, SimulatedChain, StakingLedger, StrategyConfig, StrategyError,
    StrategyEvent, ValidatorId, ValidatorStakingStrategy, Amount, RATIO_SCALE,
};
use proptest::prelude::*;
use tracing_subscriber::EnvFilter;

const UNIT: Amount = RATIO_SCALE;
const V: ValidatorId = ValidatorId(15);
const W: ValidatorId = ValidatorId(16);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Harness {
    strategy: ValidatorStakingStrategy<SimulatedChain>,
    chain: SimulatedChain,
    config: StrategyConfig,
}

impl Harness {
    fn new() -> Self {
        init_tracing();

        let config = StrategyConfig {
            default_validator_id: Some(V),
            initial_validators: vec![V, W],
            ..StrategyConfig::default()
        };

        let chain = SimulatedChain::new(config.asset);
        chain.register_validator(V);
        chain.register_validator(W);

        let strategy = ValidatorStakingStrategy::new(&config, chain.clone()).unwrap();
        Self { strategy, chain, config }
    }

    /// Pool transfers `amount` to the strategy and calls deposit
    fn deposit(&mut self, amount: Amount) {
        self.chain.mint(&self.config.asset, &self.config.strategy_address, amount);
        self.strategy
            .deposit(&self.config.pool, &self.config.asset, amount)
            .unwrap();
    }

    fn undelegate(&mut self, validator: ValidatorId, amount: Amount) -> u64 {
        self.strategy
            .undelegate(&self.config.registrar, validator, amount)
            .unwrap()
    }

    fn settle(&mut self, id: u64) -> Result<Amount, StrategyError> {
        self.strategy.settle(&self.config.registrar, id)
    }

    fn mature(&self) {
        self.chain.advance_time(self.chain.min_unbond_duration());
        self.chain.advance_epochs(self.chain.min_unbond_epochs());
    }

    fn balance(&self) -> Amount {
        self.strategy.check_balance(&self.config.asset).unwrap()
    }

    fn pool_balance(&self) -> Amount {
        self.chain.balance_of(&self.config.asset, &self.config.pool)
    }

    fn unsettled_sum(&self) -> Amount {
        self.strategy
            .open_tickets()
            .iter()
            .map(|t| t.requested_amount)
            .sum()
    }
}

#[test]
fn test_deposit_accrues_rewards_each_epoch() {
    let mut h = Harness::new();
    h.deposit(15_000 * UNIT);

    let before = h.balance();
    assert_eq!(before, 15_000 * UNIT);

    h.chain.advance_epoch();
    assert!(h.balance() > before);
}

#[test]
fn test_undelegate_and_settle_full_amount() {
    let mut h = Harness::new();
    h.deposit(15_000 * UNIT);

    let id = h.undelegate(V, 15_000 * UNIT);
    assert_eq!(h.strategy.pending_withdrawals(), 15_000 * UNIT);
    assert_eq!(h.balance(), 15_000 * UNIT);

    h.chain.advance_time(14 * 24 * 60 * 60);
    h.chain.advance_epochs(h.chain.min_unbond_epochs());

    let pool_before = h.pool_balance();
    let paid = h.settle(id).unwrap();

    assert_eq!(paid, 15_000 * UNIT);
    assert_eq!(h.pool_balance() - pool_before, 15_000 * UNIT);
    assert_eq!(h.strategy.pending_withdrawals(), 0);
    assert!(h.strategy.withdrawal(id).unwrap().settled);
    assert_eq!(h.balance(), 0);

    let events: Vec<_> = h.strategy.events().events().cloned().collect();
    assert!(events.contains(&StrategyEvent::Withdrawn {
        withdraw_id: id,
        validator_id: V,
        undelegated_amount: 15_000 * UNIT,
        withdrawn_amount: 15_000 * UNIT,
    }));
}

#[test]
fn test_settle_after_partial_slash() {
    let mut h = Harness::new();
    h.deposit(15_000 * UNIT);
    let id = h.undelegate(V, 15_000 * UNIT);

    h.chain.slash(V, RefundRatio::from_bps(9_500).unwrap());
    h.mature();

    let pool_before = h.pool_balance();
    let paid = h.settle(id).unwrap();

    let expected = 14_250 * UNIT;
    assert!(paid.abs_diff(expected) <= 1);
    assert_eq!(h.pool_balance() - pool_before, paid);

    let ticket = h.strategy.withdrawal(id).unwrap();
    assert!(ticket.settled);
    assert_eq!(ticket.withdrawn_amount, Some(paid));
    assert_eq!(h.strategy.pending_withdrawals(), 0);
}

#[test]
fn test_settle_after_total_slash() {
    let mut h = Harness::new();
    h.deposit(15_000 * UNIT);
    let id = h.undelegate(V, 15_000 * UNIT);

    h.chain.slash(V, RefundRatio::ZERO);
    h.mature();

    // Value stays counted as owed until settlement resolves it
    assert_eq!(h.balance(), 15_000 * UNIT);

    let pool_before = h.pool_balance();
    assert_eq!(h.settle(id).unwrap(), 0);
    assert_eq!(h.pool_balance(), pool_before);

    assert!(h.strategy.withdrawal(id).unwrap().settled);
    assert_eq!(h.strategy.pending_withdrawals(), 0);
    assert_eq!(h.balance(), 0);

    // No Withdrawal event for a zero payout
    assert_eq!(
        h.strategy.events().last(),
        Some(&StrategyEvent::Withdrawn {
            withdraw_id: id,
            validator_id: V,
            undelegated_amount: 15_000 * UNIT,
            withdrawn_amount: 0,
        })
    );
}

#[test]
fn test_settle_before_maturity_changes_nothing() {
    let mut h = Harness::new();
    h.deposit(1_000 * UNIT);
    let id = h.undelegate(V, 1_000 * UNIT);

    let state_before = h.strategy.state().clone();

    assert!(matches!(h.settle(id), Err(StrategyError::NotEnoughTimePassed { .. })));

    // Time satisfied, epochs not
    h.chain.advance_time(h.chain.min_unbond_duration());
    h.chain.advance_epochs(h.chain.min_unbond_epochs() - 1);
    let err = h.settle(id).unwrap_err();
    assert!(matches!(err, StrategyError::NotEnoughEpochsPassed { .. }));
    assert!(err.is_retryable_later());

    assert_eq!(h.strategy.state(), &state_before);
    assert_eq!(h.strategy.pending_withdrawals(), 1_000 * UNIT);
    assert!(!h.strategy.withdrawal(id).unwrap().settled);

    // Epochs satisfied, time not
    let mut h = Harness::new();
    h.deposit(1_000 * UNIT);
    let id = h.undelegate(V, 1_000 * UNIT);
    h.chain.advance_epochs(h.chain.min_unbond_epochs());
    h.chain.advance_time(h.chain.min_unbond_duration() - 1);
    assert!(matches!(h.settle(id), Err(StrategyError::NotEnoughTimePassed { .. })));
}

#[test]
fn test_second_settlement_is_rejected() {
    let mut h = Harness::new();
    h.deposit(500 * UNIT);
    let id = h.undelegate(V, 500 * UNIT);
    h.mature();
    h.settle(id).unwrap();

    let state_after = h.strategy.state().clone();
    let pool_after = h.pool_balance();
    let events_after = h.strategy.events().len();

    assert!(matches!(h.settle(id), Err(StrategyError::AlreadyWithdrawn(_))));
    assert_eq!(h.strategy.state(), &state_after);
    assert_eq!(h.pool_balance(), pool_after);
    assert_eq!(h.strategy.events().len(), events_after);
}

#[test]
fn test_unknown_ticket_and_overdraw() {
    let mut h = Harness::new();
    h.deposit(100 * UNIT);

    assert!(matches!(h.settle(42), Err(StrategyError::InvalidWithdrawId(42))));
    assert!(matches!(
        h.strategy.undelegate(&h.config.registrar, V, 100 * UNIT + 1),
        Err(StrategyError::InsufficientDelegation { .. })
    ));
}

#[test]
fn test_idle_round_trip_restores_balances() {
    let mut h = Harness::new();
    h.deposit(1_000 * UNIT);

    let balance_before = h.balance();
    let idle_before = h.chain.balance_of(&h.config.asset, &h.config.strategy_address);

    // Pool parks funds in the strategy, then takes them back via the idle path
    h.chain.mint(&h.config.asset, &h.config.pool, 250 * UNIT);
    h.chain
        .clone()
        .transfer(&h.config.asset, &h.config.pool, &h.config.strategy_address, 250 * UNIT)
        .unwrap();
    assert_eq!(h.balance(), balance_before + 250 * UNIT);

    h.strategy
        .withdraw(&h.config.pool, &h.config.pool, &h.config.asset, 250 * UNIT)
        .unwrap();

    assert_eq!(h.balance(), balance_before);
    assert_eq!(
        h.chain.balance_of(&h.config.asset, &h.config.strategy_address),
        idle_before
    );
}

#[test]
fn test_tickets_settle_in_any_order() {
    let mut h = Harness::new();
    h.deposit(3_000 * UNIT);
    h.strategy.set_default_validator_id(&h.config.strategist, W).unwrap();
    h.deposit(1_000 * UNIT);

    let a = h.undelegate(V, 1_000 * UNIT);
    let b = h.undelegate(W, 400 * UNIT);
    let c = h.undelegate(V, 500 * UNIT);
    assert!(a < b && b < c);
    assert_eq!(h.strategy.pending_withdrawals(), 1_900 * UNIT);

    h.mature();

    h.settle(c).unwrap();
    assert_eq!(h.strategy.pending_withdrawals(), 1_400 * UNIT);
    h.settle(a).unwrap();
    assert_eq!(h.strategy.pending_withdrawals(), 400 * UNIT);
    h.settle(b).unwrap();
    assert_eq!(h.strategy.pending_withdrawals(), 0);

    assert_eq!(h.pool_balance(), 1_900 * UNIT);

    let strategy_address = h.config.strategy_address;
    let rewards = h.chain.pending_rewards(&strategy_address, V) + h.chain.pending_rewards(&strategy_address, W);
    assert_eq!(h.balance(), 2_100 * UNIT + rewards);
}

#[test]
fn test_settlement_keeps_rewards_accrued_elsewhere() {
    let mut h = Harness::new();
    h.deposit(10_000 * UNIT);
    let id = h.undelegate(V, 4_000 * UNIT);

    let before = h.balance();
    h.mature();
    let rewards = h.chain.pending_rewards(&h.config.strategy_address, V);
    assert!(rewards > 0);

    h.settle(id).unwrap();
    assert_eq!(h.balance(), before + rewards - 4_000 * UNIT);
}

#[test]
fn test_slash_with_active_stake_is_realized_at_settlement() {
    let mut h = Harness::new();
    h.deposit(10_000 * UNIT);

    h.chain.slash(V, RefundRatio::from_bps(5_000).unwrap());

    // The ledger keeps reporting the delegated stake until it is released
    assert_eq!(h.balance(), 10_000 * UNIT);
    h.chain.advance_epoch();
    assert_eq!(h.balance(), 10_000 * UNIT);

    let id = h.undelegate(V, 10_000 * UNIT);
    assert_eq!(h.balance(), 10_000 * UNIT);

    h.mature();
    let paid = h.settle(id).unwrap();

    assert_eq!(paid, 5_000 * UNIT);
    assert_eq!(h.pool_balance(), 5_000 * UNIT);
    assert_eq!(h.strategy.pending_withdrawals(), 0);
    assert_eq!(h.balance(), 0);
}

#[derive(Debug, Clone)]
enum Op {
    Undelegate(u64),
    Settle(prop::sample::Index),
    Advance,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => (1..5_000u64).prop_map(Op::Undelegate),
        1 => any::<prop::sample::Index>().prop_map(Op::Settle),
        1 => Just(Op::Advance),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_pending_matches_unsettled_tickets(ops in prop::collection::vec(op(), 1..120)) {
        let mut h = Harness::new();
        h.deposit(1_000_000 * UNIT);

        let mut issued = Vec::new();
        for step in ops {
            match step {
                Op::Undelegate(amount) => {
                    let amount = Amount::from(amount) * UNIT;
                    let stake = h.chain.get_stake(&h.config.strategy_address, V);
                    if amount <= stake {
                        issued.push(h.undelegate(V, amount));
                    }
                }
                Op::Settle(index) => {
                    if !issued.is_empty() {
                        let id = issued[index.index(issued.len())];
                        let _ = h.settle(id);
                    }
                }
                Op::Advance => {
                    h.chain.advance_time(h.chain.min_unbond_duration() / 3);
                    h.chain.advance_epoch();
                }
            }

            prop_assert_eq!(h.strategy.pending_withdrawals(), h.unsettled_sum());
            prop_assert!(h.strategy.state().verify_consistency().is_ok());
        }
    }
}
