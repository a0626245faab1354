//! Validator staking strategy
//!
//! [`ValidatorStakingStrategy`] is the entry point used by the pool and the
//! operators. Each mutating call:
//! 1. checks the caller against the role the operation requires
//! 2. runs the component operation against the owned state and the ledger
//! 3. records the emitted events
//!
//! Components validate every input before instructing the ledger and only
//! touch local state after the ledger accepted, so a failed call leaves the
//! strategy exactly as it was. The one exception is a settlement whose pool
//! payout fails after the ledger released the funds: the release is kept on
//! the ticket so the retry only repeats the payout.

use crate::access::Role;
use crate::accountant::{BalanceAccountant, BalanceBreakdown};
use crate::config::StrategyConfig;
use crate::delegation::DelegationManager;
use crate::error::{Result, StrategyError};
use crate::events::{EventLog, RecordedEvent, StrategyEvent};
use crate::ledger::{AssetLedger, StakingLedger};
use crate::registry::RegistryManager;
use crate::state::{Accounts, StrategyState};
use crate::types::{Address, Amount, ValidatorId, WithdrawId};
use crate::withdrawal::{WithdrawalManager, WithdrawalTicket};
use tracing::info;

/// Staking strategy bound to a ledger
pub struct ValidatorStakingStrategy<L> {
    accounts: Accounts,
    state: StrategyState,
    ledger: L,
    events: EventLog,
}

impl<L: StakingLedger + AssetLedger> ValidatorStakingStrategy<L> {
    /// Create a strategy with fresh state
    pub fn new(config: &StrategyConfig, ledger: L) -> Result<Self> {
        config.validate()?;

        info!(
            "Starting staking strategy {} for asset {} (pool {}, {} validators, default {:?})",
            config.strategy_address,
            config.asset,
            config.pool,
            config.initial_validators.len(),
            config.default_validator_id
        );

        Ok(Self {
            accounts: Accounts::from_config(config),
            state: StrategyState::new(config),
            ledger,
            events: EventLog::new(),
        })
    }

    /// Resume from previously persisted state
    pub fn restore(config: &StrategyConfig, state: StrategyState, ledger: L) -> Result<Self> {
        config.validate()?;
        state.verify_consistency()?;

        info!(
            "Restored staking strategy {} ({} tickets, pending withdrawals {})",
            config.strategy_address,
            state.queue.len(),
            state.queue.pending_withdrawals()
        );

        Ok(Self {
            accounts: Accounts::from_config(config),
            state,
            ledger,
            events: EventLog::new(),
        })
    }

    fn authorize(&self, role: Role, caller: &Address) -> Result<()> {
        self.state.access.ensure(role, caller)
    }

    // ---- pool ----

    /// Delegate `amount` of idle asset to the default validator
    pub fn deposit(&mut self, caller: &Address, asset: &Address, amount: Amount) -> Result<()> {
        self.authorize(Role::Pool, caller)?;
        let events = DelegationManager::deposit(&mut self.state, &self.accounts, &mut self.ledger, asset, amount)?;
        self.events.extend(events);
        Ok(())
    }

    /// Delegate the whole idle balance
    pub fn deposit_all(&mut self, caller: &Address) -> Result<()> {
        self.authorize(Role::Pool, caller)?;
        let events = DelegationManager::deposit_all(&mut self.state, &self.accounts, &mut self.ledger)?;
        self.events.extend(events);
        Ok(())
    }

    /// Send idle asset to `recipient`
    pub fn withdraw(&mut self, caller: &Address, recipient: &Address, asset: &Address, amount: Amount) -> Result<()> {
        self.authorize(Role::Pool, caller)?;
        let events = DelegationManager::withdraw(&self.accounts, &mut self.ledger, recipient, asset, amount)?;
        self.events.extend(events);
        Ok(())
    }

    /// Sweep the idle balance to the pool
    pub fn withdraw_all(&mut self, caller: &Address) -> Result<()> {
        self.authorize(Role::Pool, caller)?;
        let events = DelegationManager::withdraw_all(&self.accounts, &mut self.ledger)?;
        self.events.extend(events);
        Ok(())
    }

    // ---- registrar ----

    /// Open an unbonding ticket, returning its id
    pub fn undelegate(&mut self, caller: &Address, validator_id: ValidatorId, amount: Amount) -> Result<WithdrawId> {
        self.authorize(Role::Registrar, caller)?;
        let (id, events) =
            WithdrawalManager::undelegate(&mut self.state, &self.accounts, &mut self.ledger, validator_id, amount)?;
        self.events.extend(events);
        Ok(id)
    }

    /// Settle a matured ticket, returning the amount paid to the pool
    pub fn settle(&mut self, caller: &Address, withdraw_id: WithdrawId) -> Result<Amount> {
        self.authorize(Role::Registrar, caller)?;
        let (payout, events) = WithdrawalManager::settle(&mut self.state, &self.accounts, &mut self.ledger, withdraw_id)?;
        self.events.extend(events);
        Ok(payout)
    }

    /// Compound pending rewards into principal
    pub fn restake_rewards(&mut self, caller: &Address, validator_ids: &[ValidatorId]) -> Result<()> {
        self.authorize(Role::Registrar, caller)?;
        let events = DelegationManager::restake_rewards(&self.state, &self.accounts, &mut self.ledger, validator_ids)?;
        self.events.extend(events);
        Ok(())
    }

    /// Harvest pending rewards to the pool, returning the amount harvested
    pub fn collect_rewards(&mut self, caller: &Address, validator_ids: &[ValidatorId]) -> Result<Amount> {
        self.authorize(Role::Registrar, caller)?;
        let (harvested, events) = DelegationManager::collect_rewards(&self.accounts, &mut self.ledger, validator_ids)?;
        self.events.extend(events);
        Ok(harvested)
    }

    // ---- governor ----

    /// Add a validator to the supported set
    pub fn support_validator(&mut self, caller: &Address, validator_id: ValidatorId) -> Result<()> {
        self.authorize(Role::Governor, caller)?;
        let events = RegistryManager::support_validator(&mut self.state, validator_id)?;
        self.events.extend(events);
        Ok(())
    }

    /// Remove a validator, undelegating whatever stake it still holds
    pub fn unsupport_validator(&mut self, caller: &Address, validator_id: ValidatorId) -> Result<()> {
        self.authorize(Role::Governor, caller)?;
        let events =
            RegistryManager::unsupport_validator(&mut self.state, &self.accounts, &mut self.ledger, validator_id)?;
        self.events.extend(events);
        Ok(())
    }

    /// Replace the registrar
    pub fn set_registrar(&mut self, caller: &Address, registrar: Address) -> Result<()> {
        self.authorize(Role::Governor, caller)?;
        if registrar.is_zero() {
            return Err(StrategyError::ZeroRecipient);
        }
        self.state.access.set_registrar(registrar);
        self.events.extend([StrategyEvent::RegistratorChanged { registrar }]);
        Ok(())
    }

    // ---- strategist ----

    /// Point new deposits at `validator_id`
    pub fn set_default_validator_id(&mut self, caller: &Address, validator_id: ValidatorId) -> Result<()> {
        self.authorize(Role::Strategist, caller)?;
        let events = RegistryManager::set_default_validator_id(&mut self.state, validator_id);
        self.events.extend(events);
        Ok(())
    }

    // ---- views ----

    /// Total economic balance in `asset`
    pub fn check_balance(&self, asset: &Address) -> Result<Amount> {
        BalanceAccountant::check_balance(&self.state, &self.accounts, &self.ledger, asset)
    }

    /// Balance split into idle, per-validator and pending components
    pub fn balance_breakdown(&self) -> BalanceBreakdown {
        BalanceAccountant::breakdown(&self.state, &self.accounts, &self.ledger)
    }

    /// Whether `asset` is the pool asset
    pub fn supports_asset(&self, asset: &Address) -> bool {
        *asset == self.accounts.asset
    }

    /// Sum of unsettled ticket amounts
    pub fn pending_withdrawals(&self) -> Amount {
        self.state.queue.pending_withdrawals()
    }

    /// Ticket by id
    pub fn withdrawal(&self, withdraw_id: WithdrawId) -> Option<&WithdrawalTicket> {
        self.state.queue.get(withdraw_id)
    }

    /// Unsettled tickets in id order
    pub fn open_tickets(&self) -> Vec<&WithdrawalTicket> {
        self.state.queue.open_tickets().collect()
    }

    /// Id the next ticket will receive
    pub fn next_withdraw_id(&self) -> WithdrawId {
        self.state.queue.next_withdraw_id()
    }

    /// Whether `validator_id` is supported
    pub fn is_supported_validator(&self, validator_id: ValidatorId) -> bool {
        self.state.registry.is_supported(validator_id)
    }

    /// Supported validators in insertion order
    pub fn supported_validators(&self) -> &[ValidatorId] {
        self.state.registry.supported()
    }

    /// Number of supported validators
    pub fn supported_validators_length(&self) -> usize {
        self.state.registry.len()
    }

    /// Target for new deposits
    pub fn default_validator_id(&self) -> Option<ValidatorId> {
        self.state.registry.default_validator_id()
    }

    /// Current principal for `role`
    pub fn role_holder(&self, role: Role) -> Address {
        self.state.access.holder(role)
    }

    /// Addresses the strategy operates with
    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    /// Owned state, e.g. for persistence
    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    /// The bound ledger
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Buffered events
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Remove and return buffered events
    pub fn drain_events(&mut self) -> Vec<RecordedEvent> {
        self.events.drain()
    }
}
