//! Validator registry
//!
//! This module manages:
//! - The ordered set of validators the strategy may delegate to
//! - The default validator that receives new deposits
//! - Every validator the strategy has ever delegated to, so balance
//!   accounting keeps seeing stake left on a validator that was later
//!   unsupported or was only ever the default

use crate::error::{Result, StrategyError};
use crate::events::StrategyEvent;
use crate::ledger::StakingLedger;
use crate::state::{Accounts, StrategyState};
use crate::types::ValidatorId;
use crate::withdrawal::WithdrawalManager;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// Supported validators and delegation targets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRegistry {
    /// Supported validators in the order they were added
    supported: Vec<ValidatorId>,

    /// Target for new deposits
    default_validator_id: Option<ValidatorId>,

    /// Validators that have ever received a delegation
    delegated: BTreeSet<ValidatorId>,
}

impl ValidatorRegistry {
    /// Create a registry
    pub fn new(initial: &[ValidatorId], default_validator_id: Option<ValidatorId>) -> Self {
        let mut supported = Vec::with_capacity(initial.len());
        for id in initial {
            if !supported.contains(id) {
                supported.push(*id);
            }
        }

        Self {
            supported,
            default_validator_id,
            delegated: BTreeSet::new(),
        }
    }

    /// Check membership
    pub fn is_supported(&self, id: ValidatorId) -> bool {
        self.supported.contains(&id)
    }

    /// Supported validators in insertion order
    pub fn supported(&self) -> &[ValidatorId] {
        &self.supported
    }

    /// Number of supported validators
    pub fn len(&self) -> usize {
        self.supported.len()
    }

    /// Whether no validator is supported
    pub fn is_empty(&self) -> bool {
        self.supported.is_empty()
    }

    /// Target for new deposits
    pub fn default_validator_id(&self) -> Option<ValidatorId> {
        self.default_validator_id
    }

    /// Add a validator
    pub fn add(&mut self, id: ValidatorId) -> Result<()> {
        if self.is_supported(id) {
            return Err(StrategyError::AlreadySupported(id));
        }
        self.supported.push(id);
        Ok(())
    }

    /// Remove a validator, preserving the order of the rest
    pub fn remove(&mut self, id: ValidatorId) -> Result<()> {
        let position = self
            .supported
            .iter()
            .position(|v| *v == id)
            .ok_or(StrategyError::NotSupported(id))?;
        self.supported.remove(position);
        Ok(())
    }

    /// Fail with `NotSupported` unless `id` is a member
    pub fn ensure_supported(&self, id: ValidatorId) -> Result<()> {
        if !self.is_supported(id) {
            return Err(StrategyError::NotSupported(id));
        }
        Ok(())
    }

    /// Change the default validator
    pub fn set_default(&mut self, id: ValidatorId) {
        self.default_validator_id = Some(id);
    }

    /// Remember that `id` holds (or held) strategy stake
    pub fn record_delegation(&mut self, id: ValidatorId) {
        self.delegated.insert(id);
    }

    /// Every validator whose stake counts toward the strategy balance
    pub fn tracked_validators(&self) -> BTreeSet<ValidatorId> {
        let mut tracked = self.delegated.clone();
        tracked.extend(self.supported.iter().copied());
        tracked
    }
}

/// Validator set operations that reach into the ledger
pub struct RegistryManager;

impl RegistryManager {
    /// Add `id` to the supported set
    pub fn support_validator(state: &mut StrategyState, id: ValidatorId) -> Result<Vec<StrategyEvent>> {
        state.registry.add(id)?;

        info!(
            "Supported {} ({} validators supported)",
            id,
            state.registry.len()
        );

        Ok(vec![StrategyEvent::SupportedValidator { validator_id: id }])
    }

    /// Remove `id`, first undelegating any stake still on it
    pub fn unsupport_validator<L: StakingLedger>(
        state: &mut StrategyState,
        accounts: &Accounts,
        ledger: &mut L,
        id: ValidatorId,
    ) -> Result<Vec<StrategyEvent>> {
        state.registry.ensure_supported(id)?;

        let mut events = Vec::new();
        let stake = ledger.get_stake(&accounts.strategy, id);
        if stake > 0 {
            let (_, undelegated) = WithdrawalManager::undelegate(state, accounts, ledger, id, stake)?;
            events.extend(undelegated);
        }

        state.registry.remove(id)?;
        events.push(StrategyEvent::UnsupportedValidator { validator_id: id });

        info!(
            "Unsupported {} (undelegated {}, {} validators remain)",
            id,
            stake,
            state.registry.len()
        );

        Ok(events)
    }

    /// Point new deposits at `id`
    pub fn set_default_validator_id(state: &mut StrategyState, id: ValidatorId) -> Vec<StrategyEvent> {
        let previous = state.registry.default_validator_id();
        state.registry.set_default(id);

        info!("Default validator changed from {:?} to {}", previous, id);

        vec![StrategyEvent::DefaultValidatorIdChanged { validator_id: id }]
    }
}
