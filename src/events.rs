//! Strategy events
//!
//! Events are appended only after an operation fully succeeds, so the log
//! never records effects that were rolled back.

use crate::types::{Address, Amount, ValidatorId, WithdrawId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observable effect of a strategy operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyEvent {
    /// Pool asset accepted for delegation
    Deposit {
        /// Pool asset
        asset: Address,
        /// Amount deposited
        amount: Amount,
    },

    /// Pool asset sent out of the strategy
    Withdrawal {
        /// Pool asset
        asset: Address,
        /// Receiver
        recipient: Address,
        /// Amount sent
        amount: Amount,
    },

    /// Stake delegated to a validator
    Delegated {
        /// Target validator
        validator_id: ValidatorId,
        /// Amount delegated
        amount: Amount,
    },

    /// Unbonding ticket opened
    Undelegated {
        /// Ticket id
        withdraw_id: WithdrawId,
        /// Source validator
        validator_id: ValidatorId,
        /// Amount requested
        amount: Amount,
    },

    /// Unbonding ticket settled
    Withdrawn {
        /// Ticket id
        withdraw_id: WithdrawId,
        /// Source validator
        validator_id: ValidatorId,
        /// Amount originally requested
        undelegated_amount: Amount,
        /// Amount actually paid out after slashing
        withdrawn_amount: Amount,
    },

    /// Pending rewards compounded into principal
    RewardsRestaked {
        /// Validator
        validator_id: ValidatorId,
        /// Amount compounded
        amount: Amount,
    },

    /// Validator added to the supported set
    SupportedValidator {
        /// Validator
        validator_id: ValidatorId,
    },

    /// Validator removed from the supported set
    UnsupportedValidator {
        /// Validator
        validator_id: ValidatorId,
    },

    /// Default delegation target changed
    DefaultValidatorIdChanged {
        /// New default
        validator_id: ValidatorId,
    },

    /// Registrar principal replaced
    RegistratorChanged {
        /// New registrar
        registrar: Address,
    },
}

/// Event with the time it was recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Position in the log
    pub sequence: u64,
    /// Wall-clock time of recording
    pub recorded_at: DateTime<Utc>,
    /// The event
    pub event: StrategyEvent,
}

/// Append-only event log
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    entries: Vec<RecordedEvent>,
    next_sequence: u64,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append events emitted by one operation
    pub fn extend(&mut self, events: impl IntoIterator<Item = StrategyEvent>) {
        for event in events {
            self.entries.push(RecordedEvent {
                sequence: self.next_sequence,
                recorded_at: Utc::now(),
                event,
            });
            self.next_sequence += 1;
        }
    }

    /// All recorded events
    pub fn entries(&self) -> &[RecordedEvent] {
        &self.entries
    }

    /// Events without metadata, oldest first
    pub fn events(&self) -> impl Iterator<Item = &StrategyEvent> {
        self.entries.iter().map(|e| &e.event)
    }

    /// Most recent event
    pub fn last(&self) -> Option<&StrategyEvent> {
        self.entries.last().map(|e| &e.event)
    }

    /// Remove and return everything recorded so far
    ///
    /// Sequence numbers keep counting across drains.
    pub fn drain(&mut self) -> Vec<RecordedEvent> {
        std::mem::take(&mut self.entries)
    }

    /// Number of buffered events
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no events are buffered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
