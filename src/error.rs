//! Strategy error type
//!
//! Every failure leaves strategy state untouched. [`StrategyError::class`]
//! groups the variants so callers can tell a corrected retry, a later retry
//! and a permanent refusal apart.

use crate::access::Role;
use crate::types::{Address, Amount, ValidatorId, WithdrawId};
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, StrategyError>;

/// Broad classification of a [`StrategyError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller is not the principal for the required role
    Authorization,
    /// Caller mistake; retry with corrected input
    InvalidInput,
    /// Maturity not reached; retry later
    Timing,
    /// Ticket already settled
    Idempotence,
    /// The staking or token ledger refused an instruction
    External,
    /// Snapshot storage failure
    Persistence,
}

/// Errors returned by strategy operations
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Caller does not hold the role required by the operation
    #[error("caller {caller} is not the {role}")]
    Unauthorized {
        /// Role the operation requires
        role: Role,
        /// Principal that attempted the call
        caller: Address,
    },

    /// Amount must be non-zero
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// Recipient must not be the zero address
    #[error("recipient must not be the zero address")]
    ZeroRecipient,

    /// Asset passed to deposit/withdraw is not the pool asset
    #[error("wrong asset {0}")]
    WrongAsset(Address),

    /// Balance queried for an asset the strategy does not hold
    #[error("unsupported asset {0}")]
    UnsupportedAsset(Address),

    /// Validator is not in the supported set
    #[error("{0} is not supported")]
    NotSupported(ValidatorId),

    /// Validator is already in the supported set
    #[error("{0} is already supported")]
    AlreadySupported(ValidatorId),

    /// Undelegation exceeds the currently delegated stake
    #[error("cannot undelegate {requested} from {validator_id}, only {delegated} delegated")]
    InsufficientDelegation {
        /// Validator being undelegated from
        validator_id: ValidatorId,
        /// Requested amount
        requested: Amount,
        /// Currently delegated stake
        delegated: Amount,
    },

    /// Idle balance cannot cover the request
    #[error("insufficient idle balance: requested {requested}, available {available}")]
    InsufficientIdleBalance {
        /// Requested amount
        requested: Amount,
        /// Idle funds held by the strategy
        available: Amount,
    },

    /// No ticket with this id was ever created
    #[error("invalid withdraw id {0}")]
    InvalidWithdrawId(WithdrawId),

    /// Ticket was already settled
    #[error("withdrawal {0} already withdrawn")]
    AlreadyWithdrawn(WithdrawId),

    /// Minimum unbonding duration has not elapsed
    #[error("not enough time passed: matures at {matures_at}, now {now}")]
    NotEnoughTimePassed {
        /// Earliest timestamp at which settlement succeeds
        matures_at: u64,
        /// Ledger time at the call
        now: u64,
    },

    /// Minimum number of sealed epochs has not elapsed
    #[error("not enough epochs passed: matures at epoch {matures_at}, current {current}")]
    NotEnoughEpochsPassed {
        /// Earliest epoch at which settlement succeeds
        matures_at: u64,
        /// Ledger epoch at the call
        current: u64,
    },

    /// Deposit attempted while no default validator is configured
    #[error("no default validator configured")]
    NoDefaultValidator,

    /// Refund ratio outside `[0, 1]`
    #[error("refund ratio {0} exceeds 1e18")]
    InvalidRatio(u128),

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The external ledger refused an instruction
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Snapshot file could not be read or written
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Snapshot checksum mismatch
    #[error("corrupted snapshot: {0}")]
    Corrupted(String),

    /// State violates an accounting invariant
    #[error("inconsistent state: {0}")]
    Inconsistent(String),
}

impl StrategyError {
    /// Classify the error
    pub fn class(&self) -> ErrorClass {
        match self {
            StrategyError::Unauthorized { .. } => ErrorClass::Authorization,
            StrategyError::NotEnoughTimePassed { .. } | StrategyError::NotEnoughEpochsPassed { .. } => {
                ErrorClass::Timing
            }
            StrategyError::AlreadyWithdrawn(_) => ErrorClass::Idempotence,
            StrategyError::Ledger(_) => ErrorClass::External,
            StrategyError::Io(_)
            | StrategyError::Serialization(_)
            | StrategyError::Corrupted(_)
            | StrategyError::Inconsistent(_) => ErrorClass::Persistence,
            _ => ErrorClass::InvalidInput,
        }
    }

    /// Whether waiting and retrying the same call can succeed
    pub fn is_retryable_later(&self) -> bool {
        self.class() == ErrorClass::Timing
    }
}

impl From<serde_json::Error> for StrategyError {
    fn from(err: serde_json::Error) -> Self {
        StrategyError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for StrategyError {
    fn from(err: toml::de::Error) -> Self {
        StrategyError::InvalidConfig(err.to_string())
    }
}
