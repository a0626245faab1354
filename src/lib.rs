//! # Silver Staking Strategy
//!
//! Validator-delegation staking strategy for a pooled vault.
//!
//! This crate implements:
//! - Validator registry (supported set and default delegation target)
//! - Delegation of pool capital and reward restaking/collection
//! - Withdrawal queue of unbonding tickets, each settled exactly once
//! - Slashing-aware settlement paying out `requested * refund ratio`
//! - Balance accounting across idle funds, stake, rewards and unbonding
//! - State snapshots with checksum and invariant verification
//!
//! The consensus-layer staking facility and the token ledger are injected
//! through [`StakingLedger`] and [`AssetLedger`]; [`SimulatedChain`] is a
//! deterministic in-memory implementation of both.

#![warn(missing_docs, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod access;
pub mod accountant;
pub mod config;
pub mod delegation;
pub mod error;
pub mod events;
pub mod ledger;
pub mod persistence;
pub mod registry;
pub mod simulation;
pub mod slashing;
pub mod state;
pub mod strategy;
pub mod types;
pub mod withdrawal;

pub use access::{AccessControl, Role};
pub use accountant::{BalanceAccountant, BalanceBreakdown, ValidatorBalance};
pub use config::StrategyConfig;
pub use delegation::DelegationManager;
pub use error::{ErrorClass, Result, StrategyError};
pub use events::{EventLog, RecordedEvent, StrategyEvent};
pub use ledger::{AssetLedger, StakingLedger, UnbondingHandle};
pub use persistence::{StateSnapshot, StateStore};
pub use registry::{RegistryManager, ValidatorRegistry};
pub use simulation::{ChainConfig, SimulatedChain};
pub use slashing::SlashingAssessment;
pub use state::{Accounts, StrategyState};
pub use strategy::ValidatorStakingStrategy;
pub use types::{Address, Amount, RefundRatio, ValidatorId, WithdrawId, RATIO_SCALE};
pub use withdrawal::{WithdrawalManager, WithdrawalQueue, WithdrawalTicket};
