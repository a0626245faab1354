//! Core value types shared by every strategy component
//!
//! This module defines:
//! - Validator identifiers as assigned by the external staking ledger
//! - 20-byte account addresses for principals, tokens and the pool
//! - Token amounts and withdrawal ticket ids
//! - Slashing refund ratios in 1e18 fixed point

use crate::error::{Result, StrategyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Token amount in the smallest unit of the pool asset
pub type Amount = u128;

/// Withdrawal ticket identifier
pub type WithdrawId = u64;

/// Fixed-point scale used by [`RefundRatio`] (1e18)
pub const RATIO_SCALE: u128 = 1_000_000_000_000_000_000;

/// Validator identifier on the external staking ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidatorId(pub u64);

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validator-{}", self.0)
    }
}

impl From<u64> for ValidatorId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address, never a valid recipient or principal
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create an address from raw bytes
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Address with every byte set to `byte` (handy for fixtures)
    pub const fn repeat_byte(byte: u8) -> Self {
        Self([byte; 20])
    }

    /// Check for the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|e| StrategyError::InvalidConfig(format!("invalid address {}: {}", s, e)))?;

        if bytes.len() != 20 {
            return Err(StrategyError::InvalidConfig(format!(
                "address must be 20 bytes, got {}",
                bytes.len()
            )));
        }

        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Fraction of an unbonding request the ledger refunds after slashing
///
/// Stored as a 1e18 fixed-point value in `[0, 1e18]`. `ONE` means the
/// validator was never slashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RefundRatio(u128);

impl RefundRatio {
    /// Full refund
    pub const ONE: RefundRatio = RefundRatio(RATIO_SCALE);

    /// Nothing refunded
    pub const ZERO: RefundRatio = RefundRatio(0);

    /// Create a ratio from its raw 1e18-scaled value
    pub fn from_scaled(value: u128) -> Result<Self> {
        if value > RATIO_SCALE {
            return Err(StrategyError::InvalidRatio(value));
        }
        Ok(Self(value))
    }

    /// Create a ratio from basis points (10_000 = 100%)
    pub fn from_bps(bps: u32) -> Result<Self> {
        Self::from_scaled(u128::from(bps) * (RATIO_SCALE / 10_000))
    }

    /// Raw 1e18-scaled value
    pub fn scaled(&self) -> u128 {
        self.0
    }

    /// Whether the ratio refunds nothing
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `floor(amount * ratio)`
    ///
    /// Splits `amount` around the scale so the product never overflows.
    pub fn apply(&self, amount: Amount) -> Amount {
        let whole = amount / RATIO_SCALE;
        let rest = amount % RATIO_SCALE;
        whole * self.0 + rest * self.0 / RATIO_SCALE
    }
}

impl Default for RefundRatio {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for RefundRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0 as f64 / RATIO_SCALE as f64)
    }
}
