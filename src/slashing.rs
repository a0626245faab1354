//! Slashing-aware payout computation
//!
//! A ticket on a slashed validator only refunds `requested * ratio`. This
//! module reads the ledger's slashing state for a validator and reconciles
//! the computed payout with what the ledger actually releases.

use crate::ledger::StakingLedger;
use crate::types::{Amount, RefundRatio, ValidatorId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Slashing state of a validator applied to one requested amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashingAssessment {
    /// Validator the request was made on
    pub validator_id: ValidatorId,

    /// Whether the ledger reports the validator slashed
    pub is_slashed: bool,

    /// Refund ratio applied (`ONE` when not slashed)
    pub refund_ratio: RefundRatio,

    /// Amount originally requested
    pub requested: Amount,

    /// `floor(requested * refund_ratio)`
    pub expected_payout: Amount,
}

impl SlashingAssessment {
    /// Query the ledger for `validator_id` and apply the ratio to `requested`
    pub fn assess<L: StakingLedger>(ledger: &L, validator_id: ValidatorId, requested: Amount) -> Self {
        let is_slashed = ledger.is_slashed(validator_id);
        let refund_ratio = if is_slashed {
            ledger.slashing_refund_ratio(validator_id)
        } else {
            RefundRatio::ONE
        };

        let assessment = Self {
            validator_id,
            is_slashed,
            refund_ratio,
            requested,
            expected_payout: refund_amount(requested, refund_ratio),
        };

        debug!(
            "Assessed {}: slashed={} ratio={} requested={} payout={}",
            validator_id, is_slashed, refund_ratio, requested, assessment.expected_payout
        );

        assessment
    }

    /// Whether nothing will be released
    pub fn is_total_loss(&self) -> bool {
        self.refund_ratio.is_zero()
    }

    /// Amount lost to slashing
    pub fn slashed_amount(&self) -> Amount {
        self.requested - self.expected_payout
    }

    /// Final payout given what the ledger released
    ///
    /// Never pays more than was released.
    pub fn reconcile(&self, released: Amount) -> Amount {
        if released < self.expected_payout {
            warn!(
                "{} released {} but refund ratio {} implies {}; paying out released amount",
                self.validator_id, released, self.refund_ratio, self.expected_payout
            );
            return released;
        }

        if released > self.expected_payout {
            debug!(
                "{} released {} above expected {}; surplus stays idle",
                self.validator_id, released, self.expected_payout
            );
        }

        self.expected_payout
    }
}

/// `floor(amount * ratio)`, zero for a zero ratio
pub fn refund_amount(amount: Amount, ratio: RefundRatio) -> Amount {
    if ratio.is_zero() {
        return 0;
    }
    ratio.apply(amount)
}
