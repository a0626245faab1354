//! Withdrawal queue
//!
//! This module handles:
//! - Opening unbonding tickets on undelegation
//! - Maturity checks against the ledger's clock and sealed epochs
//! - Settling tickets exactly once, paying out the slashed amount to the pool
//! - The pending-withdrawals aggregate
//!
//! Tickets move `Open -> Settled` and are never removed, so a settled id
//! keeps rejecting further settlement. The amount the ledger releases is
//! recorded on the ticket before the pool is paid; if the payout transfer
//! fails the ticket stays open and a retry only repeats the transfer.

use crate::error::{Result, StrategyError};
use crate::events::StrategyEvent;
use crate::ledger::{AssetLedger, StakingLedger, UnbondingHandle};
use crate::slashing::SlashingAssessment;
use crate::state::{Accounts, StrategyState};
use crate::types::{Amount, ValidatorId, WithdrawId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// One undelegation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalTicket {
    /// Ticket id
    pub id: WithdrawId,

    /// Validator the stake was undelegated from
    pub validator_id: ValidatorId,

    /// Amount undelegated
    pub requested_amount: Amount,

    /// Ledger epoch at creation
    pub created_epoch: u64,

    /// Ledger time at creation
    pub created_time: u64,

    /// Ledger handle for the unbonding request
    pub handle: UnbondingHandle,

    /// Amount the ledger released for the unbonding request
    #[serde(default)]
    pub released_amount: Option<Amount>,

    /// Whether the ticket has been settled
    pub settled: bool,

    /// Amount paid to the pool on settlement
    pub withdrawn_amount: Option<Amount>,
}

impl WithdrawalTicket {
    /// Earliest ledger time at which the ticket may settle
    pub fn matures_at_time(&self, min_duration: u64) -> u64 {
        self.created_time.saturating_add(min_duration)
    }

    /// Earliest sealed epoch at which the ticket may settle
    pub fn matures_at_epoch(&self, min_epochs: u64) -> u64 {
        self.created_epoch.saturating_add(min_epochs)
    }

    /// Check both maturity conditions, time first
    pub fn ensure_matured(&self, now: u64, epoch: u64, min_duration: u64, min_epochs: u64) -> Result<()> {
        let matures_at = self.matures_at_time(min_duration);
        if now < matures_at {
            return Err(StrategyError::NotEnoughTimePassed { matures_at, now });
        }

        let matures_at = self.matures_at_epoch(min_epochs);
        if epoch < matures_at {
            return Err(StrategyError::NotEnoughEpochsPassed {
                matures_at,
                current: epoch,
            });
        }

        Ok(())
    }
}

/// Ticket table keyed by id plus the pending aggregate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalQueue {
    tickets: BTreeMap<WithdrawId, WithdrawalTicket>,
    pending_withdrawals: Amount,
    next_withdraw_id: WithdrawId,
}

impl WithdrawalQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a ticket
    pub fn get(&self, id: WithdrawId) -> Option<&WithdrawalTicket> {
        self.tickets.get(&id)
    }

    /// Sum of unsettled requested amounts
    pub fn pending_withdrawals(&self) -> Amount {
        self.pending_withdrawals
    }

    /// Requested amounts of open tickets already released into idle funds
    pub fn awaiting_payout(&self) -> Amount {
        self.open_tickets()
            .filter(|t| t.released_amount.is_some())
            .map(|t| t.requested_amount)
            .sum()
    }

    /// Id the next ticket will receive
    pub fn next_withdraw_id(&self) -> WithdrawId {
        self.next_withdraw_id
    }

    /// Highest id ever assigned
    pub fn last_withdraw_id(&self) -> Option<WithdrawId> {
        self.tickets.keys().next_back().copied()
    }

    /// Unsettled tickets in id order
    pub fn open_tickets(&self) -> impl Iterator<Item = &WithdrawalTicket> {
        self.tickets.values().filter(|t| !t.settled)
    }

    /// Every ticket in id order
    pub fn tickets(&self) -> impl Iterator<Item = &WithdrawalTicket> {
        self.tickets.values()
    }

    /// Total tickets ever created
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// Whether no ticket was ever created
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    fn open(
        &mut self,
        validator_id: ValidatorId,
        amount: Amount,
        created_epoch: u64,
        created_time: u64,
        handle: UnbondingHandle,
    ) -> WithdrawId {
        let id = self.next_withdraw_id;
        self.next_withdraw_id += 1;

        self.tickets.insert(
            id,
            WithdrawalTicket {
                id,
                validator_id,
                requested_amount: amount,
                created_epoch,
                created_time,
                handle,
                released_amount: None,
                settled: false,
                withdrawn_amount: None,
            },
        );
        self.pending_withdrawals += amount;

        id
    }

    /// Look up an open ticket
    fn open_ticket(&self, id: WithdrawId) -> Result<&WithdrawalTicket> {
        let ticket = self.tickets.get(&id).ok_or(StrategyError::InvalidWithdrawId(id))?;
        if ticket.settled {
            return Err(StrategyError::AlreadyWithdrawn(id));
        }
        Ok(ticket)
    }

    fn record_release(&mut self, id: WithdrawId, released: Amount) -> Result<()> {
        let ticket = self.tickets.get_mut(&id).ok_or(StrategyError::InvalidWithdrawId(id))?;
        if ticket.settled {
            return Err(StrategyError::AlreadyWithdrawn(id));
        }

        ticket.released_amount = Some(released);
        Ok(())
    }

    fn close(&mut self, id: WithdrawId, withdrawn_amount: Amount) -> Result<WithdrawalTicket> {
        let ticket = self.tickets.get_mut(&id).ok_or(StrategyError::InvalidWithdrawId(id))?;
        if ticket.settled {
            return Err(StrategyError::AlreadyWithdrawn(id));
        }

        ticket.settled = true;
        ticket.withdrawn_amount = Some(withdrawn_amount);
        self.pending_withdrawals -= ticket.requested_amount;

        Ok(ticket.clone())
    }
}

/// Undelegation and settlement
pub struct WithdrawalManager;

impl WithdrawalManager {
    /// Open an unbonding ticket for `amount` on `validator_id`
    pub fn undelegate<L: StakingLedger>(
        state: &mut StrategyState,
        accounts: &Accounts,
        ledger: &mut L,
        validator_id: ValidatorId,
        amount: Amount,
    ) -> Result<(WithdrawId, Vec<StrategyEvent>)> {
        if amount == 0 {
            return Err(StrategyError::ZeroAmount);
        }
        state.registry.ensure_supported(validator_id)?;

        let delegated = ledger.get_stake(&accounts.strategy, validator_id);
        if amount > delegated {
            return Err(StrategyError::InsufficientDelegation {
                validator_id,
                requested: amount,
                delegated,
            });
        }

        let (epoch, time) = (ledger.current_epoch(), ledger.current_time());
        let handle = ledger.begin_unbonding(&accounts.strategy, validator_id, amount)?;
        let id = state.queue.open(validator_id, amount, epoch, time, handle);

        info!(
            "Undelegated {} from {} as withdrawal {} (pending: {})",
            amount,
            validator_id,
            id,
            state.queue.pending_withdrawals()
        );

        Ok((
            id,
            vec![StrategyEvent::Undelegated {
                withdraw_id: id,
                validator_id,
                amount,
            }],
        ))
    }

    /// Settle a matured ticket and pay the refundable amount to the pool
    pub fn settle<L: StakingLedger + AssetLedger>(
        state: &mut StrategyState,
        accounts: &Accounts,
        ledger: &mut L,
        id: WithdrawId,
    ) -> Result<(Amount, Vec<StrategyEvent>)> {
        let ticket = state.queue.open_ticket(id)?;
        ticket.ensure_matured(
            ledger.current_time(),
            ledger.current_epoch(),
            ledger.min_unbond_duration(),
            ledger.min_unbond_epochs(),
        )?;

        let (validator_id, requested, handle) = (ticket.validator_id, ticket.requested_amount, ticket.handle);
        let recorded = ticket.released_amount;
        let assessment = SlashingAssessment::assess(&*ledger, validator_id, requested);

        let payout = match recorded {
            Some(released) => {
                debug!("Withdrawal {} was released ({}) earlier, retrying payout", id, released);
                assessment.reconcile(released)
            }
            // A fully slashed request cannot be released by the ledger
            None if assessment.is_total_loss() => 0,
            None => {
                let released = ledger.settle_unbonding(&accounts.strategy, handle)?;
                state.queue.record_release(id, released)?;
                assessment.reconcile(released)
            }
        };

        let mut events = Vec::with_capacity(2);
        if payout > 0 {
            if let Err(err) = ledger.transfer(&accounts.asset, &accounts.strategy, &accounts.pool, payout) {
                warn!(
                    "Payout of {} for withdrawal {} failed, released funds stay idle until retried: {}",
                    payout, id, err
                );
                return Err(err);
            }
            events.push(StrategyEvent::Withdrawal {
                asset: accounts.asset,
                recipient: accounts.pool,
                amount: payout,
            });
        }

        state.queue.close(id, payout)?;
        events.push(StrategyEvent::Withdrawn {
            withdraw_id: id,
            validator_id,
            undelegated_amount: requested,
            withdrawn_amount: payout,
        });

        if assessment.is_slashed {
            warn!(
                "Settled withdrawal {} on slashed {}: requested {}, paid {} (ratio {})",
                id, validator_id, requested, payout, assessment.refund_ratio
            );
        } else {
            info!(
                "Settled withdrawal {} on {}: paid {} to pool (pending: {})",
                id,
                validator_id,
                payout,
                state.queue.pending_withdrawals()
            );
        }

        Ok((payout, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> WithdrawalTicket {
        WithdrawalTicket {
            id: 0,
            validator_id: ValidatorId(1),
            requested_amount: 100,
            created_epoch: 10,
            created_time: 1_000,
            handle: UnbondingHandle(1),
            released_amount: None,
            settled: false,
            withdrawn_amount: None,
        }
    }

    #[test]
    fn test_maturity_requires_time_and_epochs() {
        let t = ticket();

        assert!(matches!(
            t.ensure_matured(1_099, 20, 100, 4),
            Err(StrategyError::NotEnoughTimePassed { matures_at: 1_100, now: 1_099 })
        ));
        assert!(matches!(
            t.ensure_matured(1_100, 13, 100, 4),
            Err(StrategyError::NotEnoughEpochsPassed { matures_at: 14, current: 13 })
        ));
        assert!(t.ensure_matured(1_100, 14, 100, 4).is_ok());
    }

    #[test]
    fn test_queue_tracks_pending() {
        let mut queue = WithdrawalQueue::new();
        let a = queue.open(ValidatorId(1), 100, 0, 0, UnbondingHandle(1));
        let b = queue.open(ValidatorId(2), 250, 0, 0, UnbondingHandle(2));
        assert_eq!((a, b), (0, 1));
        assert_eq!(queue.pending_withdrawals(), 350);
        assert_eq!(queue.next_withdraw_id(), 2);

        // Settle out of creation order
        let closed = queue.close(b, 200).unwrap();
        assert!(closed.settled);
        assert_eq!(closed.withdrawn_amount, Some(200));
        assert_eq!(queue.pending_withdrawals(), 100);

        assert!(matches!(queue.close(b, 200), Err(StrategyError::AlreadyWithdrawn(1))));
        assert!(matches!(queue.open_ticket(7), Err(StrategyError::InvalidWithdrawId(7))));
        assert_eq!(queue.open_tickets().count(), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_released_ticket_awaits_payout() {
        let mut queue = WithdrawalQueue::new();
        let a = queue.open(ValidatorId(1), 100, 0, 0, UnbondingHandle(1));
        let b = queue.open(ValidatorId(1), 40, 0, 0, UnbondingHandle(2));

        queue.record_release(a, 95).unwrap();
        assert_eq!(queue.get(a).unwrap().released_amount, Some(95));
        assert_eq!(queue.awaiting_payout(), 100);
        assert_eq!(queue.pending_withdrawals(), 140);

        queue.close(a, 95).unwrap();
        assert_eq!(queue.awaiting_payout(), 0);
        assert_eq!(queue.pending_withdrawals(), 40);
        assert!(matches!(queue.record_release(a, 95), Err(StrategyError::AlreadyWithdrawn(_))));
        assert_eq!(queue.get(b).unwrap().released_amount, None);
    }

    #[test]
    fn test_ids_never_reused() {
        let mut queue = WithdrawalQueue::new();
        let first = queue.open(ValidatorId(1), 5, 0, 0, UnbondingHandle(1));
        queue.close(first, 5).unwrap();
        let second = queue.open(ValidatorId(1), 5, 0, 0, UnbondingHandle(2));
        assert!(second > first);
        assert_eq!(queue.last_withdraw_id(), Some(second));
    }
}
