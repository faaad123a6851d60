use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::schemas::{Expense, ExpenseId, Participant};

#[derive(Debug, Error, PartialEq)]
pub enum BalanceError {
    #[error("balances overflow while replaying expense {0}")]
    Overflow(ExpenseId),
}

/// One participant's equal part of `amount`, rounded half away from zero to cents.
pub fn share_of(amount: Decimal, participants: usize) -> Decimal {
    (amount / Decimal::from(participants))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Zeroes every balance and replays the whole expense history.
pub fn recompute_balances(
    mut participants: Vec<Participant>,
    expenses: &[Expense],
) -> Result<Vec<Participant>, BalanceError> {
    for participant in participants.iter_mut() {
        participant.owed = Decimal::ZERO;
        participant.receivable = Decimal::ZERO;
    }

    if participants.is_empty() {
        return Ok(participants);
    }

    let count = participants.len();
    for expense in expenses {
        let overflow = || BalanceError::Overflow(expense.id.clone());
        let share = share_of(expense.amount, count);
        let credit = expense.amount.checked_sub(share).ok_or_else(overflow)?;
        let mut credited = false;
        for participant in participants.iter_mut() {
            if participant.id == expense.payer_id {
                participant.receivable =
                    participant.receivable.checked_add(credit).ok_or_else(overflow)?;
                credited = true;
            } else {
                participant.owed = participant.owed.checked_add(share).ok_or_else(overflow)?;
            }
        }
        if !credited {
            tracing::warn!(
                expense = %expense.id,
                payer = %expense.payer_id,
                "payer is not a participant; shares charged without a matching credit"
            );
        }
    }
    Ok(participants)
}

/// Sum of `(owed, receivable)` across the roster, `None` if it does not fit.
pub fn totals(participants: &[Participant]) -> Option<(Decimal, Decimal)> {
    participants
        .iter()
        .try_fold((Decimal::ZERO, Decimal::ZERO), |(owed, receivable), p| {
            Some((owed.checked_add(p.owed)?, receivable.checked_add(p.receivable)?))
        })
}
