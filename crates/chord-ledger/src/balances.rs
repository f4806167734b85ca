//! Balance primitives.
//!
//! `credit`, `debit` and `issue` are the only code paths that change
//! balances or supply. All arithmetic is checked. A zero amount writes
//! nothing, so rows only appear on the first non-zero write.

use crate::error::{LedgerError, LedgerResult};
use chord_primitives::{Address, Quantity, TokenId};
use chord_storage::State;

pub(crate) fn credit<S: State>(
    state: &mut S,
    account: &Address,
    id: &TokenId,
    amount: Quantity,
) -> LedgerResult<()> {
    if amount.is_zero() {
        return Ok(());
    }
    let current = state.balance(account, id)?;
    let updated = current
        .checked_add(amount)
        .ok_or(LedgerError::BalanceOverflow {
            account: *account,
            id: *id,
        })?;
    state.set_balance(*account, *id, updated)?;
    Ok(())
}

pub(crate) fn debit<S: State>(
    state: &mut S,
    account: &Address,
    id: &TokenId,
    amount: Quantity,
) -> LedgerResult<()> {
    if amount.is_zero() {
        return Ok(());
    }
    let current = state.balance(account, id)?;
    let updated = current
        .checked_sub(amount)
        .ok_or(LedgerError::InsufficientBalance {
            account: *account,
            id: *id,
            required: amount,
            available: current,
        })?;
    state.set_balance(*account, *id, updated)?;
    Ok(())
}

/// Grow circulating supply of `id` and credit the recipient
pub(crate) fn issue<S: State>(
    state: &mut S,
    to: &Address,
    id: &TokenId,
    amount: Quantity,
) -> LedgerResult<()> {
    if amount.is_zero() {
        return Ok(());
    }
    let supply = state.total_supply(id)?;
    let updated = supply
        .checked_add(amount)
        .ok_or(LedgerError::SupplyOverflow { id: *id })?;
    state.set_total_supply(*id, updated)?;
    credit(state, to, id, amount)
}
