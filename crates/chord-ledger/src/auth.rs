//! Identity and authorization checks

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use chord_primitives::Address;
use chord_storage::LedgerReader;

/// Whether `caller` is the fixed owner
pub(crate) fn is_owner(config: &LedgerConfig, caller: &Address) -> bool {
    *caller == config.owner
}

pub(crate) fn ensure_owner(config: &LedgerConfig, caller: &Address) -> LedgerResult<()> {
    if !is_owner(config, caller) {
        return Err(LedgerError::NotOwner { caller: *caller });
    }
    Ok(())
}

/// Whether `caller` may move funds held by `from`.
///
/// An account is always its own operator; the approval table is consulted
/// only for third parties.
pub(crate) fn authorize<R: LedgerReader>(state: &R, caller: &Address, from: &Address) -> LedgerResult<bool> {
    if caller == from {
        return Ok(true);
    }
    Ok(state.is_approved(from, caller)?)
}

pub(crate) fn ensure_authorized<R: LedgerReader>(
    state: &R,
    caller: &Address,
    from: &Address,
) -> LedgerResult<()> {
    if !authorize(state, caller, from)? {
        return Err(LedgerError::InsufficientAllowance {
            operator: *caller,
            owner: *from,
        });
    }
    Ok(())
}
