//! Storage traits for ledger state access

use crate::error::StorageResult;
use crate::state::ChangeSet;
use chord_primitives::{Address, Quantity, TokenId};

/// Read access to ledger state.
///
/// Missing entries read as zero / not approved; no backend needs to store
/// zero balances.
pub trait LedgerReader {
    /// Quantity of `id` held by `account`
    fn balance(&self, account: &Address, id: &TokenId) -> StorageResult<Quantity>;

    /// Total quantity of `id` in circulation
    fn total_supply(&self, id: &TokenId) -> StorageResult<Quantity>;

    /// Whether `operator` may move every asset class held by `account`
    fn is_approved(&self, account: &Address, operator: &Address) -> StorageResult<bool>;
}

/// Write access to ledger state
pub trait LedgerWriter {
    /// Overwrite the balance of (`account`, `id`)
    fn set_balance(&mut self, account: Address, id: TokenId, amount: Quantity) -> StorageResult<()>;

    /// Overwrite the circulating supply of `id`
    fn set_total_supply(&mut self, id: TokenId, amount: Quantity) -> StorageResult<()>;

    /// Set the operator approval flag of (`account`, `operator`)
    fn set_approval(&mut self, account: Address, operator: Address, approved: bool) -> StorageResult<()>;
}

/// Combined read/write state access
pub trait State: LedgerReader + LedgerWriter {}

impl<T: LedgerReader + LedgerWriter> State for T {}

/// A backend the ledger can own.
///
/// `commit` must apply the whole change set or nothing.
pub trait LedgerStore: LedgerReader + Send + Sync {
    /// Apply a buffered change set atomically
    fn commit(&mut self, changes: &ChangeSet) -> StorageResult<()>;
}

impl<T: LedgerReader + ?Sized> LedgerReader for &T {
    fn balance(&self, account: &Address, id: &TokenId) -> StorageResult<Quantity> {
        (**self).balance(account, id)
    }

    fn total_supply(&self, id: &TokenId) -> StorageResult<Quantity> {
        (**self).total_supply(id)
    }

    fn is_approved(&self, account: &Address, operator: &Address) -> StorageResult<bool> {
        (**self).is_approved(account, operator)
    }
}
