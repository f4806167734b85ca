//! In-memory state: the default store, buffered change sets and the
//! read-through overlay used while an operation is in flight

use crate::error::StorageResult;
use crate::traits::{LedgerReader, LedgerStore, LedgerWriter};
use chord_primitives::{Address, Quantity, TokenId};
use std::collections::HashMap;

/// Buffered writes of one logical operation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    balances: HashMap<(Address, TokenId), Quantity>,
    supplies: HashMap<TokenId, Quantity>,
    approvals: HashMap<(Address, Address), bool>,
}

impl ChangeSet {
    /// Create an empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffered balance, if this change set wrote one
    pub fn balance(&self, account: &Address, id: &TokenId) -> Option<Quantity> {
        self.balances.get(&(*account, *id)).copied()
    }

    /// Buffered supply, if this change set wrote one
    pub fn total_supply(&self, id: &TokenId) -> Option<Quantity> {
        self.supplies.get(id).copied()
    }

    /// Buffered approval flag, if this change set wrote one
    pub fn approval(&self, account: &Address, operator: &Address) -> Option<bool> {
        self.approvals.get(&(*account, *operator)).copied()
    }

    /// Iterate buffered balances
    pub fn balances(&self) -> impl Iterator<Item = (&(Address, TokenId), &Quantity)> {
        self.balances.iter()
    }

    /// Iterate buffered supplies
    pub fn supplies(&self) -> impl Iterator<Item = (&TokenId, &Quantity)> {
        self.supplies.iter()
    }

    /// Iterate buffered approvals
    pub fn approvals(&self) -> impl Iterator<Item = (&(Address, Address), &bool)> {
        self.approvals.iter()
    }

    /// Number of buffered writes
    pub fn len(&self) -> usize {
        self.balances.len() + self.supplies.len() + self.approvals.len()
    }

    /// Check if nothing was written
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerWriter for ChangeSet {
    fn set_balance(&mut self, account: Address, id: TokenId, amount: Quantity) -> StorageResult<()> {
        self.balances.insert((account, id), amount);
        Ok(())
    }

    fn set_total_supply(&mut self, id: TokenId, amount: Quantity) -> StorageResult<()> {
        self.supplies.insert(id, amount);
        Ok(())
    }

    fn set_approval(&mut self, account: Address, operator: Address, approved: bool) -> StorageResult<()> {
        self.approvals.insert((account, operator), approved);
        Ok(())
    }
}

/// Process-local ledger store
#[derive(Debug, Default)]
pub struct MemoryStore {
    balances: HashMap<(Address, TokenId), Quantity>,
    supplies: HashMap<TokenId, Quantity>,
    approvals: HashMap<(Address, Address), bool>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of balance rows ever written
    pub fn balance_rows(&self) -> usize {
        self.balances.len()
    }
}

impl LedgerReader for MemoryStore {
    fn balance(&self, account: &Address, id: &TokenId) -> StorageResult<Quantity> {
        Ok(self.balances.get(&(*account, *id)).copied().unwrap_or_default())
    }

    fn total_supply(&self, id: &TokenId) -> StorageResult<Quantity> {
        Ok(self.supplies.get(id).copied().unwrap_or_default())
    }

    fn is_approved(&self, account: &Address, operator: &Address) -> StorageResult<bool> {
        Ok(self.approvals.get(&(*account, *operator)).copied().unwrap_or(false))
    }
}

impl LedgerWriter for MemoryStore {
    fn set_balance(&mut self, account: Address, id: TokenId, amount: Quantity) -> StorageResult<()> {
        self.balances.insert((account, id), amount);
        Ok(())
    }

    fn set_total_supply(&mut self, id: TokenId, amount: Quantity) -> StorageResult<()> {
        self.supplies.insert(id, amount);
        Ok(())
    }

    fn set_approval(&mut self, account: Address, operator: Address, approved: bool) -> StorageResult<()> {
        self.approvals.insert((account, operator), approved);
        Ok(())
    }
}

impl LedgerStore for MemoryStore {
    fn commit(&mut self, changes: &ChangeSet) -> StorageResult<()> {
        // Infallible, so applying in sequence is already all-or-nothing.
        self.balances
            .extend(changes.balances.iter().map(|(k, v)| (*k, *v)));
        self.supplies
            .extend(changes.supplies.iter().map(|(k, v)| (*k, *v)));
        self.approvals
            .extend(changes.approvals.iter().map(|(k, v)| (*k, *v)));
        Ok(())
    }
}

/// Layered state: writes go to a [`ChangeSet`], reads fall back to `base`
pub struct PendingState<R> {
    changes: ChangeSet,
    base: R,
}

impl<R: LedgerReader> PendingState<R> {
    /// Create a new overlay over `base`
    pub fn new(base: R) -> Self {
        Self {
            changes: ChangeSet::new(),
            base,
        }
    }

    /// Buffered writes so far
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Take ownership of the buffered writes
    pub fn into_changes(self) -> ChangeSet {
        self.changes
    }
}

impl<R: LedgerReader> LedgerReader for PendingState<R> {
    fn balance(&self, account: &Address, id: &TokenId) -> StorageResult<Quantity> {
        match self.changes.balance(account, id) {
            Some(amount) => Ok(amount),
            None => self.base.balance(account, id),
        }
    }

    fn total_supply(&self, id: &TokenId) -> StorageResult<Quantity> {
        match self.changes.total_supply(id) {
            Some(amount) => Ok(amount),
            None => self.base.total_supply(id),
        }
    }

    fn is_approved(&self, account: &Address, operator: &Address) -> StorageResult<bool> {
        match self.changes.approval(account, operator) {
            Some(approved) => Ok(approved),
            None => self.base.is_approved(account, operator),
        }
    }
}

impl<R: LedgerReader> LedgerWriter for PendingState<R> {
    fn set_balance(&mut self, account: Address, id: TokenId, amount: Quantity) -> StorageResult<()> {
        self.changes.set_balance(account, id, amount)
    }

    fn set_total_supply(&mut self, id: TokenId, amount: Quantity) -> StorageResult<()> {
        self.changes.set_total_supply(id, amount)
    }

    fn set_approval(&mut self, account: Address, operator: Address, approved: bool) -> StorageResult<()> {
        self.changes.set_approval(account, operator, approved)
    }
}
