//! The ledger engine

use crate::auth;
use crate::balances;
use crate::config::LedgerConfig;
use crate::error::{ensure_same_len, LedgerError, LedgerResult};
use crate::events::{LedgerEvent, Receipt};
use crate::lock::OperationLock;
use crate::receiver::{self, AccountKind, AccountRegistry, Incoming};
use chord_primitives::{Address, Quantity, TokenId};
use chord_storage::{
    ChangeSet, LedgerReader, LedgerStore, LedgerWriter, MemoryStore, PendingState, StorageResult,
};
use parking_lot::{RwLock, RwLockReadGuard};

/// Multi-asset ledger.
///
/// Mutating operations are serialized; each one buffers its writes in a
/// [`PendingState`] over the committed store, runs the receiver handshake if
/// needed, and only then commits.
///
/// While a receiver acknowledges, the operation's buffered writes are parked
/// on the ledger. Reads from the operation's own thread (the receiver's
/// callbacks) see them; reads from any other thread see the last committed
/// state.
pub struct Ledger<S = MemoryStore> {
    config: LedgerConfig,
    store: RwLock<S>,
    accounts: RwLock<AccountRegistry>,
    lock: OperationLock,
    in_flight: RwLock<Option<ChangeSet>>,
}

/// Read view of the committed store, locking per lookup so that no store
/// lock is held while a receiver runs
struct Committed<'a, S>(&'a RwLock<S>);

impl<S: LedgerReader> LedgerReader for Committed<'_, S> {
    fn balance(&self, account: &Address, id: &TokenId) -> StorageResult<Quantity> {
        self.0.read().balance(account, id)
    }

    fn total_supply(&self, id: &TokenId) -> StorageResult<Quantity> {
        self.0.read().total_supply(id)
    }

    fn is_approved(&self, account: &Address, operator: &Address) -> StorageResult<bool> {
        self.0.read().is_approved(account, operator)
    }
}

/// Committed state, overlaid with the in-flight writes when the reading
/// thread is the one running the operation
struct View<'a, S> {
    committed: Committed<'a, S>,
    pending: Option<RwLockReadGuard<'a, Option<ChangeSet>>>,
}

impl<S> View<'_, S> {
    fn pending(&self) -> Option<&ChangeSet> {
        self.pending.as_ref().and_then(|guard| guard.as_ref())
    }
}

impl<S: LedgerReader> LedgerReader for View<'_, S> {
    fn balance(&self, account: &Address, id: &TokenId) -> StorageResult<Quantity> {
        match self.pending().and_then(|c| c.balance(account, id)) {
            Some(balance) => Ok(balance),
            None => self.committed.balance(account, id),
        }
    }

    fn total_supply(&self, id: &TokenId) -> StorageResult<Quantity> {
        match self.pending().and_then(|c| c.total_supply(id)) {
            Some(supply) => Ok(supply),
            None => self.committed.total_supply(id),
        }
    }

    fn is_approved(&self, account: &Address, operator: &Address) -> StorageResult<bool> {
        match self.pending().and_then(|c| c.approval(account, operator)) {
            Some(approved) => Ok(approved),
            None => self.committed.is_approved(account, operator),
        }
    }
}

impl Ledger<MemoryStore> {
    /// Create an in-memory ledger
    pub fn new(config: LedgerConfig) -> Self {
        Self::with_store(config, MemoryStore::new())
    }
}

impl<S: LedgerStore> Ledger<S> {
    /// Create a ledger over an existing store
    pub fn with_store(config: LedgerConfig, store: S) -> Self {
        tracing::info!(
            ledger = %config.address,
            owner = %config.owner,
            uri = %config.uri,
            "ledger ready"
        );
        Self {
            config,
            store: RwLock::new(store),
            accounts: RwLock::new(AccountRegistry::default()),
            lock: OperationLock::default(),
            in_flight: RwLock::new(None),
        }
    }

    /// Construction-time configuration
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Account with mint authority
    pub fn owner(&self) -> Address {
        self.config.owner
    }

    /// Address of this ledger
    pub fn address(&self) -> Address {
        self.config.address
    }

    /// Whether a mutating operation is currently in flight
    pub fn operation_in_progress(&self) -> bool {
        self.lock.in_progress()
    }

    /// Shared access to the underlying store
    pub fn store(&self) -> RwLockReadGuard<'_, S> {
        self.store.read()
    }

    /// Consume the ledger, returning its store
    pub fn into_store(self) -> S {
        self.store.into_inner()
    }

    // ==================== Identity & authorization ====================

    /// True iff `caller` is the owner
    pub fn is_owner(&self, caller: &Address) -> bool {
        auth::is_owner(&self.config, caller)
    }

    /// Whether `operator` is approved for every asset class of `account`
    pub fn is_approved_for_all(&self, account: &Address, operator: &Address) -> LedgerResult<bool> {
        Ok(self.view().is_approved(account, operator)?)
    }

    /// Whether `caller` may move funds held by `from`
    pub fn authorize(&self, caller: &Address, from: &Address) -> LedgerResult<bool> {
        auth::authorize(&self.view(), caller, from)
    }

    /// Grant or revoke `operator` for all asset classes of `caller`.
    ///
    /// Naming oneself as operator is rejected with
    /// [`LedgerError::InvalidOperator`]; an account is implicitly its own
    /// operator already.
    pub fn set_approval_for_all(
        &self,
        caller: Address,
        operator: Address,
        approved: bool,
    ) -> LedgerResult<Receipt> {
        let _op = self.lock.enter()?;
        if caller == operator {
            return Err(LedgerError::InvalidOperator { account: caller });
        }

        let mut changes = ChangeSet::new();
        changes.set_approval(caller, operator, approved)?;
        self.commit(&changes)?;

        tracing::debug!(account = %caller, operator = %operator, approved, "approval changed");
        Ok(self.receipt(LedgerEvent::ApprovalChanged {
            account: caller,
            operator,
            approved,
        }))
    }

    // ==================== Balance queries ====================

    /// Quantity of `id` held by `account`
    pub fn balance_of(&self, account: &Address, id: &TokenId) -> LedgerResult<Quantity> {
        if account.is_zero() {
            return Err(LedgerError::InvalidAccount);
        }
        Ok(self.view().balance(account, id)?)
    }

    /// Pairwise `balance_of`, in input order
    pub fn balance_of_batch(&self, accounts: &[Address], ids: &[TokenId]) -> LedgerResult<Vec<Quantity>> {
        ensure_same_len(accounts.len(), ids.len())?;
        accounts
            .iter()
            .zip(ids)
            .map(|(account, id)| self.balance_of(account, id))
            .collect()
    }

    /// Circulating quantity of `id`
    pub fn total_supply(&self, id: &TokenId) -> LedgerResult<Quantity> {
        Ok(self.view().total_supply(id)?)
    }

    /// Whether any quantity of `id` has been minted
    pub fn exists(&self, id: &TokenId) -> LedgerResult<bool> {
        Ok(!self.total_supply(id)?.is_zero())
    }

    /// Metadata URI template; the same for every asset class
    pub fn uri(&self, _id: &TokenId) -> &str {
        &self.config.uri
    }

    // ==================== Account kinds ====================

    /// Fix how `account` reacts to incoming assets. Allowed once per account.
    pub fn register_account(&self, account: Address, kind: AccountKind) -> LedgerResult<()> {
        let _op = self.lock.enter()?;
        let programmable = kind.is_programmable();
        self.accounts.write().register(account, kind)?;
        tracing::debug!(%account, programmable, "account kind registered");
        Ok(())
    }

    /// Kind of `account`; plain unless registered otherwise
    pub fn account_kind(&self, account: &Address) -> AccountKind {
        self.accounts.read().kind_of(account)
    }

    // ==================== Mint ====================

    /// Create `amount` of `id` for `to`. Owner only.
    pub fn mint(
        &self,
        caller: Address,
        to: Address,
        id: TokenId,
        amount: Quantity,
        data: &[u8],
    ) -> LedgerResult<Receipt> {
        let _op = self.lock.enter()?;
        auth::ensure_owner(&self.config, &caller)?;
        if to.is_zero() {
            return Err(LedgerError::MintToZeroAddress);
        }

        let mut state = PendingState::new(self.committed());
        balances::issue(&mut state, &to, &id, amount)?;
        self.settle(
            state.into_changes(),
            &caller,
            &Address::ZERO,
            &to,
            Incoming::Single { id: &id, amount: &amount },
            data,
        )?;

        tracing::debug!(operator = %caller, %to, %id, %amount, "minted");
        Ok(self.receipt(LedgerEvent::Minted {
            operator: caller,
            to,
            id,
            amount,
        }))
    }

    /// Create several asset classes for `to` in one atomic step. Owner only.
    pub fn mint_batch(
        &self,
        caller: Address,
        to: Address,
        ids: Vec<TokenId>,
        amounts: Vec<Quantity>,
        data: &[u8],
    ) -> LedgerResult<Receipt> {
        let _op = self.lock.enter()?;
        auth::ensure_owner(&self.config, &caller)?;
        if to.is_zero() {
            return Err(LedgerError::MintToZeroAddress);
        }
        ensure_same_len(ids.len(), amounts.len())?;

        let mut state = PendingState::new(self.committed());
        for (id, amount) in ids.iter().zip(&amounts) {
            balances::issue(&mut state, &to, id, *amount)?;
        }
        self.settle(
            state.into_changes(),
            &caller,
            &Address::ZERO,
            &to,
            Incoming::Batch { ids: &ids, amounts: &amounts },
            data,
        )?;

        tracing::debug!(operator = %caller, %to, classes = ids.len(), "minted batch");
        Ok(self.receipt(LedgerEvent::MintedBatch {
            operator: caller,
            to,
            ids,
            amounts,
        }))
    }

    // ==================== Transfer ====================

    /// Move `amount` of `id` from `from` to `to`.
    ///
    /// `caller` must be `from` or an operator approved by `from`.
    pub fn safe_transfer_from(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        id: TokenId,
        amount: Quantity,
        data: &[u8],
    ) -> LedgerResult<Receipt> {
        let _op = self.lock.enter()?;
        auth::ensure_authorized(&self.committed(), &caller, &from)?;
        if to.is_zero() {
            return Err(LedgerError::TransferToZeroAddress);
        }

        let mut state = PendingState::new(self.committed());
        balances::debit(&mut state, &from, &id, amount)?;
        balances::credit(&mut state, &to, &id, amount)?;
        self.settle(
            state.into_changes(),
            &caller,
            &from,
            &to,
            Incoming::Single { id: &id, amount: &amount },
            data,
        )?;

        tracing::debug!(operator = %caller, %from, %to, %id, %amount, "transferred");
        Ok(self.receipt(LedgerEvent::Transferred {
            operator: caller,
            from,
            to,
            id,
            amount,
        }))
    }

    /// Move several asset classes from `from` to `to` in one atomic step.
    ///
    /// Pairs are applied in input order; a repeated id is debited against the
    /// balance left by the earlier pairs.
    pub fn safe_batch_transfer_from(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        ids: Vec<TokenId>,
        amounts: Vec<Quantity>,
        data: &[u8],
    ) -> LedgerResult<Receipt> {
        let _op = self.lock.enter()?;
        auth::ensure_authorized(&self.committed(), &caller, &from)?;
        ensure_same_len(ids.len(), amounts.len())?;
        if to.is_zero() {
            return Err(LedgerError::TransferToZeroAddress);
        }

        let mut state = PendingState::new(self.committed());
        for (id, amount) in ids.iter().zip(&amounts) {
            balances::debit(&mut state, &from, id, *amount)?;
            balances::credit(&mut state, &to, id, *amount)?;
        }
        self.settle(
            state.into_changes(),
            &caller,
            &from,
            &to,
            Incoming::Batch { ids: &ids, amounts: &amounts },
            data,
        )?;

        tracing::debug!(operator = %caller, %from, %to, classes = ids.len(), "transferred batch");
        Ok(self.receipt(LedgerEvent::TransferredBatch {
            operator: caller,
            from,
            to,
            ids,
            amounts,
        }))
    }

    // ==================== Internals ====================

    fn committed(&self) -> Committed<'_, S> {
        Committed(&self.store)
    }

    fn view(&self) -> View<'_, S> {
        let pending = self
            .lock
            .held_by_current_thread()
            .then(|| self.in_flight.read());
        View {
            committed: self.committed(),
            pending,
        }
    }

    /// Run the handshake with `changes` visible to the receiver, then commit
    /// them if it accepted. On refusal the changes are dropped.
    fn settle(
        &self,
        changes: ChangeSet,
        operator: &Address,
        from: &Address,
        to: &Address,
        incoming: Incoming<'_>,
        data: &[u8],
    ) -> LedgerResult<()> {
        // Clone the kind out so the registry is unlocked while the receiver runs.
        let kind = self.account_kind(to);
        *self.in_flight.write() = Some(changes);
        let acknowledged = receiver::acknowledge(&kind, operator, from, to, incoming, data);
        let changes = self.in_flight.write().take().unwrap_or_default();
        acknowledged?;
        self.commit(&changes)
    }

    fn commit(&self, changes: &ChangeSet) -> LedgerResult<()> {
        self.store.write().commit(changes)?;
        Ok(())
    }

    fn receipt(&self, event: LedgerEvent) -> Receipt {
        Receipt::new(self.config.address, vec![event])
    }
}
