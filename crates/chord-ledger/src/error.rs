//! Ledger error types

use chord_primitives::{Address, Quantity, TokenId};
use chord_storage::StorageError;
use thiserror::Error;

/// Reasons a ledger operation is rejected.
///
/// Every variant aborts the whole operation; no balance, approval or event of
/// a failed call is ever observable.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Mint attempted by an account other than the owner
    #[error("caller {caller} is not the owner")]
    NotOwner {
        /// Rejected caller
        caller: Address,
    },

    /// Mint destination is the zero address
    #[error("mint to the zero address")]
    MintToZeroAddress,

    /// Transfer destination is the zero address
    #[error("transfer to the zero address")]
    TransferToZeroAddress,

    /// Query or registration on the zero address
    #[error("the zero address is not a valid account")]
    InvalidAccount,

    /// Account tried to approve itself as operator
    #[error("account {account} cannot set approval status for itself")]
    InvalidOperator {
        /// Account that named itself as operator
        account: Address,
    },

    /// Paired sequences of unequal length
    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch {
        /// Length of the first sequence
        left: usize,
        /// Length of the second sequence
        right: usize,
    },

    /// Caller is neither the holder nor an approved operator
    #[error("{operator} is not owner nor approved for {owner}")]
    InsufficientAllowance {
        /// Caller attempting the transfer
        operator: Address,
        /// Holder of the funds
        owner: Address,
    },

    /// Debit exceeds the held quantity
    #[error("insufficient balance of id {id} for {account}: required {required}, available {available}")]
    InsufficientBalance {
        /// Debited account
        account: Address,
        /// Asset class
        id: TokenId,
        /// Requested quantity
        required: Quantity,
        /// Quantity held
        available: Quantity,
    },

    /// Credit would exceed the representable quantity
    #[error("balance overflow of id {id} for {account}")]
    BalanceOverflow {
        /// Credited account
        account: Address,
        /// Asset class
        id: TokenId,
    },

    /// Mint would exceed the representable circulating supply
    #[error("total supply overflow of id {id}")]
    SupplyOverflow {
        /// Asset class
        id: TokenId,
    },

    /// Programmable recipient declined or failed the acknowledgment
    #[error("receiver {receiver} rejected tokens: {reason}")]
    ReceiverRejected {
        /// Recipient account
        receiver: Address,
        /// Decline reason or unexpected signal
        reason: String,
    },

    /// Programmable recipient exposes no acknowledgment capability
    #[error("receiver {receiver} does not implement the token receiver interface")]
    ReceiverMissingCapability {
        /// Recipient account
        receiver: Address,
    },

    /// Mutating call issued from inside an unfinished operation
    #[error("reentrant call into the ledger")]
    Reentrancy,

    /// Account kind was already registered
    #[error("account kind of {account} is already fixed")]
    AccountKindFixed {
        /// Registered account
        account: Address,
    },

    /// Storage backend error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Reject paired sequences of unequal length
pub(crate) fn ensure_same_len(left: usize, right: usize) -> LedgerResult<()> {
    if left != right {
        return Err(LedgerError::LengthMismatch { left, right });
    }
    Ok(())
}
