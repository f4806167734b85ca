//! Receiver acknowledgment protocol.
//!
//! Accounts are either [`AccountKind::Plain`], which always accept incoming
//! assets, or [`AccountKind::Programmable`], which must confirm every mint or
//! transfer into them before it is committed.

use crate::error::{LedgerError, LedgerResult};
use chord_primitives::{Address, Quantity, TokenId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Acceptance signal for single transfers:
/// `keccak256("onERC1155Received(address,address,uint256,uint256,bytes)")[:4]`
pub const RECEIVED_SELECTOR: [u8; 4] = [0xf2, 0x3a, 0x6e, 0x61];

/// Acceptance signal for batch transfers:
/// `keccak256("onERC1155BatchReceived(address,address,uint256[],uint256[],bytes)")[:4]`
pub const BATCH_RECEIVED_SELECTOR: [u8; 4] = [0xbc, 0x19, 0x7c, 0x81];

/// Error raised by a receiver while handling an acknowledgment
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// The receiver refuses the assets
    #[error("declined: {0}")]
    Declined(String),

    /// The receiver failed while executing
    #[error("execution failed: {0}")]
    Failed(String),

    /// A nested ledger call made by the receiver failed
    #[error("nested ledger call failed: {0}")]
    Ledger(#[from] LedgerError),
}

/// Capability to accept incoming assets.
///
/// Returning anything other than the matching selector counts as a rejection.
pub trait TokenReceiver: Send + Sync {
    /// Called after a single-class mint or transfer into this account
    fn on_received(
        &self,
        operator: &Address,
        from: &Address,
        id: &TokenId,
        amount: &Quantity,
        data: &[u8],
    ) -> Result<[u8; 4], ReceiverError>;

    /// Called after a batched mint or transfer into this account
    fn on_batch_received(
        &self,
        operator: &Address,
        from: &Address,
        ids: &[TokenId],
        amounts: &[Quantity],
        data: &[u8],
    ) -> Result<[u8; 4], ReceiverError>;
}

impl<T: TokenReceiver + ?Sized> TokenReceiver for Arc<T> {
    fn on_received(
        &self,
        operator: &Address,
        from: &Address,
        id: &TokenId,
        amount: &Quantity,
        data: &[u8],
    ) -> Result<[u8; 4], ReceiverError> {
        (**self).on_received(operator, from, id, amount, data)
    }

    fn on_batch_received(
        &self,
        operator: &Address,
        from: &Address,
        ids: &[TokenId],
        amounts: &[Quantity],
        data: &[u8],
    ) -> Result<[u8; 4], ReceiverError> {
        (**self).on_batch_received(operator, from, ids, amounts, data)
    }
}

/// How an account reacts to incoming assets
#[derive(Clone, Default)]
pub enum AccountKind {
    /// No executable behavior; always accepts
    #[default]
    Plain,
    /// Executable account; `None` means it lacks the receiver capability
    Programmable(Option<Arc<dyn TokenReceiver>>),
}

impl AccountKind {
    /// Programmable account backed by `receiver`
    pub fn programmable(receiver: impl TokenReceiver + 'static) -> Self {
        AccountKind::Programmable(Some(Arc::new(receiver)))
    }

    /// Programmable account without the receiver capability
    pub fn incapable() -> Self {
        AccountKind::Programmable(None)
    }

    /// Whether transfers into this account need acknowledgment
    pub fn is_programmable(&self) -> bool {
        matches!(self, AccountKind::Programmable(_))
    }
}

impl fmt::Debug for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountKind::Plain => f.write_str("Plain"),
            AccountKind::Programmable(Some(_)) => f.write_str("Programmable"),
            AccountKind::Programmable(None) => f.write_str("Programmable(incapable)"),
        }
    }
}

/// Fixed account kinds; unregistered accounts are plain
#[derive(Default)]
pub(crate) struct AccountRegistry {
    kinds: HashMap<Address, AccountKind>,
}

impl AccountRegistry {
    pub(crate) fn register(&mut self, account: Address, kind: AccountKind) -> LedgerResult<()> {
        if account.is_zero() {
            return Err(LedgerError::InvalidAccount);
        }
        if self.kinds.contains_key(&account) {
            return Err(LedgerError::AccountKindFixed { account });
        }
        self.kinds.insert(account, kind);
        Ok(())
    }

    pub(crate) fn kind_of(&self, account: &Address) -> AccountKind {
        self.kinds.get(account).cloned().unwrap_or_default()
    }
}

/// Incoming assets awaiting acknowledgment
pub(crate) enum Incoming<'a> {
    Single {
        id: &'a TokenId,
        amount: &'a Quantity,
    },
    Batch {
        ids: &'a [TokenId],
        amounts: &'a [Quantity],
    },
}

/// Run the handshake with `to`; any outcome but the exact signal fails
pub(crate) fn acknowledge(
    kind: &AccountKind,
    operator: &Address,
    from: &Address,
    to: &Address,
    incoming: Incoming<'_>,
    data: &[u8],
) -> LedgerResult<()> {
    let receiver = match kind {
        AccountKind::Plain => return Ok(()),
        AccountKind::Programmable(None) => {
            return Err(LedgerError::ReceiverMissingCapability { receiver: *to })
        }
        AccountKind::Programmable(Some(receiver)) => receiver,
    };

    let (outcome, expected) = match incoming {
        Incoming::Single { id, amount } => (
            receiver.on_received(operator, from, id, amount, data),
            RECEIVED_SELECTOR,
        ),
        Incoming::Batch { ids, amounts } => (
            receiver.on_batch_received(operator, from, ids, amounts, data),
            BATCH_RECEIVED_SELECTOR,
        ),
    };

    let reason = match outcome {
        Ok(signal) if signal == expected => return Ok(()),
        Ok(signal) => format!("unexpected acknowledgment 0x{}", hex::encode(signal)),
        Err(e) => e.to_string(),
    };
    tracing::warn!(receiver = %to, %reason, "receiver rejected incoming assets");
    Err(LedgerError::ReceiverRejected {
        receiver: *to,
        reason,
    })
}

/// Receiver that accepts everything
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptingReceiver;

impl TokenReceiver for AcceptingReceiver {
    fn on_received(
        &self,
        _operator: &Address,
        _from: &Address,
        _id: &TokenId,
        _amount: &Quantity,
        _data: &[u8],
    ) -> Result<[u8; 4], ReceiverError> {
        Ok(RECEIVED_SELECTOR)
    }

    fn on_batch_received(
        &self,
        _operator: &Address,
        _from: &Address,
        _ids: &[TokenId],
        _amounts: &[Quantity],
        _data: &[u8],
    ) -> Result<[u8; 4], ReceiverError> {
        Ok(BATCH_RECEIVED_SELECTOR)
    }
}

/// Receiver that declines everything
#[derive(Clone, Copy, Debug, Default)]
pub struct RejectingReceiver;

impl TokenReceiver for RejectingReceiver {
    fn on_received(
        &self,
        _operator: &Address,
        _from: &Address,
        _id: &TokenId,
        _amount: &Quantity,
        _data: &[u8],
    ) -> Result<[u8; 4], ReceiverError> {
        Err(ReceiverError::Declined("receiver does not accept tokens".into()))
    }

    fn on_batch_received(
        &self,
        _operator: &Address,
        _from: &Address,
        _ids: &[TokenId],
        _amounts: &[Quantity],
        _data: &[u8],
    ) -> Result<[u8; 4], ReceiverError> {
        Err(ReceiverError::Declined("receiver does not accept tokens".into()))
    }
}

/// Receiver whose execution always fails
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingReceiver;

impl TokenReceiver for FailingReceiver {
    fn on_received(
        &self,
        _operator: &Address,
        _from: &Address,
        _id: &TokenId,
        _amount: &Quantity,
        _data: &[u8],
    ) -> Result<[u8; 4], ReceiverError> {
        Err(ReceiverError::Failed("receiver execution reverted".into()))
    }

    fn on_batch_received(
        &self,
        _operator: &Address,
        _from: &Address,
        _ids: &[TokenId],
        _amounts: &[Quantity],
        _data: &[u8],
    ) -> Result<[u8; 4], ReceiverError> {
        Err(ReceiverError::Failed("receiver execution reverted".into()))
    }
}
