//! Ledger events, receipts and their Ethereum-style log encoding

use bytes::Bytes;
use chord_crypto::event_topic;
use chord_primitives::{u256_to_word, Address, Quantity, TokenId, H256, U256};
use serde::Serialize;

/// `TransferSingle(address,address,address,uint256,uint256)`
pub const TRANSFER_SINGLE_SIGNATURE: &str =
    "TransferSingle(address,address,address,uint256,uint256)";

/// `TransferBatch(address,address,address,uint256[],uint256[])`
pub const TRANSFER_BATCH_SIGNATURE: &str =
    "TransferBatch(address,address,address,uint256[],uint256[])";

/// `ApprovalForAll(address,address,bool)`
pub const APPROVAL_FOR_ALL_SIGNATURE: &str = "ApprovalForAll(address,address,bool)";

/// A committed state transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    /// Single asset class minted
    Minted {
        /// Caller that minted
        operator: Address,
        /// Recipient
        to: Address,
        /// Asset class
        id: TokenId,
        /// Minted quantity
        amount: Quantity,
    },
    /// Several asset classes minted in one call
    MintedBatch {
        /// Caller that minted
        operator: Address,
        /// Recipient
        to: Address,
        /// Asset classes, in call order
        ids: Vec<TokenId>,
        /// Quantities, paired with `ids`
        amounts: Vec<Quantity>,
    },
    /// Single asset class transferred
    Transferred {
        /// Caller that moved the funds
        operator: Address,
        /// Debited holder
        from: Address,
        /// Recipient
        to: Address,
        /// Asset class
        id: TokenId,
        /// Transferred quantity
        amount: Quantity,
    },
    /// Several asset classes transferred in one call
    TransferredBatch {
        /// Caller that moved the funds
        operator: Address,
        /// Debited holder
        from: Address,
        /// Recipient
        to: Address,
        /// Asset classes, in call order
        ids: Vec<TokenId>,
        /// Quantities, paired with `ids`
        amounts: Vec<Quantity>,
    },
    /// Operator approval set or revoked
    ApprovalChanged {
        /// Account granting the approval
        account: Address,
        /// Operator
        operator: Address,
        /// New approval flag
        approved: bool,
    },
}

impl LedgerEvent {
    /// Name of the Ethereum event this encodes to
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::Minted { .. } | LedgerEvent::Transferred { .. } => "TransferSingle",
            LedgerEvent::MintedBatch { .. } | LedgerEvent::TransferredBatch { .. } => {
                "TransferBatch"
            }
            LedgerEvent::ApprovalChanged { .. } => "ApprovalForAll",
        }
    }

    /// Encode as a log emitted by the ledger at `emitter`.
    ///
    /// Mints encode with the zero address as `from`.
    pub fn to_log(&self, emitter: Address) -> Log {
        match self {
            LedgerEvent::Minted { operator, to, id, amount } => {
                single_log(emitter, operator, &Address::ZERO, to, id, amount)
            }
            LedgerEvent::Transferred { operator, from, to, id, amount } => {
                single_log(emitter, operator, from, to, id, amount)
            }
            LedgerEvent::MintedBatch { operator, to, ids, amounts } => {
                batch_log(emitter, operator, &Address::ZERO, to, ids, amounts)
            }
            LedgerEvent::TransferredBatch { operator, from, to, ids, amounts } => {
                batch_log(emitter, operator, from, to, ids, amounts)
            }
            LedgerEvent::ApprovalChanged { account, operator, approved } => {
                let mut word = [0u8; 32];
                word[31] = *approved as u8;
                Log::new(
                    emitter,
                    vec![
                        event_topic(APPROVAL_FOR_ALL_SIGNATURE),
                        H256::from_bytes(account.to_word()),
                        H256::from_bytes(operator.to_word()),
                    ],
                    Bytes::copy_from_slice(&word),
                )
            }
        }
    }
}

fn transfer_topics(signature: &str, operator: &Address, from: &Address, to: &Address) -> Vec<H256> {
    vec![
        event_topic(signature),
        H256::from_bytes(operator.to_word()),
        H256::from_bytes(from.to_word()),
        H256::from_bytes(to.to_word()),
    ]
}

fn single_log(
    emitter: Address,
    operator: &Address,
    from: &Address,
    to: &Address,
    id: &TokenId,
    amount: &Quantity,
) -> Log {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(&u256_to_word(id));
    data.extend_from_slice(&u256_to_word(amount));
    Log::new(
        emitter,
        transfer_topics(TRANSFER_SINGLE_SIGNATURE, operator, from, to),
        data.into(),
    )
}

fn batch_log(
    emitter: Address,
    operator: &Address,
    from: &Address,
    to: &Address,
    ids: &[TokenId],
    amounts: &[Quantity],
) -> Log {
    // Two dynamic arrays: head holds both offsets, tail holds length-prefixed elements.
    let ids_offset = 64usize;
    let amounts_offset = ids_offset + 32 * (1 + ids.len());

    let mut data = Vec::with_capacity(amounts_offset + 32 * (1 + amounts.len()));
    data.extend_from_slice(&u256_to_word(&U256::from(ids_offset)));
    data.extend_from_slice(&u256_to_word(&U256::from(amounts_offset)));
    for array in [ids, amounts] {
        data.extend_from_slice(&u256_to_word(&U256::from(array.len())));
        for value in array {
            data.extend_from_slice(&u256_to_word(value));
        }
    }

    Log::new(
        emitter,
        transfer_topics(TRANSFER_BATCH_SIGNATURE, operator, from, to),
        data.into(),
    )
}

/// Log entry in Ethereum layout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Log {
    /// Emitting ledger address
    pub address: Address,
    /// Event signature topic followed by indexed parameters
    pub topics: Vec<H256>,
    /// ABI-encoded non-indexed parameters
    pub data: Bytes,
}

impl Log {
    /// Create a new log entry
    pub fn new(address: Address, topics: Vec<H256>, data: Bytes) -> Self {
        Self {
            address,
            topics,
            data,
        }
    }

    /// Event signature topic
    pub fn topic0(&self) -> Option<&H256> {
        self.topics.first()
    }
}

/// Result of a successful mutating operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Receipt {
    /// Address of the ledger that produced the events
    pub ledger: Address,
    /// Events, in emission order
    pub events: Vec<LedgerEvent>,
}

impl Receipt {
    pub(crate) fn new(ledger: Address, events: Vec<LedgerEvent>) -> Self {
        Self { ledger, events }
    }

    /// The first event, which for every ledger operation is its only one
    pub fn event(&self) -> Option<&LedgerEvent> {
        self.events.first()
    }

    /// Events encoded as logs
    pub fn logs(&self) -> Vec<Log> {
        self.events.iter().map(|e| e.to_log(self.ledger)).collect()
    }
}
