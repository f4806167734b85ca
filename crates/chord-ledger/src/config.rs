//! Construction-time configuration of a ledger

use chord_crypto::keccak256;
use chord_primitives::Address;
use rlp::RlpStream;
use serde::{Deserialize, Serialize};

/// Immutable configuration fixed when the ledger is deployed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Sole account with mint authority
    pub owner: Address,
    /// Metadata URI template, returned for every asset class
    pub uri: String,
    /// Address of the deployed ledger, used as the emitter of encoded logs
    pub address: Address,
}

impl LedgerConfig {
    /// Configuration for a ledger deployed by `owner` as its first deployment
    pub fn new(owner: Address, uri: impl Into<String>) -> Self {
        Self::deploy(owner, uri, 0)
    }

    /// Configuration for a ledger deployed by `owner` at deployment `nonce`
    pub fn deploy(owner: Address, uri: impl Into<String>, nonce: u64) -> Self {
        Self {
            owner,
            uri: uri.into(),
            address: create_address(&owner, nonce),
        }
    }
}

/// CREATE address: keccak256(RLP([deployer, nonce]))[12:]
pub fn create_address(deployer: &Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(deployer);
    stream.append(&nonce);
    let hash = keccak256(&stream.out());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(bytes)
}
