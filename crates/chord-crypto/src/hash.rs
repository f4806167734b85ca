//! Keccak-256 hashing

use chord_primitives::H256;
use sha3::{Digest, Keccak256};

/// Compute Keccak-256 hash of the input data
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    H256::from_bytes(hasher.finalize().into())
}

/// First four bytes of the hash of a canonical function signature,
/// e.g. `"onERC1155Received(address,address,uint256,uint256,bytes)"`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.as_bytes()[..4]);
    out
}

/// Topic of a canonical event signature
pub fn event_topic(signature: &str) -> H256 {
    keccak256(signature.as_bytes())
}
