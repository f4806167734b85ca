//! # chord-primitives
//!
//! Primitive types for the Chord multi-asset ledger.
//!
//! Accounts are 20-byte [`Address`]es with [`Address::ZERO`] reserved as the
//! null sentinel. Asset classes and quantities are both 256-bit unsigned
//! integers; arithmetic on them is always checked by the ledger.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod error;
mod hash;

pub use address::{Address, AddressError};
pub use error::PrimitiveError;
pub use hash::{HashError, H256};

pub use primitive_types::U256;

/// Identifier of one asset class (fungible within the class)
pub type TokenId = U256;

/// Quantity of an asset class held by an account
pub type Quantity = U256;

/// Parse a 256-bit unsigned integer from decimal or `0x`-prefixed hex text
pub fn parse_u256(s: &str) -> Result<U256, PrimitiveError> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16).ok(),
        None => U256::from_dec_str(s).ok(),
    };
    parsed.ok_or_else(|| PrimitiveError::InvalidInteger(s.to_string()))
}

/// Encode a 256-bit integer as a big-endian 32-byte word
pub fn u256_to_word(value: &U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u256_decimal() {
        assert_eq!(parse_u256("10").unwrap(), U256::from(10u64));
        assert_eq!(
            parse_u256("10000000000000000000").unwrap(),
            U256::from(10_000_000_000_000_000_000u128)
        );
    }

    #[test]
    fn test_parse_u256_hex() {
        assert_eq!(parse_u256("0xff").unwrap(), U256::from(255u64));
        assert_eq!(parse_u256(" 0X10 ").unwrap(), U256::from(16u64));
    }

    #[test]
    fn test_parse_u256_rejects_garbage() {
        assert!(matches!(
            parse_u256("-1"),
            Err(PrimitiveError::InvalidInteger(_))
        ));
        assert!(parse_u256("0xzz").is_err());
        assert!(parse_u256("").is_err());
    }

    #[test]
    fn test_u256_word_is_big_endian() {
        let word = u256_to_word(&U256::from(0x0102u64));
        assert_eq!(word[30], 0x01);
        assert_eq!(word[31], 0x02);
        assert!(word[..30].iter().all(|b| *b == 0));
    }
}
