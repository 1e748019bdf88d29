//! The indexed record type and its normalization invariants.

use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single ERC-20 `Transfer` log, normalized for persistence.
///
/// Addresses and the transaction hash are lowercase `0x`-prefixed hex;
/// `value` is the exact decimal rendering of the emitted `uint256`. The
/// record is keyed by `(transaction_hash, log_index)` because one
/// transaction may emit several transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    /// Transaction hash, lowercase hex
    pub transaction_hash: String,
    /// Position of the log within its transaction
    pub log_index: u64,
    /// Block the transfer was mined in
    pub block_number: u64,
    /// Block timestamp, seconds since epoch
    pub timestamp: u64,
    /// Sender address, lowercase hex
    pub from: String,
    /// Recipient address, lowercase hex
    pub to: String,
    /// Transferred amount as a decimal string
    pub value: String,
    /// Wall-clock time the record was assembled for insertion
    pub indexed_at: DateTime<Utc>,
}

impl TransferEvent {
    /// Assemble a normalized record from decoded log fields.
    pub fn new(
        transaction_hash: B256,
        log_index: u64,
        block_number: u64,
        timestamp: u64,
        from: Address,
        to: Address,
        value: U256,
    ) -> Self {
        Self {
            transaction_hash: format!("{transaction_hash:#x}"),
            log_index,
            block_number,
            timestamp,
            from: format!("{from:#x}"),
            to: format!("{to:#x}"),
            value: value.to_string(),
            indexed_at: Utc::now(),
        }
    }
}

/// Render an address as the lowercase hex form used for filter matching.
pub fn normalize_address(address: &Address) -> String {
    format!("{address:#x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;
    use std::str::FromStr;

    #[test]
    fn normalizes_to_lowercase_hex() {
        // mixed-case on the wire; the record stores canonical lowercase
        let from = Address::from_str("0xAbCabcABCabcaBCAbcAbcABCAbCABcabcABCABca").unwrap();
        let to = Address::from_str("0xDEF1def1DEf1dEF1DeF1DEF1deF1dEf1DEf1def1").unwrap();
        let event = TransferEvent::new(
            b256!("00000000000000000000000000000000000000000000000000000000000000aa"),
            0,
            103,
            1_700_000_000,
            from,
            to,
            U256::from(42u64),
        );

        assert_eq!(event.from, "0xabcabcabcabcabcabcabcabcabcabcabcabcabca");
        assert_eq!(event.to, "0xdef1def1def1def1def1def1def1def1def1def1");
        assert!(event.transaction_hash.starts_with("0x"));
        assert_eq!(event.transaction_hash, event.transaction_hash.to_lowercase());
        assert_eq!(event.value, "42");
    }

    #[test]
    fn value_keeps_full_uint256_precision() {
        // 2^128, comfortably past what fits in a u64 or f64 mantissa
        let value = U256::from_str("340282366920938463463374607431768211456").unwrap();
        let event = TransferEvent::new(
            B256::repeat_byte(1),
            3,
            10,
            0,
            Address::ZERO,
            Address::ZERO,
            value,
        );
        assert_eq!(event.value, "340282366920938463463374607431768211456");
    }

    #[test]
    fn normalize_address_matches_event_rendering() {
        let addr = Address::from_str("0xAbCabcABCabcaBCAbcAbcABCAbCABcabcABCABca").unwrap();
        assert_eq!(normalize_address(&addr), "0xabcabcabcabcabcabcabcabcabcabcabcabcabca");
    }
}
