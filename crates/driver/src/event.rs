//! Normalization of raw Transfer logs into indexed records.

use alloy::rpc::types::Log;
use eyre::{eyre, Result};
use gateway::erc20::Transfer;
use primitives::TransferEvent;

/// Decode a raw log into a normalized [`TransferEvent`].
///
/// The log must carry its positional metadata; pending logs without a
/// block number or transaction hash are rejected.
pub fn decode_transfer(log: &Log, timestamp: u64) -> Result<TransferEvent> {
    let decoded = log.log_decode::<Transfer>()?;
    let data = decoded.data();

    let transaction_hash =
        log.transaction_hash.ok_or_else(|| eyre!("log missing transaction hash"))?;
    let log_index = log.log_index.ok_or_else(|| eyre!("log missing log index"))?;
    let block_number = log.block_number.ok_or_else(|| eyre!("log missing block number"))?;

    Ok(TransferEvent::new(
        transaction_hash,
        log_index,
        block_number,
        timestamp,
        data.from,
        data.to,
        data.value,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolEvent;
    use alloy_primitives::{Address, Log as PrimitiveLog, B256, U256};
    use std::str::FromStr;

    fn encoded_log(event: Transfer) -> Log {
        let primitive = PrimitiveLog { address: Address::ZERO, data: event };
        let encoded = Transfer::encode_log(&primitive);
        Log {
            inner: encoded,
            transaction_hash: Some(B256::repeat_byte(0xaa)),
            log_index: Some(0),
            block_number: Some(103),
            ..Default::default()
        }
    }

    #[test]
    fn decodes_and_normalizes_a_transfer() {
        let log = encoded_log(Transfer {
            from: Address::from_str("0xAbCabcABCabcaBCAbcAbcABCAbCABcabcABCABca").unwrap(),
            to: Address::from_str("0xDEF1def1DEf1dEF1DeF1DEF1deF1dEf1DEf1def1").unwrap(),
            value: U256::from(42u64),
        });

        let event = decode_transfer(&log, 1_700_000_000).unwrap();
        assert_eq!(event.from, "0xabcabcabcabcabcabcabcabcabcabcabcabcabca");
        assert_eq!(event.to, "0xdef1def1def1def1def1def1def1def1def1def1");
        assert_eq!(event.value, "42");
        assert_eq!(event.block_number, 103);
        assert_eq!(event.log_index, 0);
        assert_eq!(event.timestamp, 1_700_000_000);
        assert_eq!(
            event.transaction_hash,
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        );
    }

    #[test]
    fn rejects_logs_without_positional_metadata() {
        let mut log = encoded_log(Transfer {
            from: Address::ZERO,
            to: Address::ZERO,
            value: U256::ZERO,
        });
        log.transaction_hash = None;
        assert!(decode_transfer(&log, 0).is_err());
    }
}
