//! Typed helpers over the raw JSON-RPC gateway.

use alloy::{rpc::types::Log, sol_types::SolEvent};
use alloy_primitives::Address;
use serde_json::{json, Value};

use crate::{erc20::Transfer, error::GatewayError, RpcGateway};

impl RpcGateway {
    /// Chain id of the upstream network. Served from the gateway memo after
    /// the first successful call.
    pub async fn chain_id(&self) -> Result<u64, GatewayError> {
        let value = self.call("eth_chainId", json!([])).await?;
        parse_quantity(&value)
    }

    /// Current head block number.
    pub async fn block_number(&self) -> Result<u64, GatewayError> {
        let value = self.call("eth_blockNumber", json!([])).await?;
        parse_quantity(&value)
    }

    /// Deployed bytecode at `address`, as reported by the node (`"0x"` when
    /// there is none).
    pub async fn code_at(&self, address: Address) -> Result<String, GatewayError> {
        let value = self.call("eth_getCode", json!([format!("{address:#x}"), "latest"])).await?;
        value
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| GatewayError::Upstream(format!("malformed eth_getCode response: {value}")))
    }

    /// Transaction count of `address` at the given historical block.
    pub async fn transaction_count_at(
        &self,
        address: Address,
        block: u64,
    ) -> Result<u64, GatewayError> {
        let value = self
            .call(
                "eth_getTransactionCount",
                json!([format!("{address:#x}"), format!("{block:#x}")]),
            )
            .await?;
        parse_quantity(&value)
    }

    /// Transfer logs emitted by `contract` within the inclusive block range.
    pub async fn transfer_logs(
        &self,
        contract: Address,
        from: u64,
        to: u64,
    ) -> Result<Vec<Log>, GatewayError> {
        let filter = json!({
            "address": format!("{contract:#x}"),
            "topics": [format!("{:#x}", Transfer::SIGNATURE_HASH)],
            "fromBlock": format!("{from:#x}"),
            "toBlock": format!("{to:#x}"),
        });
        let value = self.call("eth_getLogs", json!([filter])).await?;
        serde_json::from_value(value)
            .map_err(|e| GatewayError::Upstream(format!("malformed eth_getLogs response: {e}")))
    }

    /// Timestamp of the block header, seconds since epoch.
    pub async fn block_timestamp(&self, block: u64) -> Result<u64, GatewayError> {
        let value =
            self.call("eth_getBlockByNumber", json!([format!("{block:#x}"), false])).await?;
        let timestamp = value
            .get("timestamp")
            .ok_or_else(|| GatewayError::Upstream(format!("block {block} missing upstream")))?;
        parse_quantity(timestamp)
    }
}

fn parse_quantity(value: &Value) -> Result<u64, GatewayError> {
    let text = value
        .as_str()
        .ok_or_else(|| GatewayError::Upstream(format!("malformed hex quantity: {value}")))?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    u64::from_str_radix(digits, 16)
        .map_err(|_| GatewayError::Upstream(format!("malformed hex quantity: {value}")))
}

#[cfg(test)]
mod tests {
    use super::parse_quantity;
    use serde_json::json;

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_quantity(&json!("0x0")).unwrap(), 0);
        assert_eq!(parse_quantity(&json!("0x69")).unwrap(), 105);
        assert_eq!(parse_quantity(&json!("0xde0b6b3a7640000")).unwrap(), 1_000_000_000_000_000_000);
    }

    #[test]
    fn rejects_non_quantities() {
        assert!(parse_quantity(&json!(105)).is_err());
        assert!(parse_quantity(&json!("not-hex")).is_err());
        assert!(parse_quantity(&json!(null)).is_err());
    }
}
