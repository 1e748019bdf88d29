//! Creation-block discovery via bisection over historical transaction
//! counts.

use alloy_primitives::Address;
use gateway::{GatewayError, RpcGateway};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Failure modes of the creation-block search.
#[derive(Debug, thiserror::Error)]
pub enum CreationError {
    /// No bytecode at the contract address at the current head.
    #[error("no contract code at the configured address")]
    ContractNotFound,
    /// Upstream failure while probing.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// The bisection ended without isolating a creation block.
    #[error("creation block search was inconclusive")]
    Inconclusive,
}

/// Finds the earliest block at which the tracked contract shows activity.
///
/// The result is cached for the process lifetime; a second `locate` call
/// issues no upstream probes.
#[derive(Debug)]
pub struct CreationLocator {
    gateway: RpcGateway,
    contract: Address,
    floor: Option<u64>,
    located: OnceCell<u64>,
}

impl CreationLocator {
    /// Build a locator for `contract`.
    pub fn new(gateway: RpcGateway, contract: Address) -> Self {
        Self { gateway, contract, floor: None, located: OnceCell::new() }
    }

    /// Override the lower search bound. Without an override the bound is
    /// derived from the chain id via [`network_floor`].
    pub fn with_floor(mut self, floor: u64) -> Self {
        self.floor = Some(floor);
        self
    }

    /// Locate the first block where the contract has a nonzero transaction
    /// count, in `O(log head)` probes.
    pub async fn locate(&self) -> Result<u64, CreationError> {
        self.located.get_or_try_init(|| self.search()).await.copied()
    }

    async fn search(&self) -> Result<u64, CreationError> {
        let code = self.gateway.code_at(self.contract).await?;
        if code == "0x" || code.is_empty() {
            return Err(CreationError::ContractNotFound);
        }

        let head = self.gateway.block_number().await?;
        let mut lo = match self.floor {
            Some(floor) => floor,
            None => network_floor(self.gateway.chain_id().await?),
        };
        let mut hi = head;
        debug!(lo, hi, contract = %self.contract, "searching for contract creation block");

        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let count = self.gateway.transaction_count_at(self.contract, mid).await?;
            if count == 0 {
                lo = mid + 1;
                continue;
            }
            if mid == 0 || self.gateway.transaction_count_at(self.contract, mid - 1).await? == 0 {
                info!(block = mid, "found contract creation block");
                return Ok(mid);
            }
            hi = mid - 1;
        }

        Err(CreationError::Inconclusive)
    }
}

/// Lower bisection bounds for networks whose tracked deployments never sit
/// in the genesis era; probing below the floor cannot succeed.
pub const fn network_floor(chain_id: u64) -> u64 {
    match chain_id {
        11_155_111 => 2_000_000, // sepolia
        17_000 => 100_000,       // holesky
        80_002 => 1_000_000,     // polygon amoy
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::network_floor;

    #[test]
    fn mainnet_searches_from_genesis() {
        assert_eq!(network_floor(1), 0);
    }

    #[test]
    fn known_testnets_have_floors() {
        assert!(network_floor(11_155_111) > 0);
        assert!(network_floor(17_000) > 0);
        assert!(network_floor(80_002) > 0);
    }
}
