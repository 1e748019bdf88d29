//! Contract binding for the tracked token.

use alloy::sol;

sol! {
    /// Canonical ERC-20 `Transfer` event.
    #[derive(Debug, PartialEq, Eq)]
    event Transfer(address indexed from, address indexed to, uint256 value);
}
