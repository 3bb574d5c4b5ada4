//! ABI binding for the deployed counter contract

use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    contract Counter {
        function add() external;
        function getCount() external view returns (uint256);
    }
}

/// Typed handle on a counter deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterContract {
    address: Address,
}

impl CounterContract {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Call data for the mutating `add()`
    pub fn add_calldata(&self) -> Bytes {
        Counter::addCall {}.abi_encode().into()
    }

    /// `add()` as a request, used for gas estimation
    pub fn add_request(&self, from: Address) -> TransactionRequest {
        TransactionRequest::default()
            .from(from)
            .to(self.address)
            .input(self.add_calldata().into())
    }

    /// Read-only `getCount()` request for `eth_call`
    pub fn get_count_request(&self) -> TransactionRequest {
        let data: Bytes = Counter::getCountCall {}.abi_encode().into();
        TransactionRequest::default()
            .to(self.address)
            .input(data.into())
    }

    pub fn decode_count(data: &[u8]) -> Result<U256, alloy::sol_types::Error> {
        Counter::getCountCall::abi_decode_returns(data)
    }
}
