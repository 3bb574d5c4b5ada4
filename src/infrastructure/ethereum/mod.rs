//! Ethereum infrastructure - Alloy provider implementations

#[cfg(test)]
pub(crate) mod mock;
mod provider;
pub(crate) mod types;

pub use provider::{create_provider, EthereumProvider, ProviderConfig, RawBlock};
pub use types::ReceiptInfo;
