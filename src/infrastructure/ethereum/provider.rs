//! Ethereum provider abstraction and Alloy implementations
//!
//! Blocks are fetched as raw JSON so that chains with non-standard
//! transaction types (Optimism/Base and friends) still decode.

use std::path::PathBuf;

use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{
    fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
    Identity, Provider, ProviderBuilder, RootProvider,
};
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result};

use crate::infrastructure::ethereum::types::{parse_raw_block, ReceiptInfo};

/// Raw block data parsed from JSON - works with any EVM chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub base_fee_per_gas: Option<u64>,
    pub miner: String,
    /// Transaction hashes in block order
    pub transactions: Vec<String>,
}

impl RawBlock {
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    /// HTTP JSON-RPC endpoint
    Http(String),
    /// WebSocket endpoint
    WebSocket(String),
    /// IPC socket path (Unix only)
    #[cfg(unix)]
    Ipc(PathBuf),
}

impl ProviderConfig {
    /// Get display name for this endpoint
    pub fn display(&self) -> String {
        match self {
            ProviderConfig::Http(url) => url.clone(),
            ProviderConfig::WebSocket(url) => url.clone(),
            #[cfg(unix)]
            ProviderConfig::Ipc(path) => path.display().to_string(),
        }
    }
}

/// Abstract Ethereum provider trait
///
/// Covers exactly the RPC surface the stages need, so they can run against
/// any Alloy transport or an in-memory node in tests.
#[async_trait::async_trait]
pub trait EthereumProvider: Send + Sync + 'static {
    /// Chain id reported by `eth_chainId`
    async fn chain_id(&self) -> Result<u64>;

    /// Get a block by number with transaction hashes (chain-agnostic raw format)
    async fn get_block(&self, number: u64) -> Result<Option<RawBlock>>;

    /// Get account balance at the latest block
    async fn get_balance(&self, address: Address) -> Result<U256>;

    /// Nonce including transactions still in the pool
    async fn pending_nonce(&self, address: Address) -> Result<u64>;

    /// Suggested legacy gas price in wei
    async fn gas_price(&self) -> Result<u128>;

    /// Estimate gas for a transaction (eth_estimateGas)
    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64>;

    /// Broadcast an EIP-2718 encoded signed transaction, returning its hash
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256>;

    /// Get transaction receipt, `None` while the transaction is pending
    async fn get_receipt(&self, hash: B256) -> Result<Option<ReceiptInfo>>;

    /// Execute a call (eth_call)
    async fn call(&self, request: TransactionRequest) -> Result<Bytes>;

    /// Get endpoint display name
    fn endpoint_name(&self) -> String;
}

// All transports share the recommended filler stack
type FilledProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
    Ethereum,
>;

/// Enum-based provider that stores the concrete provider for each transport
pub enum AlloyProvider {
    Http {
        provider: FilledProvider,
        endpoint: String,
    },
    WebSocket {
        provider: FilledProvider,
        endpoint: String,
    },
    #[cfg(unix)]
    Ipc {
        provider: FilledProvider,
        endpoint: String,
    },
}

/// Create a provider from configuration
pub async fn create_provider(config: ProviderConfig) -> Result<Box<dyn EthereumProvider>> {
    match config {
        ProviderConfig::Http(url) => {
            let rpc_url = url.parse().context("Invalid HTTP URL")?;
            let provider = ProviderBuilder::new().connect_http(rpc_url);
            Ok(Box::new(AlloyProvider::Http {
                provider,
                endpoint: url,
            }))
        }
        ProviderConfig::WebSocket(url) => {
            let provider = ProviderBuilder::new()
                .connect(&url)
                .await
                .context("Failed to create WebSocket provider")?;
            Ok(Box::new(AlloyProvider::WebSocket {
                provider,
                endpoint: url,
            }))
        }
        #[cfg(unix)]
        ProviderConfig::Ipc(path) => {
            use alloy::providers::IpcConnect;
            let ipc_path = path.to_string_lossy().to_string();
            let ipc = IpcConnect::new(ipc_path);
            let provider = ProviderBuilder::new()
                .connect_ipc(ipc)
                .await
                .context("Failed to create IPC provider")?;
            let display = path.display().to_string();
            Ok(Box::new(AlloyProvider::Ipc {
                provider,
                endpoint: display,
            }))
        }
    }
}

impl AlloyProvider {
    fn inner(&self) -> &FilledProvider {
        match self {
            AlloyProvider::Http { provider, .. } => provider,
            AlloyProvider::WebSocket { provider, .. } => provider,
            #[cfg(unix)]
            AlloyProvider::Ipc { provider, .. } => provider,
        }
    }
}

// Macro to reduce code duplication for provider method implementations
macro_rules! impl_provider_method {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        $self.inner().$method($($arg),*).await
    };
}

#[async_trait::async_trait]
impl EthereumProvider for AlloyProvider {
    async fn chain_id(&self) -> Result<u64> {
        Ok(impl_provider_method!(self, get_chain_id)?)
    }

    async fn get_block(&self, number: u64) -> Result<Option<RawBlock>> {
        // `false` asks for hashes only; the parser also accepts full objects
        let block_num_hex = format!("0x{:x}", number);
        let json: serde_json::Value = self
            .inner()
            .raw_request("eth_getBlockByNumber".into(), (&block_num_hex, false))
            .await?;

        if json.is_null() {
            return Ok(None);
        }

        Ok(Some(parse_raw_block(&json)?))
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        Ok(impl_provider_method!(self, get_balance, address)?)
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        Ok(self
            .inner()
            .get_transaction_count(address)
            .pending()
            .await?)
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(impl_provider_method!(self, get_gas_price)?)
    }

    async fn estimate_gas(&self, request: TransactionRequest) -> Result<u64> {
        Ok(impl_provider_method!(self, estimate_gas, request)?)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256> {
        let pending = impl_provider_method!(self, send_raw_transaction, &raw)?;
        Ok(*pending.tx_hash())
    }

    async fn get_receipt(&self, hash: B256) -> Result<Option<ReceiptInfo>> {
        let receipt = impl_provider_method!(self, get_transaction_receipt, hash)?;
        Ok(receipt.as_ref().map(ReceiptInfo::from_rpc))
    }

    async fn call(&self, request: TransactionRequest) -> Result<Bytes> {
        Ok(impl_provider_method!(self, call, request)?)
    }

    fn endpoint_name(&self) -> String {
        match self {
            AlloyProvider::Http { endpoint, .. } => endpoint.clone(),
            AlloyProvider::WebSocket { endpoint, .. } => endpoint.clone(),
            #[cfg(unix)]
            AlloyProvider::Ipc { endpoint, .. } => endpoint.clone(),
        }
    }
}
