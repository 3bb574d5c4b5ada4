//! In-memory node used by stage tests

use std::sync::Mutex;

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::rpc::types::TransactionRequest;
use anyhow::{bail, Context, Result};

use crate::domain::CounterContract;

use super::provider::{EthereumProvider, RawBlock};
use super::types::ReceiptInfo;

/// Scriptable provider that records every RPC method it serves
pub struct MockProvider {
    pub chain_id: u64,
    pub block: Option<RawBlock>,
    pub balance: U256,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_estimate: u64,
    /// Polls answered with `None` before the receipt shows up
    pub pending_polls: usize,
    pub receipt_success: bool,
    /// Counter state; a successful `add()` transaction bumps it by one
    pub count: Mutex<U256>,
    /// Method name that fails instead of answering
    pub fail_on: Option<&'static str>,
    /// Hash returned by `send_raw_transaction` instead of the real one
    pub hash_override: Option<B256>,
    pub calls: Mutex<Vec<&'static str>>,
    pub sent: Mutex<Vec<Bytes>>,
    pub polls: Mutex<usize>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            chain_id: 11155111,
            block: None,
            balance: U256::ZERO,
            nonce: 0,
            gas_price: 1_000_000_000,
            gas_estimate: 26_000,
            pending_polls: 0,
            receipt_success: true,
            count: Mutex::new(U256::ZERO),
            fail_on: None,
            hash_override: None,
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            polls: Mutex::new(0),
        }
    }
}

impl MockProvider {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> U256 {
        *self.count.lock().unwrap()
    }

    /// Apply a broadcast transaction to the counter state
    fn execute(&self, raw: &[u8]) -> Result<()> {
        let mut buf = raw;
        let envelope = TxEnvelope::decode_2718(&mut buf).context("undecodable raw transaction")?;
        let Some(to) = envelope.to() else {
            return Ok(());
        };
        if self.receipt_success && envelope.input() == &CounterContract::new(to).add_calldata() {
            *self.count.lock().unwrap() += U256::from(1u64);
        }
        Ok(())
    }

    fn record(&self, method: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(method);
        if self.fail_on == Some(method) {
            bail!("mock {method} failure");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EthereumProvider for MockProvider {
    async fn chain_id(&self) -> Result<u64> {
        self.record("chain_id")?;
        Ok(self.chain_id)
    }

    async fn get_block(&self, number: u64) -> Result<Option<RawBlock>> {
        self.record("get_block")?;
        Ok(self.block.clone().filter(|b| b.number == number))
    }

    async fn get_balance(&self, _address: Address) -> Result<U256> {
        self.record("get_balance")?;
        Ok(self.balance)
    }

    async fn pending_nonce(&self, _address: Address) -> Result<u64> {
        self.record("pending_nonce")?;
        Ok(self.nonce)
    }

    async fn gas_price(&self) -> Result<u128> {
        self.record("gas_price")?;
        Ok(self.gas_price)
    }

    async fn estimate_gas(&self, _request: TransactionRequest) -> Result<u64> {
        self.record("estimate_gas")?;
        Ok(self.gas_estimate)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256> {
        self.record("send_raw_transaction")?;
        self.execute(&raw)?;
        let hash = self.hash_override.unwrap_or_else(|| keccak256(&raw));
        self.sent.lock().unwrap().push(raw);
        Ok(hash)
    }

    async fn get_receipt(&self, hash: B256) -> Result<Option<ReceiptInfo>> {
        self.record("get_receipt")?;
        let mut polls = self.polls.lock().unwrap();
        if *polls < self.pending_polls {
            *polls += 1;
            return Ok(None);
        }
        Ok(Some(ReceiptInfo {
            tx_hash: hash,
            block_number: Some(42),
            success: self.receipt_success,
            gas_used: self.gas_estimate,
        }))
    }

    async fn call(&self, _request: TransactionRequest) -> Result<Bytes> {
        self.record("call")?;
        Ok(Bytes::copy_from_slice(B256::from(self.count()).as_slice()))
    }

    fn endpoint_name(&self) -> String {
        "mock".to_string()
    }
}
