//! Type conversions between Alloy/JSON-RPC data and our chain-agnostic types

use alloy::network::ReceiptResponse;
use alloy::primitives::B256;
use alloy::rpc::types::TransactionReceipt;
use anyhow::{Context, Result};

use super::provider::RawBlock;

/// The parts of a receipt the stages look at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub success: bool,
    pub gas_used: u64,
}

impl ReceiptInfo {
    pub fn from_rpc(receipt: &TransactionReceipt) -> Self {
        Self {
            tx_hash: ReceiptResponse::transaction_hash(receipt),
            block_number: ReceiptResponse::block_number(receipt),
            success: ReceiptResponse::status(receipt),
            gas_used: ReceiptResponse::gas_used(receipt),
        }
    }
}

/// Parse raw JSON block response to our chain-agnostic RawBlock type
pub fn parse_raw_block(json: &serde_json::Value) -> Result<RawBlock> {
    let number = required_hex(json, "number")?;
    let hash = json
        .get("hash")
        .and_then(|v| v.as_str())
        .context("Block has no hash")?
        .to_string();
    let parent_hash = json
        .get("parentHash")
        .and_then(|v| v.as_str())
        .unwrap_or("0x0")
        .to_string();
    let timestamp = required_hex(json, "timestamp")?;
    let gas_used = required_hex(json, "gasUsed")?;
    let gas_limit = required_hex(json, "gasLimit")?;
    let base_fee_per_gas = json
        .get("baseFeePerGas")
        .and_then(|v| v.as_str())
        .map(parse_hex_u64)
        .transpose()?;
    let miner = json
        .get("miner")
        .and_then(|v| v.as_str())
        .unwrap_or("0x0000000000000000000000000000000000000000")
        .to_string();

    // Hash-only blocks list strings, full blocks list objects
    let transactions = json
        .get("transactions")
        .and_then(|v| v.as_array())
        .context("Block has no transaction list")?
        .iter()
        .enumerate()
        .map(|(i, tx)| {
            tx.as_str()
                .or_else(|| tx.get("hash").and_then(|h| h.as_str()))
                .map(str::to_string)
                .with_context(|| format!("Block transaction {i} has no hash: {tx}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RawBlock {
        number,
        hash,
        parent_hash,
        timestamp,
        gas_used,
        gas_limit,
        base_fee_per_gas,
        miner,
        transactions,
    })
}

fn required_hex(json: &serde_json::Value, key: &str) -> Result<u64> {
    let value = json
        .get(key)
        .and_then(|v| v.as_str())
        .with_context(|| format!("Block has no {key}"))?;
    parse_hex_u64(value).with_context(|| format!("Block field {key}"))
}

/// Parse hex string to u64
pub fn parse_hex_u64(s: &str) -> Result<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).with_context(|| format!("Failed to parse hex u64: {s}"))
}
