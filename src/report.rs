//! Console rendering of stage outcomes

use std::fmt;

use alloy::primitives::utils::{format_ether, format_units};
use alloy::primitives::U256;

use crate::stages::{BlockReport, CounterReport, StageOutcome, TransferReport};

/// Titled list of label/value lines
pub struct Report {
    pub title: String,
    pub content: Vec<(String, String)>, // (label, value) pairs
}

impl Report {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: Vec::new(),
        }
    }

    pub fn add(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.content.push((label.into(), value.into()));
        self
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.title)?;
        let width = self.content.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (label, value) in &self.content {
            writeln!(f, "  {label:<width$}  {value}")?;
        }
        Ok(())
    }
}

impl From<&StageOutcome> for Report {
    fn from(outcome: &StageOutcome) -> Self {
        match outcome {
            StageOutcome::Block(report) => block_report(report),
            StageOutcome::Transfer(report) => transfer_report(report),
            StageOutcome::Counter(report) => counter_report(report),
        }
    }
}

fn block_report(report: &BlockReport) -> Report {
    let block = &report.block;
    let mut out = Report::new(format!("Block #{}", block.number))
        .add("hash", &block.hash)
        .add("timestamp", block.timestamp.to_string())
        .add("time", format_timestamp(block.timestamp))
        .add("parent", &block.parent_hash)
        .add("miner", &block.miner)
        .add("gas used", format!("{} / {}", block.gas_used, block.gas_limit))
        .add(
            "base fee",
            block
                .base_fee_per_gas
                .map(|fee| format!("{} gwei", format_gwei(u128::from(fee))))
                .unwrap_or_else(|| "-".to_string()),
        )
        .add("transactions", block.tx_count().to_string());
    for hash in &block.transactions {
        out = out.add("  tx", hash);
    }
    out
}

fn transfer_report(report: &TransferReport) -> Report {
    let sender = if report.generated_key {
        format!("{} (generated)", report.from)
    } else {
        report.from.to_string()
    };
    let status = if report.broadcast {
        "broadcast"
    } else {
        "signed only (dry run)"
    };
    let mut out = Report::new("Transfer")
        .add("from", sender)
        .add("balance", format!("{} ETH", format_ether(report.balance)))
        .add("nonce", report.nonce.to_string())
        .add("gas price", format!("{} gwei", format_gwei(report.gas_price)))
        .add("chain id", report.chain_id.to_string())
        .add("to", report.to.to_string())
        .add("value", format!("{} ETH", format_ether(report.value)))
        .add("tx hash", report.tx_hash.to_string())
        .add("status", status);
    if !report.broadcast {
        out = out.add("raw", report.raw.to_string());
    }
    out
}

fn counter_report(report: &CounterReport) -> Report {
    let block = report
        .block_number
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-".to_string());
    let status = if report.success { "success" } else { "reverted" };
    Report::new("Counter")
        .add("contract", report.contract.to_string())
        .add("from", report.from.to_string())
        .add("add() tx", report.tx_hash.to_string())
        .add("block", block)
        .add("status", status)
        .add("count", report.count.to_string())
}

fn format_timestamp(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "out of range".to_string())
}

fn format_gwei(wei: u128) -> String {
    format_units(U256::from(wei), "gwei").unwrap_or_else(|_| wei.to_string())
}
