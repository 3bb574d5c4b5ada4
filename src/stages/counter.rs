//! Counter contract: send `add()`, wait for it to be mined, read `getCount()`

use alloy::primitives::{Address, B256, U256};
use tracing::{info, warn};

use super::{wait_for_receipt, StageError, WaitPolicy};
use crate::config::{CounterConfig, Secret};
use crate::domain::CounterContract;
use crate::infrastructure::ethereum::EthereumProvider;
use crate::infrastructure::signer::{legacy_transaction, LocalKey};

#[derive(Debug)]
pub struct CounterPlan {
    pub contract: CounterContract,
    pub private_key: Secret,
    pub gas_limit: Option<u64>,
    pub wait: WaitPolicy,
}

impl CounterPlan {
    pub fn from_config(config: &CounterConfig) -> Result<Self, StageError> {
        Ok(Self {
            contract: CounterContract::new(
                config.contract_address().map_err(StageError::config)?,
            ),
            private_key: config.private_key.clone(),
            gas_limit: config.gas_limit,
            wait: WaitPolicy {
                poll_interval: config.poll_interval(),
                timeout: config.receipt_timeout(),
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct CounterReport {
    pub contract: Address,
    pub from: Address,
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub success: bool,
    pub count: U256,
}

pub async fn call_counter(
    provider: &dyn EthereumProvider,
    plan: CounterPlan,
) -> Result<CounterReport, StageError> {
    let contract = plan.contract;
    let key = LocalKey::from_hex(plan.private_key.expose())?;
    let from = key.address();

    let chain_id = provider
        .chain_id()
        .await
        .map_err(StageError::rpc("chain id"))?;
    let nonce = provider
        .pending_nonce(from)
        .await
        .map_err(StageError::rpc("pending nonce"))?;
    let gas_price = provider
        .gas_price()
        .await
        .map_err(StageError::rpc("gas price"))?;
    let gas_limit = match plan.gas_limit {
        Some(limit) => limit,
        None => provider
            .estimate_gas(contract.add_request(from))
            .await
            .map_err(StageError::rpc("estimate gas"))?,
    };

    let tx = legacy_transaction(
        chain_id,
        nonce,
        gas_price,
        gas_limit,
        contract.address(),
        U256::ZERO,
        contract.add_calldata(),
    );
    let signed = key
        .sign_legacy(tx)
        .map_err(|e| StageError::Signing(e.to_string()))?;

    let tx_hash = provider
        .send_raw_transaction(signed.raw().clone())
        .await
        .map_err(StageError::rpc("send add()"))?;
    if tx_hash != signed.hash() {
        return Err(StageError::HashMismatch {
            local: signed.hash(),
            remote: tx_hash,
        });
    }
    info!(hash = %tx_hash, contract = %contract.address(), "add() sent, waiting for receipt");

    let receipt = wait_for_receipt(provider, tx_hash, plan.wait).await?;
    if !receipt.success {
        warn!(hash = %tx_hash, "add() reverted");
    }
    info!(block = ?receipt.block_number, gas_used = receipt.gas_used, "add() mined");

    let data = provider
        .call(contract.get_count_request())
        .await
        .map_err(StageError::rpc("getCount()"))?;
    let count = CounterContract::decode_count(&data).map_err(|e| StageError::Decode {
        what: "getCount()",
        message: e.to_string(),
    })?;
    info!(%count, "counter value");

    Ok(CounterReport {
        contract: contract.address(),
        from,
        tx_hash,
        block_number: receipt.block_number,
        success: receipt.success,
        count,
    })
}
