//! Native-currency transfer: derive sender, read account and fee state,
//! sign locally, broadcast the signed bytes.

use alloy::primitives::{Address, Bytes, B256, U256};
use tracing::{info, warn};

use super::StageError;
use crate::config::TransferConfig;
use crate::infrastructure::ethereum::EthereumProvider;
use crate::infrastructure::signer::{legacy_transaction, LocalKey};

#[derive(Debug)]
pub struct TransferPlan {
    pub key: LocalKey,
    pub to: Address,
    pub value: U256,
    pub gas_limit: u64,
    pub dry_run: bool,
}

impl TransferPlan {
    pub fn from_config(config: &TransferConfig) -> Result<Self, StageError> {
        let key = match &config.private_key {
            Some(secret) if !secret.is_blank() => LocalKey::from_hex(secret.expose())?,
            _ => LocalKey::generate(),
        };
        Ok(Self {
            key,
            to: config.recipient().map_err(StageError::config)?,
            value: config.value().map_err(StageError::config)?,
            gas_limit: config.gas_limit,
            dry_run: config.dry_run,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TransferReport {
    pub from: Address,
    pub generated_key: bool,
    pub balance: U256,
    pub nonce: u64,
    pub gas_price: u128,
    pub chain_id: u64,
    pub to: Address,
    pub value: U256,
    pub tx_hash: B256,
    pub raw: Bytes,
    pub broadcast: bool,
}

pub async fn transfer_value(
    provider: &dyn EthereumProvider,
    plan: TransferPlan,
) -> Result<TransferReport, StageError> {
    let from = plan.key.address();
    if plan.key.is_generated() {
        info!(%from, "generated throwaway sender key");
    }

    let balance = provider
        .get_balance(from)
        .await
        .map_err(StageError::rpc("balance"))?;
    let nonce = provider
        .pending_nonce(from)
        .await
        .map_err(StageError::rpc("pending nonce"))?;
    let gas_price = provider
        .gas_price()
        .await
        .map_err(StageError::rpc("gas price"))?;
    let chain_id = provider
        .chain_id()
        .await
        .map_err(StageError::rpc("chain id"))?;
    info!(%from, %balance, nonce, gas_price, chain_id, "sender state");

    let max_cost = max_cost(plan.value, gas_price, plan.gas_limit);
    if balance < max_cost {
        warn!(%balance, %max_cost, "balance does not cover value plus gas");
    }

    let tx = legacy_transaction(
        chain_id,
        nonce,
        gas_price,
        plan.gas_limit,
        plan.to,
        plan.value,
        Bytes::new(),
    );
    let signed = plan
        .key
        .sign_legacy(tx)
        .map_err(|e| StageError::Signing(e.to_string()))?;
    let signer = signed
        .recover_signer()
        .map_err(|e| StageError::Signing(format!("{e:#}")))?;
    if signer != from {
        return Err(StageError::Signing(format!(
            "signature recovers to {signer}, expected {from}"
        )));
    }

    let mut report = TransferReport {
        from,
        generated_key: plan.key.is_generated(),
        balance,
        nonce,
        gas_price,
        chain_id,
        to: plan.to,
        value: plan.value,
        tx_hash: signed.hash(),
        raw: signed.raw().clone(),
        broadcast: false,
    };

    if plan.dry_run {
        info!(hash = %report.tx_hash, "dry run, not broadcasting");
        return Ok(report);
    }

    let remote = provider
        .send_raw_transaction(signed.raw().clone())
        .await
        .map_err(StageError::rpc("send transaction"))?;
    if remote != signed.hash() {
        return Err(StageError::HashMismatch {
            local: signed.hash(),
            remote,
        });
    }

    info!(hash = %remote, "transfer broadcast");
    report.broadcast = true;
    Ok(report)
}

/// Upper bound on what the transfer can spend, pinned at `U256::MAX`
fn max_cost(value: U256, gas_price: u128, gas_limit: u64) -> U256 {
    U256::from(gas_price)
        .saturating_mul(U256::from(gas_limit))
        .saturating_add(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ethereum::mock::MockProvider;
    use alloy::consensus::transaction::SignerRecoverable;
    use alloy::consensus::TxEnvelope;
    use alloy::eips::eip2718::Decodable2718;
    use alloy::primitives::{address, keccak256};

    fn plan(dry_run: bool) -> TransferPlan {
        TransferPlan {
            key: LocalKey::generate(),
            to: address!("4592d8f8d7b001e72cb26a73e4fa1806a51ac79d"),
            value: U256::from(10_000_000_000_000_000u64),
            gas_limit: 21_000,
            dry_run,
        }
    }

    #[tokio::test]
    async fn test_broadcasts_the_signed_transaction() {
        let provider = MockProvider {
            nonce: 3,
            balance: U256::from(10u64).pow(U256::from(18u64)),
            ..Default::default()
        };
        let plan = plan(false);
        let sender = plan.key.address();

        let report = transfer_value(&provider, plan).await.unwrap();
        assert!(report.broadcast);

        let sent = provider.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], report.raw);
        assert_eq!(keccak256(&sent[0]), report.tx_hash);

        let mut buf: &[u8] = &sent[0];
        let envelope = TxEnvelope::decode_2718(&mut buf).unwrap();
        assert_eq!(envelope.recover_signer().unwrap(), sender);
        match envelope {
            TxEnvelope::Legacy(tx) => {
                assert_eq!(tx.tx().nonce, 3);
                assert_eq!(tx.tx().gas_limit, 21_000);
                assert_eq!(tx.tx().chain_id, Some(11155111));
            }
            other => panic!("unexpected envelope {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let provider = MockProvider::default();
        transfer_value(&provider, plan(false)).await.unwrap();
        assert_eq!(
            provider.calls(),
            vec![
                "get_balance",
                "pending_nonce",
                "gas_price",
                "chain_id",
                "send_raw_transaction"
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_stops_later_steps() {
        let provider = MockProvider {
            fail_on: Some("gas_price"),
            ..Default::default()
        };
        let err = transfer_value(&provider, plan(false)).await.unwrap_err();
        assert!(matches!(err, StageError::Rpc { step: "gas price", .. }));
        assert_eq!(
            provider.calls(),
            vec!["get_balance", "pending_nonce", "gas_price"]
        );
        assert!(provider.sent().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_does_not_broadcast() {
        let provider = MockProvider::default();
        let report = transfer_value(&provider, plan(true)).await.unwrap();
        assert!(!report.broadcast);
        assert!(provider.sent().is_empty());
        assert_eq!(keccak256(&report.raw), report.tx_hash);
    }

    #[tokio::test]
    async fn test_hash_mismatch_is_an_error() {
        let provider = MockProvider {
            hash_override: Some(B256::repeat_byte(0xab)),
            ..Default::default()
        };
        let err = transfer_value(&provider, plan(false)).await.unwrap_err();
        assert!(matches!(err, StageError::HashMismatch { .. }));
    }

    #[test]
    fn test_max_cost() {
        let value = U256::from(10_000_000_000_000_000u64);
        assert_eq!(
            max_cost(value, 1_000_000_000, 21_000),
            value + U256::from(21_000_000_000_000u64)
        );
        assert_eq!(max_cost(U256::MAX, 1, 21_000), U256::MAX);
        assert_eq!(
            max_cost(U256::ZERO, u128::MAX, u64::MAX),
            U256::from(u128::MAX) * U256::from(u64::MAX)
        );
    }

    #[tokio::test]
    async fn test_huge_value_still_signs() {
        let provider = MockProvider {
            balance: U256::MAX,
            gas_price: u128::MAX,
            ..Default::default()
        };
        let plan = TransferPlan {
            value: U256::MAX,
            ..plan(true)
        };
        let report = transfer_value(&provider, plan).await.unwrap();
        assert_eq!(report.value, U256::MAX);
        assert!(!report.broadcast);
    }

    #[test]
    fn test_plan_generates_key_when_none_configured() {
        let plan = TransferPlan::from_config(&TransferConfig::default()).unwrap();
        assert!(plan.key.is_generated());
        assert_eq!(plan.gas_limit, 21_000);
    }

    #[test]
    fn test_plan_rejects_bad_value() {
        let config = TransferConfig {
            value_wei: "a lot".to_string(),
            ..Default::default()
        };
        let err = TransferPlan::from_config(&config).unwrap_err();
        assert!(matches!(err, StageError::Config(_)));
    }
}
