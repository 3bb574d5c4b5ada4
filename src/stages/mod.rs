//! The three demo routines and what they share
//!
//! Every stage opens its own connection, runs its steps in order and stops
//! at the first failing step. A failing stage never stops the next one.

pub mod block;
pub mod counter;
pub mod transfer;

use std::fmt;
use std::time::Duration;

use alloy::primitives::B256;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::config::Config;
use crate::infrastructure::ethereum::{create_provider, EthereumProvider, ReceiptInfo};
use crate::infrastructure::signer::KeyError;

pub use block::BlockReport;
pub use counter::CounterReport;
pub use transfer::TransferReport;

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },
    #[error("{step} failed: {message}")]
    Rpc { step: &'static str, message: String },
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("block {0} not found")]
    BlockNotFound(u64),
    #[error("node reported hash {remote}, signed transaction hash is {local}")]
    HashMismatch { local: B256, remote: B256 },
    #[error("transaction {hash} not mined within {waited:?}")]
    Timeout { hash: B256, waited: Duration },
    #[error("failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },
}

impl StageError {
    pub(crate) fn rpc(step: &'static str) -> impl FnOnce(anyhow::Error) -> StageError {
        move |err| StageError::Rpc {
            step,
            message: format!("{err:#}"),
        }
    }

    pub(crate) fn config(err: anyhow::Error) -> StageError {
        StageError::Config(format!("{err:#}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Block,
    Transfer,
    Counter,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Block, Stage::Transfer, Stage::Counter];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Block => "block",
            Stage::Transfer => "transfer",
            Stage::Counter => "counter",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum StageOutcome {
    Block(BlockReport),
    Transfer(TransferReport),
    Counter(CounterReport),
}

/// How long and how often to poll for a receipt
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
}

/// Connect to the configured endpoint and run one stage
pub async fn run_stage(stage: Stage, config: &Config) -> Result<StageOutcome, StageError> {
    let endpoint = config
        .endpoint
        .provider_config()
        .map_err(StageError::config)?;
    let display = endpoint.display();
    let provider = create_provider(endpoint)
        .await
        .map_err(|err| StageError::Connect {
            endpoint: display,
            message: format!("{err:#}"),
        })?;
    debug!(endpoint = %provider.endpoint_name(), %stage, "connected");

    match stage {
        Stage::Block => block::query_block(provider.as_ref(), config.block.number)
            .await
            .map(StageOutcome::Block),
        Stage::Transfer => {
            let plan = transfer::TransferPlan::from_config(&config.transfer)?;
            transfer::transfer_value(provider.as_ref(), plan)
                .await
                .map(StageOutcome::Transfer)
        }
        Stage::Counter => {
            let plan = counter::CounterPlan::from_config(&config.counter)?;
            counter::call_counter(provider.as_ref(), plan)
                .await
                .map(StageOutcome::Counter)
        }
    }
}

/// Poll until the transaction has a receipt
pub async fn wait_for_receipt(
    provider: &dyn EthereumProvider,
    hash: B256,
    policy: WaitPolicy,
) -> Result<ReceiptInfo, StageError> {
    let poll = async {
        let mut ticker = interval(policy.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(receipt) = provider
                .get_receipt(hash)
                .await
                .map_err(StageError::rpc("receipt"))?
            {
                return Ok(receipt);
            }
            debug!(%hash, "transaction pending");
        }
    };

    match policy.timeout {
        Some(limit) => tokio::time::timeout(limit, poll)
            .await
            .map_err(|_| StageError::Timeout {
                hash,
                waited: limit,
            })?,
        None => poll.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ethereum::mock::MockProvider;

    fn fast(timeout: Option<Duration>) -> WaitPolicy {
        WaitPolicy {
            poll_interval: Duration::from_millis(1),
            timeout,
        }
    }

    #[tokio::test]
    async fn test_wait_polls_until_mined() {
        let provider = MockProvider {
            pending_polls: 3,
            ..Default::default()
        };
        let hash = B256::repeat_byte(0x11);

        let receipt = wait_for_receipt(&provider, hash, fast(None)).await.unwrap();
        assert_eq!(receipt.tx_hash, hash);
        assert_eq!(receipt.block_number, Some(42));
        assert_eq!(provider.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let provider = MockProvider {
            pending_polls: usize::MAX,
            ..Default::default()
        };
        let err = wait_for_receipt(
            &provider,
            B256::ZERO,
            fast(Some(Duration::from_millis(20))),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StageError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_wait_propagates_rpc_error() {
        let provider = MockProvider {
            fail_on: Some("get_receipt"),
            ..Default::default()
        };
        let err = wait_for_receipt(&provider, B256::ZERO, fast(None))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Rpc { step: "receipt", .. }));
    }

    #[test]
    fn test_stage_names() {
        let names: Vec<String> = Stage::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["block", "transfer", "counter"]);
    }
}
