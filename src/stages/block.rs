//! Block query

use tracing::info;

use super::StageError;
use crate::infrastructure::ethereum::{EthereumProvider, RawBlock};

#[derive(Debug, Clone)]
pub struct BlockReport {
    pub block: RawBlock,
}

pub async fn query_block(
    provider: &dyn EthereumProvider,
    number: u64,
) -> Result<BlockReport, StageError> {
    info!(number, "fetching block");
    let block = provider
        .get_block(number)
        .await
        .map_err(StageError::rpc("block"))?
        .ok_or(StageError::BlockNotFound(number))?;

    info!(
        number = block.number,
        hash = %block.hash,
        txs = block.tx_count(),
        "block fetched"
    );
    Ok(BlockReport { block })
}
