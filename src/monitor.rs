use crate::chain::{BlockStream, ChainClient, LogEntry};
use crate::miner::search::{SearchEngine, SearchOutcome};
use crate::miner::state::MinerState;
use crate::miner::Round;
use crate::utils::constants::{DOOMSDAY_ADDRESS, SETTLE_TOPIC};
use crate::utils::error::compact_error_message;
use crate::utils::rpc::{run_with_retry, RetryPolicy};
use alloy::primitives::{Address, B256};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

/// True if any log was emitted by `contract` with `topic` as its event signature.
pub fn contains_settle_event(logs: &[LogEntry], contract: Address, topic: B256) -> bool {
    logs.iter()
        .any(|log| log.address == contract && log.topic0() == Some(topic))
}

/// A round opened by [`RoundMonitor::on_new_block`], with the handle of its search.
pub struct LaunchedRound {
    pub round: Round,
    pub search: JoinHandle<SearchOutcome>,
}

/// Turns block notifications into chain-state refreshes and round boundaries.
pub struct RoundMonitor<C> {
    chain: Arc<C>,
    state: Arc<MinerState>,
    engine: Arc<SearchEngine<C>>,
    retry: RetryPolicy,
    contract: Address,
}

impl<C> RoundMonitor<C>
where
    C: ChainClient + 'static,
{
    pub fn new(
        chain: Arc<C>,
        state: Arc<MinerState>,
        engine: Arc<SearchEngine<C>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            chain,
            state,
            engine,
            retry,
            contract: DOOMSDAY_ADDRESS,
        }
    }

    /// Process one block: advance the tip, refresh the contract snapshot, and open a round if
    /// the block carries a settlement event.
    pub async fn on_new_block(&self, block_number: u64) -> anyhow::Result<Option<LaunchedRound>> {
        let previous_tip = self.state.observe_block(block_number);
        if block_number <= previous_tip {
            tracing::debug!(
                "[ROUND] block #{} is not ahead of tip #{}; processing for state only",
                block_number,
                previous_tip
            );
        } else {
            tracing::debug!("[ROUND] parseBlockNumber: {}", block_number);
        }

        let chain = &self.chain;
        let block_hash = run_with_retry(
            &self.retry,
            &format!("eth_getBlockByNumber(#{block_number})"),
            || chain.get_block(block_number),
        )
        .await?;
        let logs = run_with_retry(
            &self.retry,
            &format!("eth_getLogs({block_hash:#x})"),
            || chain.get_logs(block_hash),
        )
        .await?;
        let snapshot = run_with_retry(
            &self.retry,
            &format!("snapshot aggregate3(#{block_number})"),
            || chain.batch_read(),
        )
        .await?;
        self.state
            .publish_snapshot(snapshot.last_hash, snapshot.supply);

        if !contains_settle_event(&logs, self.contract, SETTLE_TOPIC) {
            return Ok(None);
        }
        tracing::info!("[ROUND] SETTLE EVENT FOUND in block #{}", block_number);

        if !self.state.try_begin_round(block_number) {
            tracing::warn!(
                "[ROUND] ignoring settle at #{}: round #{} is already active or newer",
                block_number,
                self.state.latest_round()
            );
            return Ok(None);
        }

        let round = Round {
            start_block: block_number,
            last_hash: snapshot.last_hash,
        };
        tracing::info!(
            "[ROUND] new round #{} supply={} last_hash={:#x}",
            round.start_block,
            snapshot.supply,
            round.last_hash
        );
        let search = self.engine.spawn(round);
        Ok(Some(LaunchedRound { round, search }))
    }

    /// Drive the monitor until the block feed ends. Per-block failures are logged and skipped.
    pub async fn run(&self, mut blocks: BlockStream) {
        while let Some(block_number) = blocks.next().await {
            match self.on_new_block(block_number).await {
                // Detached: the search ends itself on supersession.
                Ok(Some(_launched)) => {}
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        "[ROUND] block #{} skipped: {}",
                        block_number,
                        compact_error_message(&format!("{err:#}"), 320)
                    );
                }
            }
        }
        tracing::warn!("[ROUND] block feed ended");
    }
}
