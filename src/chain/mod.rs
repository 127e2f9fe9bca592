//! Everything the miner needs from the chain, behind one trait.
//!
//! Submission is split into simulate and send so a caller can re-check its round between the
//! two network round trips.
//!
//! [`RoundMonitor`](crate::monitor::RoundMonitor) and
//! [`SearchEngine`](crate::miner::search::SearchEngine) only ever talk to a [`ChainClient`]; the
//! alloy-backed implementation lives in [`alloy_client`].

pub mod alloy_client;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

pub use alloy_client::AlloyChain;

/// Live feed of new block numbers. Gaps and duplicates are possible.
pub type BlockStream = Pin<Box<dyn Stream<Item = u64> + Send>>;

/// The subset of an event log the round monitor inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
}

impl LogEntry {
    pub fn topic0(&self) -> Option<B256> {
        self.topics.first().copied()
    }
}

/// Result of the batched `getLastHash()` + `totalSupply()` read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractSnapshot {
    pub last_hash: B256,
    pub supply: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleReceipt {
    /// Broadcast and mined. `success` is false when the transaction reverted on-chain.
    Confirmed {
        tx_hash: B256,
        block_number: Option<u64>,
        success: bool,
    },
    /// Simulation passed; broadcast skipped (dry run).
    Simulated,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn subscribe_new_blocks(&self) -> anyhow::Result<BlockStream>;

    /// Identifying hash of `block_number`.
    async fn get_block(&self, block_number: u64) -> anyhow::Result<B256>;

    async fn get_logs(&self, block_hash: B256) -> anyhow::Result<Vec<LogEntry>>;

    async fn batch_read(&self) -> anyhow::Result<ContractSnapshot>;

    /// Dry-run `settle(candidate)` from the participant. A revert is an error.
    async fn simulate_settle(&self, candidate: U256) -> anyhow::Result<()>;

    /// Broadcast `settle(candidate)` and wait for its receipt. Call only after a successful
    /// [`simulate_settle`](Self::simulate_settle).
    async fn send_settle(&self, candidate: U256) -> anyhow::Result<SettleReceipt>;
}
