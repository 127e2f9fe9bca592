use alloy::primitives::{B256, U256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Marker value meaning "no round has been observed yet".
pub const NO_ROUND: u64 = 0;

/// Process-wide chain view shared by the round monitor (sole writer) and every search.
///
/// Chain tip, supply and last hash are best-effort fresh. The latest-round marker is the
/// cancellation signal and is always accessed `SeqCst`.
#[derive(Debug)]
pub struct MinerState {
    chain_tip: AtomicU64,
    latest_round: AtomicU64,
    supply: RwLock<U256>,
    last_hash: RwLock<B256>,
}

impl Default for MinerState {
    fn default() -> Self {
        Self::new()
    }
}

fn read_recovering<'a, T>(lock: &'a RwLock<T>, label: &str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("[STATE] {} lock poisoned; recovering guard state.", label);
            poisoned.into_inner()
        }
    }
}

fn write_recovering<'a, T>(lock: &'a RwLock<T>, label: &str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("[STATE] {} lock poisoned; recovering guard state.", label);
            poisoned.into_inner()
        }
    }
}

impl MinerState {
    pub fn new() -> Self {
        Self {
            chain_tip: AtomicU64::new(0),
            latest_round: AtomicU64::new(NO_ROUND),
            supply: RwLock::new(U256::ZERO),
            last_hash: RwLock::new(B256::ZERO),
        }
    }

    /// Advance the chain tip to `block_number`. Returns the previous tip; the tip never moves
    /// backwards.
    pub fn observe_block(&self, block_number: u64) -> u64 {
        self.chain_tip.fetch_max(block_number, Ordering::AcqRel)
    }

    pub fn chain_tip(&self) -> u64 {
        self.chain_tip.load(Ordering::Acquire)
    }

    pub fn publish_snapshot(&self, last_hash: B256, supply: U256) {
        *write_recovering(&self.last_hash, "last_hash") = last_hash;
        *write_recovering(&self.supply, "supply") = supply;
    }

    pub fn set_supply(&self, supply: U256) {
        *write_recovering(&self.supply, "supply") = supply;
    }

    pub fn supply(&self) -> U256 {
        *read_recovering(&self.supply, "supply")
    }

    pub fn last_hash(&self) -> B256 {
        *read_recovering(&self.last_hash, "last_hash")
    }

    pub fn latest_round(&self) -> u64 {
        self.latest_round.load(Ordering::SeqCst)
    }

    /// Move the latest-round marker to `start_block` if it is strictly newer.
    ///
    /// Returns `false` (and leaves the marker untouched) for duplicate or older settlements.
    pub fn try_begin_round(&self, start_block: u64) -> bool {
        let mut current = self.latest_round.load(Ordering::SeqCst);
        while start_block > current {
            match self.latest_round.compare_exchange(
                current,
                start_block,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
        false
    }

    pub fn round_token(self: &Arc<Self>, start_block: u64) -> RoundToken {
        RoundToken {
            state: Arc::clone(self),
            start_block,
        }
    }
}

/// Cancellation handle for one round's search.
///
/// Cancelled as soon as any newer round is started on the shared state.
#[derive(Debug, Clone)]
pub struct RoundToken {
    state: Arc<MinerState>,
    start_block: u64,
}

impl RoundToken {
    pub fn start_block(&self) -> u64 {
        self.start_block
    }

    pub fn is_superseded(&self) -> bool {
        self.state.latest_round() != self.start_block
    }
}
