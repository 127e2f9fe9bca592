pub mod difficulty;
pub mod search;
pub mod solution;
pub mod state;

use alloy::primitives::B256;

pub use difficulty::DifficultyParams;
pub use search::{SearchConfig, SearchEngine, SearchOutcome};
pub use solution::SolutionHasher;
pub use state::{MinerState, RoundToken};

/// One competitive cycle, opened by a settlement event at `start_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Round {
    pub start_block: u64,
    pub last_hash: B256,
}
