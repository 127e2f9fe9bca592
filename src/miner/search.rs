//! Per-round candidate search.
//!
//! A search moves `Searching -> Won | Superseded | Aborted`. The hash loop ([`scan`]) is pure
//! CPU work and runs on a blocking worker; [`SearchEngine::search`] wraps it with the
//! `settle` simulation and broadcast, re-checking cancellation before each of them.

use crate::chain::{ChainClient, SettleReceipt};
use crate::miner::difficulty::{elapsed_blocks, DifficultyParams};
use crate::miner::solution::SolutionHasher;
use crate::miner::state::{MinerState, RoundToken};
use crate::miner::Round;
use crate::utils::constants::DEFAULT_PROGRESS_INTERVAL;
use crate::utils::error::compact_error_message;
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    pub participant: Address,
    pub params: DifficultyParams,
    /// Candidates between progress log lines.
    pub progress_interval: u64,
}

impl SearchConfig {
    pub fn new(participant: Address) -> Self {
        Self {
            participant,
            params: DifficultyParams::contract(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// One candidate evaluation, as seen by the [`scan_with`] observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub candidate: U256,
    pub solution: U256,
    pub threshold: U256,
}

impl Evaluation {
    pub fn wins(&self) -> bool {
        self.solution < self.threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanResult {
    Found { candidate: U256, evaluated: u64 },
    Superseded { evaluated: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Won {
        candidate: U256,
        receipt: SettleReceipt,
    },
    /// A newer round started; nothing was submitted.
    Superseded { evaluated: u64 },
    /// A winner was found but its `settle` failed or reverted (typically a competitor settled
    /// first).
    Aborted { candidate: U256, reason: String },
    /// The search worker itself died before producing a candidate.
    Failed { reason: String },
}

/// Evaluate candidates `1, 2, 3, ...` until one beats the live threshold or the round is
/// superseded.
pub fn scan(
    round: &Round,
    token: &RoundToken,
    state: &MinerState,
    config: &SearchConfig,
) -> ScanResult {
    scan_with(round, token, state, config, |_| {})
}

/// [`scan`] with `observe` invoked after every evaluation, before the win check acts on it.
pub fn scan_with<F>(
    round: &Round,
    token: &RoundToken,
    state: &MinerState,
    config: &SearchConfig,
    mut observe: F,
) -> ScanResult
where
    F: FnMut(&Evaluation),
{
    let mut hasher = SolutionHasher::new(config.participant, round.last_hash);
    let progress_interval = config.progress_interval.max(1);
    let mut candidate = U256::from(1u64);
    let mut evaluated = 0u64;

    loop {
        // Checked before hashing so cancellation latency is one evaluation.
        if token.is_superseded() {
            return ScanResult::Superseded { evaluated };
        }

        let solution = hasher.solution(candidate);
        let elapsed = elapsed_blocks(state.chain_tip(), round.start_block);
        let threshold = config.params.threshold(state.supply(), elapsed);
        evaluated += 1;

        let evaluation = Evaluation {
            candidate,
            solution,
            threshold,
        };
        observe(&evaluation);
        if evaluation.wins() {
            return ScanResult::Found {
                candidate,
                evaluated,
            };
        }

        if evaluated % progress_interval == 0 {
            tracing::debug!(
                "[MINE] round={} location={} elapsed={}",
                round.start_block,
                candidate,
                elapsed
            );
        }
        candidate += U256::from(1u64);
    }
}

pub struct SearchEngine<C> {
    chain: Arc<C>,
    state: Arc<MinerState>,
    config: SearchConfig,
}

impl<C> SearchEngine<C>
where
    C: ChainClient + 'static,
{
    pub fn new(chain: Arc<C>, state: Arc<MinerState>, config: SearchConfig) -> Self {
        Self {
            chain,
            state,
            config,
        }
    }

    /// Fire-and-forget launch. The handle may be dropped; the search stops on its own once
    /// the round is superseded.
    pub fn spawn(self: &Arc<Self>, round: Round) -> JoinHandle<SearchOutcome> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.search(round).await })
    }

    pub async fn search(&self, round: Round) -> SearchOutcome {
        self.search_with(round, |_| {}).await
    }

    /// [`search`](Self::search) with an observer forwarded to [`scan_with`].
    pub async fn search_with<F>(&self, round: Round, observe: F) -> SearchOutcome
    where
        F: FnMut(&Evaluation) + Send + 'static,
    {
        let token = self.state.round_token(round.start_block);
        tracing::info!(
            "[MINE] start mining: round={} last_hash={:#x}",
            round.start_block,
            round.last_hash
        );

        let scan_result = {
            let state = Arc::clone(&self.state);
            let config = self.config;
            let token = token.clone();
            tokio::task::spawn_blocking(move || scan_with(&round, &token, &state, &config, observe))
                .await
        };

        let (candidate, evaluated) = match scan_result {
            Ok(ScanResult::Found {
                candidate,
                evaluated,
            }) => (candidate, evaluated),
            Ok(ScanResult::Superseded { evaluated }) => {
                tracing::info!(
                    "[MINE] end mining: round={} superseded by round={} after {} candidates",
                    round.start_block,
                    self.state.latest_round(),
                    evaluated
                );
                return SearchOutcome::Superseded { evaluated };
            }
            Err(join_err) => {
                tracing::error!(
                    "[MINE] search worker for round={} died: {}",
                    round.start_block,
                    join_err
                );
                return SearchOutcome::Failed {
                    reason: format!("search worker failed: {join_err}"),
                };
            }
        };

        tracing::info!(
            "[MINE] SOLUTION FOUND: round={} location={} after {} candidates",
            round.start_block,
            candidate,
            evaluated
        );
        self.submit(&round, &token, candidate, evaluated).await
    }

    /// Simulate then send `settle(candidate)`, re-checking the round before each network step.
    async fn submit(
        &self,
        round: &Round,
        token: &RoundToken,
        candidate: U256,
        evaluated: u64,
    ) -> SearchOutcome {
        if self.superseded_before(token, "simulating", candidate) {
            return SearchOutcome::Superseded { evaluated };
        }
        if let Err(err) = self.chain.simulate_settle(candidate).await {
            return self.abort(round, candidate, &format!("{err:#}"));
        }
        if self.superseded_before(token, "sending", candidate) {
            return SearchOutcome::Superseded { evaluated };
        }

        let receipt = match self.chain.send_settle(candidate).await {
            Ok(receipt) => receipt,
            Err(err) => return self.abort(round, candidate, &format!("{err:#}")),
        };
        match receipt {
            SettleReceipt::Confirmed {
                tx_hash,
                success: false,
                ..
            } => {
                return self.abort(
                    round,
                    candidate,
                    &format!("settle tx {tx_hash:#x} reverted on-chain"),
                );
            }
            SettleReceipt::Confirmed {
                tx_hash,
                block_number,
                ..
            } => tracing::info!(
                "[SUBMIT] settle({}) mined tx={:#x} block={:?}",
                candidate,
                tx_hash,
                block_number
            ),
            SettleReceipt::Simulated => tracing::info!(
                "[SUBMIT] settle({}) simulated OK; dry run, not broadcast",
                candidate
            ),
        }
        SearchOutcome::Won { candidate, receipt }
    }

    // A round that ended while we were hashing or simulating must never be settled by us.
    fn superseded_before(&self, token: &RoundToken, step: &str, candidate: U256) -> bool {
        if !token.is_superseded() {
            return false;
        }
        tracing::info!(
            "[MINE] end mining: round={} superseded by round={} before {} location={}",
            token.start_block(),
            self.state.latest_round(),
            step,
            candidate
        );
        true
    }

    fn abort(&self, round: &Round, candidate: U256, message: &str) -> SearchOutcome {
        let reason = compact_error_message(message, 320);
        tracing::warn!(
            "[SUBMIT] settle({}) for round={} abandoned: {}",
            candidate,
            round.start_block,
            reason
        );
        SearchOutcome::Aborted { candidate, reason }
    }
}
