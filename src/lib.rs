//! Doomsday miner library surface.
//!
//! The round monitor ([`monitor`]) watches new blocks for the contract's settlement event and
//! launches a per-round search ([`miner::search`]) that races for a `settle()` location whose
//! hash falls below the live difficulty threshold. Chain access is behind
//! [`chain::ChainClient`].

pub mod chain;
pub mod error;
pub mod miner;
pub mod monitor;
pub mod runtime;
pub mod utils;
