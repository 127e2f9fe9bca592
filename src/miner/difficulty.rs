//! Time-varying difficulty threshold, mirroring the contract's own check.
//!
//! `threshold = base - ramp * supply`, divided by `slope * (window - elapsed)` while the round
//! is younger than `window` blocks. All arithmetic is exact 256-bit unsigned; division
//! truncates.

use crate::utils::constants::{
    BASE_DIFFICULTY, DIFFICULTY_COOLDOWN_BLOCKS, DIFFICULTY_COOLDOWN_SLOPE, DIFFICULTY_RAMP,
};
use alloy::primitives::U256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyParams {
    pub base: U256,
    pub ramp: U256,
    pub cooldown_window: u64,
    pub cooldown_slope: u64,
}

impl Default for DifficultyParams {
    fn default() -> Self {
        Self::contract()
    }
}

impl DifficultyParams {
    /// The constants deployed on-chain.
    pub const fn contract() -> Self {
        Self {
            base: BASE_DIFFICULTY,
            ramp: U256::from_limbs([DIFFICULTY_RAMP, 0, 0, 0]),
            cooldown_window: DIFFICULTY_COOLDOWN_BLOCKS,
            cooldown_slope: DIFFICULTY_COOLDOWN_SLOPE,
        }
    }

    /// `base - ramp * supply`, floored at zero.
    pub fn unadjusted(&self, supply: U256) -> U256 {
        self.base.saturating_sub(self.ramp.saturating_mul(supply))
    }

    /// Divisor applied during the cooldown window, or `None` once the window has passed.
    ///
    /// Never returns zero: `window - elapsed` is at least 1 inside the window, and a zero slope
    /// disables the adjustment.
    pub fn cooldown_divisor(&self, elapsed: u64) -> Option<U256> {
        if elapsed >= self.cooldown_window {
            return None;
        }
        let remaining = self.cooldown_window - elapsed;
        let divisor = U256::from(self.cooldown_slope).saturating_mul(U256::from(remaining));
        (!divisor.is_zero()).then_some(divisor)
    }

    pub fn threshold(&self, supply: U256, elapsed: u64) -> U256 {
        let difficulty = self.unadjusted(supply);
        match self.cooldown_divisor(elapsed) {
            Some(divisor) => difficulty.checked_div(divisor).unwrap_or(difficulty),
            None => difficulty,
        }
    }
}

/// Blocks since the round opened. A tip behind the round start counts as zero.
pub fn elapsed_blocks(current_block: u64, start_block: u64) -> u64 {
    current_block.saturating_sub(start_block)
}
