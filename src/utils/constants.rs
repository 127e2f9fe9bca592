use alloy::primitives::{address, b256, Address, B256, U256};

/// Doomsday settlement contract on mainnet.
pub const DOOMSDAY_ADDRESS: Address = address!("b4cba31bdaf6ff6e34efc0cfc4906bd29b0146e9");

/// `topics[0]` of the contract's settlement event.
pub const SETTLE_TOPIC: B256 =
    b256!("bf6a0a18cb8b34e66dceac63a664d56b954595faa49f2a9c2c1f94d878fb6ce1");

/// Multicall3 is deployed at the same address on every EVM chain we care about.
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// 38597363079105398474523661669562635951089994888546854679819194669304376
pub const BASE_DIFFICULTY: U256 = U256::from_limbs([
    0x2bc4_6253_6a99_8a38,
    0x120b_53a9_83aa_d336,
    0x8467_9197_fbc3_12c8,
    0x0000_0597_a7e0_3ca4,
]);

pub const DIFFICULTY_RAMP: u64 = 15_000;
pub const DIFFICULTY_COOLDOWN_BLOCKS: u64 = 25;
pub const DIFFICULTY_COOLDOWN_SLOPE: u64 = 15;

/// Candidates evaluated between progress reports from the search loop.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;
