use alloy::primitives::{keccak256, Address, B256, U256};

const ADDRESS_LEN: usize = 20;
const HASH_OFFSET: usize = ADDRESS_LEN;
const CANDIDATE_OFFSET: usize = HASH_OFFSET + 32;
/// `abi.encodePacked(address, bytes32, uint256)`
pub const PACKED_LEN: usize = CANDIDATE_OFFSET + 32;

/// Reusable preimage buffer for one round.
///
/// The participant and last hash prefix is written once; each call only rewrites the trailing
/// 32-byte big-endian candidate before hashing.
#[derive(Debug, Clone)]
pub struct SolutionHasher {
    preimage: [u8; PACKED_LEN],
}

impl SolutionHasher {
    pub fn new(participant: Address, last_hash: B256) -> Self {
        let mut preimage = [0u8; PACKED_LEN];
        preimage[..ADDRESS_LEN].copy_from_slice(participant.as_slice());
        preimage[HASH_OFFSET..CANDIDATE_OFFSET].copy_from_slice(last_hash.as_slice());
        Self { preimage }
    }

    pub fn solution(&mut self, candidate: U256) -> U256 {
        self.preimage[CANDIDATE_OFFSET..].copy_from_slice(&candidate.to_be_bytes::<32>());
        U256::from_be_bytes(keccak256(self.preimage).0)
    }
}

/// `uint256(keccak256(abi.encodePacked(participant, last_hash, candidate)))`
pub fn solution_for(participant: Address, last_hash: B256, candidate: U256) -> U256 {
    SolutionHasher::new(participant, last_hash).solution(candidate)
}
