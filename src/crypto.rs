//! Hashing for Boost proof of work
//!
//! Provides double SHA-256 and HASH160 plus a CPU nonce search over candidates.

use crate::types::Digest256;
use crate::work::{Candidate, Puzzle, Solution, Target};
use bitcoin_hashes::{hash160 as ripemd_sha, sha256d, Hash};
use std::cmp::Ordering;

/// Double SHA-256
pub fn hash256(data: &[u8]) -> Digest256 {
    Digest256(sha256d::Hash::hash(data).to_byte_array())
}

/// RIPEMD-160 of SHA-256, the public key hash
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd_sha::Hash::hash(data).to_byte_array()
}

/// CPU searcher over the nonce space of a puzzle
#[derive(Debug, Default)]
pub struct Sha256dHasher {
    hashes: u64,
}

impl Sha256dHasher {
    /// Number of distinct 32-bit nonces
    pub const NONCE_SPACE: u64 = 1 << 32;

    pub fn new() -> Self {
        Self::default()
    }

    /// Total hashes computed by this searcher
    pub fn hashes(&self) -> u64 {
        self.hashes
    }

    /// Hash a candidate and check it against its own target
    pub fn hash_and_check(&mut self, candidate: &Candidate) -> (bool, Digest256) {
        self.hashes += 1;
        let hash = candidate.hash();
        (candidate.target().check_hash(&hash), hash)
    }

    /// Scan `count` nonces starting at `template.nonce`, wrapping around
    /// Returns the first solution that meets the puzzle's target, if any.
    /// A count above [`Self::NONCE_SPACE`] scans the whole space once.
    pub fn search(&mut self, puzzle: &Puzzle, template: Solution, count: u64) -> Option<Solution> {
        if !puzzle.is_valid() {
            return None;
        }

        // The root only depends on the extra nonces, so it is computed once.
        let root = puzzle.merkle_root(template.extra_nonce_1, template.extra_nonce_2);
        let mut candidate = Candidate::with_root(puzzle, root, template.timestamp, template.nonce);

        for i in 0..count.min(Self::NONCE_SPACE) {
            let nonce = template.nonce.wrapping_add(i as u32);
            candidate.set_nonce(nonce);

            let (meets_target, _hash) = self.hash_and_check(&candidate);
            if meets_target {
                return Some(template.with_nonce(nonce));
            }
        }

        None
    }
}

impl Target {
    /// Check if a hash meets this target: strictly below it as a little-endian number
    pub fn check_hash(&self, hash: &Digest256) -> bool {
        let target = self.expand().to_bytes_le();
        if target.len() > 32 {
            return true;
        }
        let mut expanded = [0u8; 32];
        expanded[..target.len()].copy_from_slice(&target);

        // Most significant byte is last.
        for i in (0..32).rev() {
            match hash.0[i].cmp(&expanded[i]) {
                Ordering::Less => return true,
                Ordering::Greater => return false,
                Ordering::Equal => continue,
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::MerklePath;

    #[test]
    fn test_hash256_known_vector() {
        // Double SHA-256 of the empty string.
        assert_eq!(
            hash256(b"").to_hex(),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn test_hash160_known_vector() {
        assert_eq!(
            hex::encode(hash160(b"")),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }

    #[test]
    fn test_target_check_hash() {
        let zero_hash = Digest256([0u8; 32]);
        let max_hash = Digest256([0xFFu8; 32]);

        assert!(Target::EASY.check_hash(&zero_hash));
        assert!(!Target::EASY.check_hash(&max_hash));
        // Strict comparison: the hardest target is only met by zero.
        assert!(Target::HARD.check_hash(&zero_hash));
        let mut one = [0u8; 32];
        one[0] = 1;
        assert!(!Target::HARD.check_hash(&Digest256(one)));
    }

    #[test]
    fn test_check_hash_agrees_with_bigint() {
        let target = Target::SUCCESS_HALF;
        let mut below = [0xffu8; 32];
        below[31] = 0x7f;
        let mut above = [0u8; 32];
        above[31] = 0x80;

        assert!(Digest256(below).to_biguint() < target.expand());
        assert!(target.check_hash(&Digest256(below)));
        assert!(!target.check_hash(&Digest256(above)));
    }

    #[test]
    fn test_search_finds_solution() {
        let puzzle = Puzzle::new(
            1,
            Digest256([3; 32]),
            Target::SUCCESS_QUARTER,
            MerklePath::default(),
            vec![0u8; 20],
            vec![0u8; 4],
        );
        let mut hasher = Sha256dHasher::new();
        let solution = hasher
            .search(&puzzle, Solution::new(1_700_000_000, 0, 0, 0), 1000)
            .expect("a quarter of all hashes succeed");

        assert!(Candidate::new(&puzzle, &solution).is_valid());
        assert!(hasher.hashes() >= 1);
        assert!(solution.nonce < 1000);
    }

    #[test]
    fn test_search_window_includes_last_nonce() {
        let puzzle = Puzzle::new(
            2,
            Digest256([5; 32]),
            Target::SUCCESS_EIGHTH,
            MerklePath::default(),
            vec![1u8; 20],
            vec![2u8; 4],
        );
        // Start near the top so the window wraps past u32::MAX.
        let start = Solution::new(1_700_000_000, u32::MAX - 3, 0, 0);
        let found = Sha256dHasher::new()
            .search(&puzzle, start, 1000)
            .expect("an eighth of all hashes succeed");
        let offset = u64::from(found.nonce.wrapping_sub(start.nonce)) + 1;

        // A window ending just before the first solution misses it.
        let mut hasher = Sha256dHasher::new();
        assert!(hasher.search(&puzzle, start, offset - 1).is_none());
        assert_eq!(hasher.hashes(), offset - 1);

        // A window ending exactly on it finds it as its last hash.
        let mut hasher = Sha256dHasher::new();
        assert_eq!(hasher.search(&puzzle, start, offset), Some(found));
        assert_eq!(hasher.hashes(), offset);
    }

    #[test]
    fn test_nonce_space_covers_every_nonce() {
        assert_eq!(Sha256dHasher::NONCE_SPACE, u64::from(u32::MAX) + 1);
    }

    #[test]
    fn test_search_rejects_invalid_puzzle() {
        let mut hasher = Sha256dHasher::new();
        assert!(hasher.search(&Puzzle::default(), Solution::default(), 10).is_none());
        assert_eq!(hasher.hashes(), 0);
    }
}
