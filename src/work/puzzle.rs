//! Puzzles, solutions and the 80-byte candidate header
//!
//! A puzzle fixes every field of a block-header-shaped buffer except the ones
//! a worker varies: the timestamp, the nonce and the two extra nonces that
//! feed the Merkle root.

use crate::crypto::hash256;
use crate::types::Digest256;
use crate::work::Target;
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Authentication path from the leaf to the Merkle root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MerklePath {
    /// Position of the leaf; bit `i` selects the side at depth `i`
    pub index: u32,
    /// Sibling digests, leaf first
    pub digests: Vec<Digest256>,
}

impl MerklePath {
    pub fn new(index: u32, digests: Vec<Digest256>) -> Self {
        Self { index, digests }
    }

    /// Fold `leaf` up the path
    pub fn root(&self, leaf: Digest256) -> Digest256 {
        let mut index = self.index;
        let mut current = leaf;
        let mut buf = [0u8; 64];
        for sibling in &self.digests {
            if index & 1 == 1 {
                buf[..32].copy_from_slice(sibling.as_bytes());
                buf[32..].copy_from_slice(current.as_bytes());
            } else {
                buf[..32].copy_from_slice(current.as_bytes());
                buf[32..].copy_from_slice(sibling.as_bytes());
            }
            current = hash256(&buf);
            index >>= 1;
        }
        current
    }
}

/// Everything about a unit of work except the worker's choices
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Puzzle {
    pub category: i32,
    pub content: Digest256,
    pub target: Target,
    pub path: MerklePath,
    /// Bytes hashed before the extra nonces
    #[serde(with = "hex::serde")]
    pub header: Vec<u8>,
    /// Bytes hashed after the extra nonces
    #[serde(with = "hex::serde")]
    pub body: Vec<u8>,
}

impl Puzzle {
    pub fn new(
        category: i32,
        content: Digest256,
        target: Target,
        path: MerklePath,
        header: Vec<u8>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            category,
            content,
            target,
            path,
            header,
            body,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.target.is_valid()
    }

    /// Merkle root the candidate commits to for the given extra nonces
    pub fn merkle_root(&self, extra_nonce_1: u32, extra_nonce_2: u64) -> Digest256 {
        let mut leaf = Vec::with_capacity(self.header.len() + Solution::EXTRA_NONCE_SIZE + self.body.len());
        leaf.extend_from_slice(&self.header);
        leaf.extend_from_slice(&extra_nonce_1.to_le_bytes());
        leaf.extend_from_slice(&extra_nonce_2.to_le_bytes());
        leaf.extend_from_slice(&self.body);
        self.path.root(hash256(&leaf))
    }
}

/// The values a worker chooses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Solution {
    pub timestamp: u32,
    pub nonce: u32,
    pub extra_nonce_1: u32,
    pub extra_nonce_2: u64,
}

impl Solution {
    /// Length of `extra_nonce_1 ‖ extra_nonce_2`
    pub const EXTRA_NONCE_SIZE: usize = 12;

    pub fn new(timestamp: u32, nonce: u32, extra_nonce_1: u32, extra_nonce_2: u64) -> Self {
        Self {
            timestamp,
            nonce,
            extra_nonce_1,
            extra_nonce_2,
        }
    }

    /// The 12-byte extra nonce as it is hashed
    pub fn extra_nonce(&self) -> [u8; 12] {
        let mut bytes = [0u8; 12];
        LittleEndian::write_u32(&mut bytes[..4], self.extra_nonce_1);
        LittleEndian::write_u64(&mut bytes[4..], self.extra_nonce_2);
        bytes
    }

    /// Same solution with a different nonce
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }
}

/// The 80-byte buffer whose double hash is checked against the target
///
/// Layout: `category ‖ content ‖ merkle root ‖ timestamp ‖ target ‖ nonce`,
/// integers little-endian.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Candidate([u8; 80]);

impl Candidate {
    pub const SIZE: usize = 80;

    const CATEGORY: usize = 0;
    const CONTENT: usize = 4;
    const MERKLE_ROOT: usize = 36;
    const TIMESTAMP: usize = 68;
    const TARGET: usize = 72;
    const NONCE: usize = 76;

    pub fn new(puzzle: &Puzzle, solution: &Solution) -> Self {
        let root = puzzle.merkle_root(solution.extra_nonce_1, solution.extra_nonce_2);
        Self::with_root(puzzle, root, solution.timestamp, solution.nonce)
    }

    /// Assemble from a precomputed Merkle root
    pub fn with_root(puzzle: &Puzzle, root: Digest256, timestamp: u32, nonce: u32) -> Self {
        let mut data = [0u8; 80];
        LittleEndian::write_i32(&mut data[Self::CATEGORY..Self::CONTENT], puzzle.category);
        data[Self::CONTENT..Self::MERKLE_ROOT].copy_from_slice(puzzle.content.as_bytes());
        data[Self::MERKLE_ROOT..Self::TIMESTAMP].copy_from_slice(root.as_bytes());
        LittleEndian::write_u32(&mut data[Self::TIMESTAMP..Self::TARGET], timestamp);
        data[Self::TARGET..Self::NONCE].copy_from_slice(&puzzle.target.to_le_bytes());
        LittleEndian::write_u32(&mut data[Self::NONCE..], nonce);
        Self(data)
    }

    pub fn from_bytes(data: [u8; 80]) -> Self {
        Self(data)
    }

    pub fn as_bytes(&self) -> &[u8; 80] {
        &self.0
    }

    /// Overwrite the nonce in place
    pub fn set_nonce(&mut self, nonce: u32) {
        LittleEndian::write_u32(&mut self.0[Self::NONCE..], nonce);
    }

    pub fn hash(&self) -> Digest256 {
        hash256(&self.0)
    }

    pub fn category(&self) -> i32 {
        LittleEndian::read_i32(&self.0[Self::CATEGORY..Self::CONTENT])
    }

    pub fn content(&self) -> Digest256 {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&self.0[Self::CONTENT..Self::MERKLE_ROOT]);
        Digest256(bytes)
    }

    pub fn merkle_root(&self) -> Digest256 {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&self.0[Self::MERKLE_ROOT..Self::TIMESTAMP]);
        Digest256(bytes)
    }

    pub fn timestamp(&self) -> u32 {
        LittleEndian::read_u32(&self.0[Self::TIMESTAMP..Self::TARGET])
    }

    pub fn target(&self) -> Target {
        Target::from_compact(LittleEndian::read_u32(&self.0[Self::TARGET..Self::NONCE]))
    }

    pub fn nonce(&self) -> u32 {
        LittleEndian::read_u32(&self.0[Self::NONCE..])
    }

    /// True iff the double hash is strictly below the embedded target
    pub fn is_valid(&self) -> bool {
        let target = self.target();
        target.is_valid() && target.check_hash(&self.hash())
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Candidate({})", hex::encode(self.0))
    }
}

/// A puzzle paired with a solution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub puzzle: Puzzle,
    pub solution: Solution,
}

impl Proof {
    pub fn new(puzzle: Puzzle, solution: Solution) -> Self {
        Self { puzzle, solution }
    }

    pub fn candidate(&self) -> Candidate {
        Candidate::new(&self.puzzle, &self.solution)
    }

    /// The puzzle is well formed and the solution meets its target
    pub fn is_valid(&self) -> bool {
        self.puzzle.is_valid() && self.candidate().is_valid()
    }
}
