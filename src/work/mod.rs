//! Proof-of-work primitives: compact targets, exact difficulty and puzzles

pub mod difficulty;
pub mod puzzle;
pub mod target;

pub use difficulty::{Difficulty, DIFFICULTY_1_TARGET};
pub use puzzle::{Candidate, MerklePath, Proof, Puzzle, Solution};
pub use target::Target;
