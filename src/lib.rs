//! Boost proof of work
//!
//! Proof of work as a tradeable asset, published in transaction outputs:
//! - Compact targets and exact difficulty arithmetic
//! - The Boost output/input script codec and job derivation
//! - Queues of bounty and contract jobs, hashpower assignment and
//!   in-progress tracking for a pool that sells and buys Boost work

pub mod backend;
pub mod boost;
pub mod config;
pub mod crypto;
pub mod error;
pub mod types;
pub mod utils;
pub mod work;

pub use boost::{work_proof, BoostType, InputScript, Job, OutputScript};
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
pub use work::{Candidate, Difficulty, MerklePath, Proof, Puzzle, Solution, Target};

/// Application information
pub const APP_NAME: &str = "boost-pow";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
