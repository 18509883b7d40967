//! Boost scripts and the jobs derived from them
//!
//! A Boost output script publishes a proof-of-work puzzle; the input script
//! that redeems it carries the solution. Both are fixed templates, compiled
//! from typed fields and matched back into them.

pub mod input_script;
pub mod job;
pub mod output_script;
pub mod script;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use input_script::InputScript;
pub use job::{work_proof, Job};
pub use output_script::OutputScript;

/// Kind of Boost script
///
/// A bounty can be claimed by any miner, who names their address when
/// redeeming. A contract binds the miner address at publication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostType {
    /// Not a Boost script
    #[default]
    Invalid,
    Bounty,
    Contract,
}

impl BoostType {
    pub fn is_valid(&self) -> bool {
        *self != BoostType::Invalid
    }
}

impl fmt::Display for BoostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoostType::Invalid => "invalid",
            BoostType::Bounty => "bounty",
            BoostType::Contract => "contract",
        };
        f.write_str(name)
    }
}
