//! How a pool should split its hashpower between blocks and Boost work
//!
//! Hashpower is measured in difficulty per second.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Difficulty per second
pub type Hashpower = f64;

/// `(reward - cost) / cost`
pub type Profitability = f64;

/// Fractions of hashpower for each kind of work, summing to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdealHashpowerAssignment {
    pub blocks: f64,
    pub boost_bounty: f64,
    pub boost_contract: f64,
}

impl IdealHashpowerAssignment {
    /// Block mining never drops below this share
    pub const BLOCKS_MINIMUM: f64 = 0.25;

    /// Split hashpower in proportion to profitability
    pub fn new(blocks: Profitability, boost_bounty: Profitability, boost_contract: Profitability) -> Self {
        let mut blocks = blocks.max(0.0);
        let boost_bounty = boost_bounty.max(0.0);
        let boost_contract = boost_contract.max(0.0);

        // Blocks are mined even when nothing is profitable.
        if boost_bounty == 0.0 && boost_contract == 0.0 {
            blocks = 1.0;
        }

        let sum = blocks + boost_bounty + boost_contract;
        let mut assignment = Self {
            blocks: blocks / sum,
            boost_bounty: boost_bounty / sum,
            boost_contract: boost_contract / sum,
        };

        if assignment.blocks < Self::BLOCKS_MINIMUM {
            let boost = assignment.boost_bounty + assignment.boost_contract;
            let factor = (1.0 - Self::BLOCKS_MINIMUM) / boost;
            assignment.blocks = Self::BLOCKS_MINIMUM;
            assignment.boost_bounty *= factor;
            assignment.boost_contract *= factor;
        }

        assignment
    }

    /// Apply the split to a total amount of hashpower
    pub fn assign(&self, total: Hashpower) -> Assignments {
        Assignments {
            blocks: self.blocks * total,
            boost_bounty: self.boost_bounty * total,
            boost_contract: self.boost_contract * total,
        }
    }
}

impl Default for IdealHashpowerAssignment {
    fn default() -> Self {
        Self {
            blocks: 1.0,
            boost_bounty: 0.0,
            boost_contract: 0.0,
        }
    }
}

/// Hashpower currently devoted to each kind of work
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignments {
    pub blocks: Hashpower,
    pub boost_bounty: Hashpower,
    pub boost_contract: Hashpower,
}

impl Assignments {
    pub fn total(&self) -> Hashpower {
        self.blocks + self.boost_bounty + self.boost_contract
    }
}

/// What the market looked like when a new block arrived
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketObservation {
    /// Profitability of mining blocks
    pub blocks: Profitability,
    pub hashpower_price_satoshis_per_difficulty: f64,
    pub bounty_queue_profitable_difficulty: f64,
    pub contract_queue_difficulty: f64,
    pub current_assignments: Assignments,
}

/// Target split and contract pricing, recomputed on every block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub ideal_assignment: IdealHashpowerAssignment,
    pub contract_price_per_difficulty: f64,
    /// How long the contract queue should take to drain
    #[serde(with = "crate::utils::humantime_duration")]
    pub contract_queue_time: Duration,
}

impl Goal {
    pub const CONTRACT_QUEUE_TIME: Duration = Duration::from_secs(10 * 60);

    pub fn new(ideal_assignment: IdealHashpowerAssignment, contract_price_per_difficulty: f64) -> Self {
        Self {
            ideal_assignment,
            contract_price_per_difficulty,
            contract_queue_time: Self::CONTRACT_QUEUE_TIME,
        }
    }

    pub fn with_contract_queue_time(mut self, contract_queue_time: Duration) -> Self {
        self.contract_queue_time = contract_queue_time;
        self
    }

    /// Recompute the goal from a fresh market observation
    ///
    /// The pricing rule has not been settled, so this always fails.
    pub fn reasses(&self, observation: &MarketObservation) -> Result<Goal> {
        tracing::warn!(
            contract_queue_difficulty = observation.contract_queue_difficulty,
            bounty_queue_profitable_difficulty = observation.bounty_queue_profitable_difficulty,
            "goal reassessment requested"
        );
        Err(Error::not_implemented("goal reassessment"))
    }
}

impl Default for Goal {
    fn default() -> Self {
        Self::new(IdealHashpowerAssignment::default(), 0.0)
    }
}

/// Time to work through `difficulty` at `hashpower`, `None` with no hashpower
pub fn drain_time(difficulty: f64, hashpower: Hashpower) -> Option<Duration> {
    if hashpower <= 0.0 || difficulty < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(difficulty / hashpower).ok()
}
