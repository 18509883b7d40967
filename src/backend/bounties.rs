//! Priority queue of bounty scripts
//!
//! Entries are ranked by bounty per unit of difficulty, most profitable
//! first. Several on-chain outputs can carry the same script; they share one
//! entry and their outpoints are tracked together under the script ID.

use super::output::Output;
use crate::boost::OutputScript;
use crate::types::{Digest256, Outpoint, Satoshi};
use std::collections::HashMap;
use tracing::{debug, info};

/// A ranked bounty
#[derive(Debug, Clone, PartialEq)]
pub struct BountyEntry {
    pub script: OutputScript,
    pub bounty: Satoshi,
    pub difficulty: f64,
    pub bounty_per_difficulty: f64,
    pub id: Digest256,
}

impl BountyEntry {
    /// Cost of the work under a linear cost model
    pub fn cost(&self, cost_per_difficulty: f64, constant_cost: f64) -> f64 {
        constant_cost + cost_per_difficulty * self.difficulty
    }

    /// `(bounty - cost) / cost`, `None` when the cost is not positive
    pub fn profitability(&self, cost_per_difficulty: f64, constant_cost: f64) -> Option<f64> {
        let cost = self.cost(cost_per_difficulty, constant_cost);
        if cost <= 0.0 {
            return None;
        }
        Some((self.bounty as f64 - cost) / cost)
    }
}

#[derive(Debug, Default)]
pub struct BountiesQueue {
    list: Vec<BountyEntry>,
    entries: HashMap<Digest256, Vec<Outpoint>>,
    difficulty: f64,
}

impl BountiesQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn contains(&self, id: &Digest256) -> bool {
        self.entries.contains_key(id)
    }

    /// Total difficulty of all queued entries
    pub fn difficulty(&self) -> f64 {
        self.difficulty
    }

    /// Entries in rank order
    pub fn iter(&self) -> impl Iterator<Item = &BountyEntry> {
        self.list.iter()
    }

    pub fn get(&self, id: &Digest256) -> Option<&BountyEntry> {
        self.list.iter().find(|e| &e.id == id)
    }

    /// Outpoints currently offering the script with this ID
    pub fn outpoints(&self, id: &Digest256) -> &[Outpoint] {
        self.entries.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Queue a bounty output. Anything that is not a valid bounty is ignored.
    pub fn push(&mut self, output: &Output) {
        if !output.script.is_bounty() {
            debug!(id = %output.id, "ignoring non-bounty output");
            return;
        }

        if self.add_output(output) {
            return;
        }

        let difficulty = match output.script.difficulty() {
            Ok(d) => d.to_f64(),
            Err(e) => {
                debug!(id = %output.id, error = %e, "ignoring bounty with invalid target");
                return;
            }
        };

        let entry = BountyEntry {
            script: output.script.clone(),
            bounty: output.value,
            difficulty,
            bounty_per_difficulty: output.value as f64 / difficulty,
            id: output.id,
        };

        // Ties keep arrival order.
        let position = self
            .list
            .partition_point(|e| e.bounty_per_difficulty >= entry.bounty_per_difficulty);
        info!(
            id = %entry.id,
            bounty = entry.bounty,
            difficulty = entry.difficulty,
            rank = position,
            "bounty queued"
        );

        self.difficulty += difficulty;
        self.list.insert(position, entry);
        self.entries.insert(output.id, vec![output.outpoint]);
    }

    /// Record another output for a queued script
    ///
    /// Returns false if the script is not queued. Rank and difficulty are
    /// those of the first output.
    pub fn add_output(&mut self, output: &Output) -> bool {
        let Some(outpoints) = self.entries.get_mut(&output.id) else {
            return false;
        };
        if !outpoints.contains(&output.outpoint) {
            outpoints.push(output.outpoint);
        }
        debug!(id = %output.id, outpoint = %output.outpoint, "duplicate bounty output");
        true
    }

    /// Remove a script and return every outpoint that offered it
    pub fn remove(&mut self, id: &Digest256) -> Vec<Outpoint> {
        let Some(outpoints) = self.entries.remove(id) else {
            return Vec::new();
        };

        if let Some(position) = self.list.iter().position(|e| &e.id == id) {
            let removed = self.list.remove(position);
            self.difficulty -= removed.difficulty;
            if self.list.is_empty() {
                self.difficulty = 0.0;
            }
        }

        info!(id = %id, outpoints = outpoints.len(), "bounty removed");
        outpoints
    }

    /// Profitable entries in rank order with their profitability
    fn profitable(
        &self,
        cost_per_difficulty: f64,
        constant_cost: f64,
    ) -> impl Iterator<Item = (&BountyEntry, f64)> {
        self.list
            .iter()
            .map(move |e| (e, e.profitability(cost_per_difficulty, constant_cost)))
            .take_while(|(_, p)| matches!(p, Some(p) if *p >= 0.0))
            .map(|(e, p)| (e, p.unwrap_or_default()))
    }

    /// Total difficulty of the entries worth working on
    pub fn profitable_difficulty(&self, cost_per_difficulty: f64, constant_cost: f64) -> f64 {
        self.profitable(cost_per_difficulty, constant_cost)
            .map(|(e, _)| e.difficulty)
            .sum()
    }

    /// Draw a profitable script, weighted by profitability
    ///
    /// `random` is a uniform draw from `[0, 1)`. Returns `None` if nothing
    /// in the queue is profitable.
    pub fn select(
        &self,
        random: f64,
        cost_per_difficulty: f64,
        constant_cost: f64,
    ) -> Option<&OutputScript> {
        let mut normalization = 0.0;
        let mut accumulated = Vec::new();
        for (_, profitability) in self.profitable(cost_per_difficulty, constant_cost) {
            normalization += profitability;
            accumulated.push(normalization);
        }

        if normalization <= 0.0 {
            return None;
        }

        let r = random.clamp(0.0, 1.0 - f64::EPSILON) * normalization;
        let index = accumulated
            .iter()
            .position(|&running_total| r < running_total)
            .unwrap_or(accumulated.len() - 1);

        self.list.get(index).map(|e| &e.script)
    }
}
