//! Assigning puzzles to workers
//!
//! A queue front owns a queue of Boost jobs and hands its selected puzzle to
//! workers. A queue end is the side new jobs are inserted into.

use super::bounties::BountiesQueue;
use super::contracts::{ContractJob, ContractsQueue};
use super::hashpower::Hashpower;
use super::output::Output;
use crate::boost::Job;
use crate::types::{Address, Digest256, Outpoint};
use crate::work::Puzzle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

/// Handle for a connected worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub Uuid);

impl WorkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A worker and the puzzle it is on
#[derive(Debug, Clone, PartialEq)]
pub struct Working {
    pub worker: WorkerId,
    pub puzzle: Puzzle,
    pub hashpower: Hashpower,
}

/// A worker waiting for work
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unassigned {
    pub worker: WorkerId,
    pub hashpower: Hashpower,
}

/// Who is working on what
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkSnapshot {
    pub workers: Vec<Working>,
}

impl WorkSnapshot {
    /// Hashpower devoted to each puzzle
    pub fn distribution(&self) -> HashMap<Puzzle, Hashpower> {
        let mut distribution = HashMap::new();
        for w in &self.workers {
            *distribution.entry(w.puzzle.clone()).or_insert(0.0) += w.hashpower;
        }
        distribution
    }

    pub fn total_hashpower(&self) -> Hashpower {
        self.workers.iter().map(|w| w.hashpower).sum()
    }
}

/// Instruction to put a worker on a puzzle
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub worker: WorkerId,
    pub puzzle: Puzzle,
}

/// Decides what workers should work on
pub trait JobManager {
    /// A job was completed; returns new work for the given workers
    fn job_complete(
        &mut self,
        completed: &Puzzle,
        snapshot: &WorkSnapshot,
        unassigned: &[Unassigned],
    ) -> Vec<Assignment>;

    /// New workers connected
    fn new_miner(&self, snapshot: &WorkSnapshot, unassigned: &[Unassigned]) -> Vec<Assignment>;

    /// Periodic chance to move workers between jobs
    fn rebalance(&self, snapshot: &WorkSnapshot) -> Vec<Assignment>;
}

/// Insertion side of a job queue
pub trait QueueEnd<T> {
    fn insert(&mut self, item: T);

    /// Another output paying to a queued script; false if it is not queued
    fn add_output(&mut self, output: &Output) -> bool;

    /// Remove a script, returning the outpoints that offered it
    fn remove(&mut self, id: &Digest256) -> Vec<Outpoint>;

    fn contains(&self, id: &Digest256) -> bool;

    /// Total difficulty queued
    fn difficulty(&self) -> f64;
}

fn assign_all(job: &Job, unassigned: &[Unassigned]) -> Vec<Assignment> {
    if !job.is_valid() {
        return Vec::new();
    }
    unassigned
        .iter()
        .map(|u| Assignment {
            worker: u.worker,
            puzzle: job.puzzle.clone(),
        })
        .collect()
}

/// Contracts worked strictly in order: the selected job is the queue front
#[derive(Debug, Default)]
pub struct ContractsFront {
    queue: ContractsQueue,
    selected: Job,
}

impl ContractsFront {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self) -> &ContractsQueue {
        &self.queue
    }

    pub fn selected(&self) -> &Job {
        &self.selected
    }

    /// The contract currently being worked on
    pub fn current(&self) -> Option<&ContractJob> {
        self.queue.front()
    }

    /// Drop the front job and select the next
    pub fn pop(&mut self) -> Option<ContractJob> {
        let popped = self.queue.pop();
        self.reselect();
        popped
    }

    fn reselect(&mut self) {
        self.selected = self.queue.front().map(ContractJob::job).unwrap_or_default();
    }
}

impl QueueEnd<ContractJob> for ContractsFront {
    fn insert(&mut self, item: ContractJob) {
        self.queue.push(item);
        if !self.selected.is_valid() {
            self.reselect();
        }
    }

    fn add_output(&mut self, output: &Output) -> bool {
        self.queue.add_output(output)
    }

    fn remove(&mut self, id: &Digest256) -> Vec<Outpoint> {
        let removed = self.queue.remove(id);
        self.reselect();
        removed.into_iter().flat_map(|j| j.outpoints).collect()
    }

    fn contains(&self, id: &Digest256) -> bool {
        self.queue.contains(id)
    }

    fn difficulty(&self) -> f64 {
        self.queue.difficulty()
    }
}

impl JobManager for ContractsFront {
    fn job_complete(
        &mut self,
        completed: &Puzzle,
        snapshot: &WorkSnapshot,
        unassigned: &[Unassigned],
    ) -> Vec<Assignment> {
        if self.selected.is_valid() && &self.selected.puzzle == completed {
            self.pop();
        }
        self.new_miner(snapshot, unassigned)
    }

    fn new_miner(&self, _snapshot: &WorkSnapshot, unassigned: &[Unassigned]) -> Vec<Assignment> {
        assign_all(&self.selected, unassigned)
    }

    fn rebalance(&self, _snapshot: &WorkSnapshot) -> Vec<Assignment> {
        Vec::new()
    }
}

/// A bounty output and the address we will redeem it to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BountyJob {
    pub output: Output,
    pub redeem_address: Address,
}

/// Bounties drawn at random, weighted by profitability
#[derive(Debug, Default)]
pub struct BountiesFront {
    queue: BountiesQueue,
    addresses: HashMap<Digest256, Address>,
    selected: Job,
    cost_per_difficulty: f64,
    constant_cost: f64,
}

impl BountiesFront {
    pub fn new(cost_per_difficulty: f64, constant_cost: f64) -> Self {
        Self {
            cost_per_difficulty,
            constant_cost,
            ..Self::default()
        }
    }

    pub fn queue(&self) -> &BountiesQueue {
        &self.queue
    }

    pub fn selected(&self) -> &Job {
        &self.selected
    }

    /// Address a queued bounty will be redeemed to
    pub fn redeem_address(&self, id: &Digest256) -> Option<Address> {
        self.addresses.get(id).copied()
    }

    /// Update the cost model used to judge profitability
    pub fn set_costs(&mut self, cost_per_difficulty: f64, constant_cost: f64) {
        self.cost_per_difficulty = cost_per_difficulty;
        self.constant_cost = constant_cost;
    }

    /// Draw a new selected job; `random` is uniform in `[0, 1)`
    pub fn select(&mut self, random: f64) -> &Job {
        let selected = self
            .queue
            .select(random, self.cost_per_difficulty, self.constant_cost)
            .and_then(|script| {
                let address = self.addresses.get(&script.id())?;
                Some(Job::new(script, *address))
            })
            .unwrap_or_default();

        if selected.is_valid() {
            debug!(id = %selected.output_script().id(), "bounty selected");
        }
        self.selected = selected;
        &self.selected
    }

    fn select_random(&mut self) {
        self.select(rand::random::<f64>());
    }

    /// ID of the queued bounty whose job is this puzzle
    fn find(&self, puzzle: &Puzzle) -> Option<Digest256> {
        self.queue
            .iter()
            .find(|e| {
                self.addresses
                    .get(&e.id)
                    .is_some_and(|address| &Job::new(&e.script, *address).puzzle == puzzle)
            })
            .map(|e| e.id)
    }
}

impl QueueEnd<BountyJob> for BountiesFront {
    fn insert(&mut self, item: BountyJob) {
        let id = item.output.id;
        let known = self.queue.contains(&id);
        self.queue.push(&item.output);
        if !known && self.queue.contains(&id) {
            self.addresses.insert(id, item.redeem_address);
        }
        if !self.selected.is_valid() {
            self.select_random();
        }
    }

    fn add_output(&mut self, output: &Output) -> bool {
        self.queue.add_output(output)
    }

    fn remove(&mut self, id: &Digest256) -> Vec<Outpoint> {
        self.addresses.remove(id);
        let outpoints = self.queue.remove(id);
        if self.selected.is_valid() && &self.selected.output_script().id() == id {
            self.select_random();
        }
        outpoints
    }

    fn contains(&self, id: &Digest256) -> bool {
        self.queue.contains(id)
    }

    fn difficulty(&self) -> f64 {
        self.queue.difficulty()
    }
}

impl JobManager for BountiesFront {
    fn job_complete(
        &mut self,
        completed: &Puzzle,
        snapshot: &WorkSnapshot,
        unassigned: &[Unassigned],
    ) -> Vec<Assignment> {
        if let Some(id) = self.find(completed) {
            info!(id = %id, "bounty job complete");
            self.remove(&id);
        }
        self.select_random();
        self.new_miner(snapshot, unassigned)
    }

    fn new_miner(&self, _snapshot: &WorkSnapshot, unassigned: &[Unassigned]) -> Vec<Assignment> {
        assign_all(&self.selected, unassigned)
    }

    fn rebalance(&self, _snapshot: &WorkSnapshot) -> Vec<Assignment> {
        Vec::new()
    }
}

/// Either kind of queue front
#[derive(Debug)]
pub enum QueueFront {
    Contracts(ContractsFront),
    Bounties(BountiesFront),
}

impl QueueFront {
    pub fn selected(&self) -> &Job {
        match self {
            QueueFront::Contracts(front) => front.selected(),
            QueueFront::Bounties(front) => front.selected(),
        }
    }

    pub fn difficulty(&self) -> f64 {
        match self {
            QueueFront::Contracts(front) => front.difficulty(),
            QueueFront::Bounties(front) => front.difficulty(),
        }
    }
}

impl JobManager for QueueFront {
    fn job_complete(
        &mut self,
        completed: &Puzzle,
        snapshot: &WorkSnapshot,
        unassigned: &[Unassigned],
    ) -> Vec<Assignment> {
        match self {
            QueueFront::Contracts(front) => front.job_complete(completed, snapshot, unassigned),
            QueueFront::Bounties(front) => front.job_complete(completed, snapshot, unassigned),
        }
    }

    fn new_miner(&self, snapshot: &WorkSnapshot, unassigned: &[Unassigned]) -> Vec<Assignment> {
        match self {
            QueueFront::Contracts(front) => front.new_miner(snapshot, unassigned),
            QueueFront::Bounties(front) => front.new_miner(snapshot, unassigned),
        }
    }

    fn rebalance(&self, snapshot: &WorkSnapshot) -> Vec<Assignment> {
        match self {
            QueueFront::Contracts(front) => front.rebalance(snapshot),
            QueueFront::Bounties(front) => front.rebalance(snapshot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boost::OutputScript;
    use crate::types::Secret;
    use crate::work::Target;

    fn contract_job(nonce: u32) -> ContractJob {
        let script = OutputScript::contract(
            1,
            Digest256([0x50; 32]),
            Target::EASY,
            b"c".to_vec(),
            nonce,
            Vec::new(),
            Address([0x60; 20]),
        );
        ContractJob::new(
            Output::new(Outpoint::new(Digest256([nonce as u8 + 1; 32]), 0), script, 500),
            Secret::from_bytes([3; 32]),
        )
    }

    fn bounty_job(value: u64, nonce: u32) -> BountyJob {
        let script = OutputScript::bounty(
            2,
            Digest256([0x70; 32]),
            Target::encode(0x1d, 0x00ffff),
            b"b".to_vec(),
            nonce,
            Vec::new(),
        );
        BountyJob {
            output: Output::new(Outpoint::new(Digest256([nonce as u8 + 1; 32]), 1), script, value),
            redeem_address: Address([nonce as u8; 20]),
        }
    }

    fn workers(n: usize) -> Vec<Unassigned> {
        (0..n)
            .map(|_| Unassigned {
                worker: WorkerId::new(),
                hashpower: 10.0,
            })
            .collect()
    }

    #[test]
    fn test_distribution_sums_per_puzzle() {
        let a = contract_job(1).job().puzzle;
        let b = contract_job(2).job().puzzle;
        let snapshot = WorkSnapshot {
            workers: vec![
                Working { worker: WorkerId::new(), puzzle: a.clone(), hashpower: 1.0 },
                Working { worker: WorkerId::new(), puzzle: a.clone(), hashpower: 2.0 },
                Working { worker: WorkerId::new(), puzzle: b.clone(), hashpower: 4.0 },
            ],
        };
        let distribution = snapshot.distribution();
        assert_eq!(distribution[&a], 3.0);
        assert_eq!(distribution[&b], 4.0);
        assert_eq!(snapshot.total_hashpower(), 7.0);
    }

    #[test]
    fn test_contracts_front_assigns_front_job() {
        let mut front = ContractsFront::new();
        let snapshot = WorkSnapshot::default();
        assert!(front.new_miner(&snapshot, &workers(2)).is_empty());

        let first = contract_job(1);
        let second = contract_job(2);
        front.insert(first.clone());
        front.insert(second.clone());

        let assignments = front.new_miner(&snapshot, &workers(2));
        assert_eq!(assignments.len(), 2);
        assert!(assignments.iter().all(|a| a.puzzle == first.job().puzzle));

        // Completing some other puzzle leaves the front in place.
        let again = front.job_complete(&second.job().puzzle, &snapshot, &workers(1));
        assert_eq!(again[0].puzzle, first.job().puzzle);

        let next = front.job_complete(&first.job().puzzle, &snapshot, &workers(1));
        assert_eq!(next[0].puzzle, second.job().puzzle);
        assert_eq!(front.queue().len(), 1);
        assert!(front.rebalance(&snapshot).is_empty());
    }

    #[test]
    fn test_bounties_front_selection_and_completion() {
        let mut front = BountiesFront::new(0.0, 1.0);
        let job = bounty_job(100, 1);
        front.insert(job.clone());
        assert!(front.selected().is_valid());
        assert_eq!(front.selected().miner_address(), job.redeem_address);
        assert_eq!(front.redeem_address(&job.output.id), Some(job.redeem_address));

        let snapshot = WorkSnapshot::default();
        let puzzle = front.selected().puzzle.clone();
        let assignments = front.new_miner(&snapshot, &workers(3));
        assert_eq!(assignments.len(), 3);

        let after = front.job_complete(&puzzle, &snapshot, &workers(1));
        assert!(after.is_empty());
        assert!(!front.contains(&job.output.id));
        assert_eq!(front.difficulty(), 0.0);
    }

    #[test]
    fn test_bounties_front_deterministic_select() {
        let mut front = BountiesFront::new(0.0, 1.0);
        front.insert(bounty_job(10, 1));
        front.insert(bounty_job(100, 2));
        let top = bounty_job(100, 2);
        assert_eq!(front.select(0.0).output_script(), top.output.script);
    }

    #[test]
    fn test_queue_front_dispatch() {
        let mut contracts = ContractsFront::new();
        contracts.insert(contract_job(5));
        let front = QueueFront::Contracts(contracts);
        assert!(front.selected().is_valid());
        assert!(front.difficulty() > 0.0);
        assert_eq!(front.new_miner(&WorkSnapshot::default(), &workers(1)).len(), 1);

        let front = QueueFront::Bounties(BountiesFront::new(0.0, 1.0));
        assert!(!front.selected().is_valid());
        assert!(front.rebalance(&WorkSnapshot::default()).is_empty());
    }
}
