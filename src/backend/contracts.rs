//! FIFO of contract jobs we have agreed to work on

use super::output::Output;
use crate::boost::Job;
use crate::types::{Digest256, Outpoint, Secret};
use std::collections::VecDeque;
use tracing::{debug, info};

/// A contract output with the key that redeems it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractJob {
    pub output: Output,
    pub secret: Secret,
    /// Every outpoint paying to the script, starting with `output.outpoint`
    pub outpoints: Vec<Outpoint>,
}

impl ContractJob {
    pub fn new(output: Output, secret: Secret) -> Self {
        let outpoints = vec![output.outpoint];
        Self {
            output,
            secret,
            outpoints,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.output.is_valid() && self.secret.is_valid()
    }

    /// The job for the miner the contract is bound to
    pub fn job(&self) -> Job {
        Job::new(&self.output.script, self.output.script.miner_address)
    }

    fn difficulty(&self) -> f64 {
        self.output
            .script
            .difficulty()
            .map(|d| d.to_f64())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct ContractsQueue {
    jobs: VecDeque<ContractJob>,
    difficulty: f64,
}

impl ContractsQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Total difficulty of all queued jobs
    pub fn difficulty(&self) -> f64 {
        self.difficulty
    }

    pub fn front(&self) -> Option<&ContractJob> {
        self.jobs.front()
    }

    pub fn contains(&self, id: &Digest256) -> bool {
        self.jobs.iter().any(|j| &j.output.id == id)
    }

    pub fn get(&self, id: &Digest256) -> Option<&ContractJob> {
        self.jobs.iter().find(|j| &j.output.id == id)
    }

    /// Record another output paying to a queued contract
    ///
    /// Returns false if the script is not queued. The job's difficulty and
    /// position are unchanged.
    pub fn add_output(&mut self, output: &Output) -> bool {
        let Some(job) = self.jobs.iter_mut().find(|j| j.output.id == output.id) else {
            return false;
        };
        if !job.outpoints.contains(&output.outpoint) {
            job.outpoints.push(output.outpoint);
            info!(id = %output.id, outpoint = %output.outpoint, value = output.value, "contract topped up");
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContractJob> {
        self.jobs.iter()
    }

    /// Queue a contract job. Invalid jobs and non-contracts are ignored.
    pub fn push(&mut self, job: ContractJob) {
        if !job.is_valid() || !job.output.script.is_contract() || !job.output.script.target.is_valid() {
            debug!(id = %job.output.id, "ignoring invalid contract job");
            return;
        }

        let difficulty = job.difficulty();
        info!(id = %job.output.id, difficulty, position = self.jobs.len(), "contract queued");
        self.difficulty += difficulty;
        self.jobs.push_back(job);
    }

    /// Take the earliest job
    pub fn pop(&mut self) -> Option<ContractJob> {
        let job = self.jobs.pop_front()?;
        self.subtract(job.difficulty());
        info!(id = %job.output.id, "contract dequeued");
        Some(job)
    }

    /// Drop every job with this script ID, e.g. after it was redeemed elsewhere
    pub fn remove(&mut self, id: &Digest256) -> Vec<ContractJob> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            self.jobs.drain(..).partition(|j| &j.output.id == id);
        self.jobs = kept.into();
        for job in &removed {
            self.subtract(job.difficulty());
        }
        removed
    }

    fn subtract(&mut self, difficulty: f64) {
        self.difficulty -= difficulty;
        if self.jobs.is_empty() {
            self.difficulty = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boost::OutputScript;
    use crate::types::{Address, Outpoint};
    use crate::work::Target;

    fn job(nonce: u32, target: Target) -> ContractJob {
        let script = OutputScript::contract(
            0,
            Digest256([0x20; 32]),
            target,
            Vec::new(),
            nonce,
            Vec::new(),
            Address([0x30; 20]),
        );
        ContractJob::new(
            Output::new(Outpoint::new(Digest256([nonce as u8 + 1; 32]), 0), script, 1000),
            Secret::from_bytes([7; 32]),
        )
    }

    #[test]
    fn test_fifo_order_and_difficulty() {
        let mut queue = ContractsQueue::new();
        let first = job(1, Target::encode(0x1d, 0x00ffff));
        let second = job(2, Target::encode(0x1c, 0x00ffff));
        queue.push(first.clone());
        queue.push(second.clone());

        let expected = first.difficulty() + second.difficulty();
        assert!((queue.difficulty() - expected).abs() < 1e-9);

        assert_eq!(queue.pop(), Some(first));
        assert!((queue.difficulty() - second.difficulty()).abs() < 1e-9);
        assert_eq!(queue.pop(), Some(second));
        assert_eq!(queue.difficulty(), 0.0);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_push_filters() {
        let mut queue = ContractsQueue::new();

        let mut no_secret = job(1, Target::EASY);
        no_secret.secret = Secret::default();
        queue.push(no_secret);

        let bounty = OutputScript::bounty(0, Digest256([1; 32]), Target::EASY, Vec::new(), 0, Vec::new());
        queue.push(ContractJob::new(
            Output::new(Outpoint::new(Digest256([1; 32]), 0), bounty, 10),
            Secret::from_bytes([1; 32]),
        ));

        queue.push(job(3, Target::encode(2, 0xffff)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_by_id() {
        let mut queue = ContractsQueue::new();
        let a = job(1, Target::EASY);
        let b = job(2, Target::EASY);
        queue.push(a.clone());
        queue.push(b.clone());

        assert_eq!(queue.remove(&a.output.id), vec![a]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.front(), Some(&b));
        assert!(!queue.contains(&Digest256([0; 32])));
    }

    #[test]
    fn test_add_output_extends_queued_job() {
        let mut queue = ContractsQueue::new();
        let a = job(1, Target::EASY);
        queue.push(a.clone());
        let difficulty = queue.difficulty();

        let mut top_up = a.output.clone();
        top_up.outpoint = Outpoint::new(Digest256([0x44; 32]), 3);
        assert!(queue.add_output(&top_up));
        assert!(queue.add_output(&top_up));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.difficulty(), difficulty);
        assert_eq!(queue.get(&a.output.id).unwrap().outpoints, vec![a.output.outpoint, top_up.outpoint]);

        let unknown = job(2, Target::EASY);
        assert!(!queue.add_output(&unknown.output));
        assert!(queue.get(&unknown.output.id).is_none());
    }

    #[test]
    fn test_job_is_bound_to_contract_address() {
        let contract = job(1, Target::EASY);
        let job = contract.job();
        assert!(job.is_valid());
        assert_eq!(job.miner_address(), Address([0x30; 20]));
    }
}
