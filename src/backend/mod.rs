//! Economic backend: queues of Boost jobs, worker assignment and settlement
//!
//! The queue types are plain single-threaded values. [`Backend`] owns one of
//! each behind its own lock so that chain events, new workers and submitted
//! solutions can arrive concurrently.
//!
//! Locks are always taken in the order database, addresses, contracts,
//! bounties, in progress, goal.

pub mod bounties;
pub mod contracts;
pub mod database;
pub mod hashpower;
pub mod in_progress;
pub mod manager;
pub mod monitor;
pub mod output;

pub use bounties::{BountiesQueue, BountyEntry};
pub use contracts::{ContractJob, ContractsQueue};
pub use database::{
    AddressSource, ContentIndex, ContentQuery, ContentRecord, MemoryDatabase, OutputLedger,
    OutputStatus, SaleRecord, SaleStatus, SalesTracker, ScriptRecord, SequentialAddresses,
};
pub use hashpower::{
    drain_time, Assignments, Goal, Hashpower, IdealHashpowerAssignment, MarketObservation,
    Profitability,
};
pub use in_progress::{Admission, Completed, InProgress};
pub use manager::{
    Assignment, BountiesFront, BountyJob, ContractsFront, JobManager, QueueEnd, QueueFront,
    Unassigned, WorkSnapshot, WorkerId, Working,
};
pub use monitor::Monitor;
pub use output::Output;

use crate::boost::{BoostType, Job, OutputScript};
use crate::types::{Address, Digest256, Outpoint, Satoshi, Secret};
use crate::work::Solution;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables for a [`Backend`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Target time to drain the contract queue
    #[serde(with = "crate::utils::humantime_duration")]
    pub contract_queue_time: Duration,
    /// Most jobs worked at once
    pub max_in_progress: usize,
    /// Most total difficulty worked at once
    pub max_in_progress_difficulty: f64,
    /// Jobs expected to be solved faster than this are not split further
    #[serde(with = "crate::utils::humantime_duration")]
    pub min_solve_time: Duration,
    pub cost_per_difficulty: f64,
    pub constant_cost: f64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            contract_queue_time: Goal::CONTRACT_QUEUE_TIME,
            max_in_progress: 64,
            max_in_progress_difficulty: 1e6,
            min_solve_time: Duration::from_secs(30),
            cost_per_difficulty: 0.0,
            constant_cost: 1.0,
        }
    }
}

/// What to do with a finished job
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub id: Digest256,
    pub job_type: BoostType,
    /// Outputs the solution redeems
    pub outpoints: Vec<Outpoint>,
    pub solution: Option<Solution>,
    /// Where a solved bounty is redeemed to
    pub redeem_address: Option<Address>,
    /// Key for a solved contract
    pub secret: Option<Secret>,
    /// New work for the job's workers
    pub assignments: Vec<Assignment>,
    /// Workers no job could be found for
    pub idle: Vec<Unassigned>,
}

/// Point-in-time summary of the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendStatus {
    pub contracts_queued: usize,
    pub contract_difficulty: f64,
    pub bounties_queued: usize,
    pub bounty_difficulty: f64,
    pub profitable_bounty_difficulty: f64,
    pub in_progress: usize,
    pub in_progress_difficulty: f64,
    pub goal: Goal,
}

pub struct Backend {
    settings: BackendSettings,
    database: Mutex<MemoryDatabase>,
    addresses: Mutex<Box<dyn AddressSource + Send>>,
    contracts: Mutex<ContractsFront>,
    bounties: Mutex<BountiesFront>,
    in_progress: Mutex<InProgress>,
    goal: Mutex<Goal>,
}

impl Backend {
    /// A backend redeeming bounties to randomly seeded addresses
    pub fn new(settings: BackendSettings) -> Self {
        Self::with_addresses(settings, Box::new(SequentialAddresses::random()))
    }

    pub fn with_addresses(settings: BackendSettings, addresses: Box<dyn AddressSource + Send>) -> Self {
        let goal = Goal::default().with_contract_queue_time(settings.contract_queue_time);
        Self {
            database: Mutex::new(MemoryDatabase::new()),
            addresses: Mutex::new(addresses),
            contracts: Mutex::new(ContractsFront::new()),
            bounties: Mutex::new(BountiesFront::new(settings.cost_per_difficulty, settings.constant_cost)),
            in_progress: Mutex::new(InProgress::new(
                settings.max_in_progress,
                settings.max_in_progress_difficulty,
                settings.min_solve_time,
            )),
            goal: Mutex::new(goal),
            settings,
        }
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    /// A Boost output appeared on chain
    pub fn new_output(&self, script: &OutputScript, value: Satoshi, outpoint: Outpoint) -> BoostType {
        let mut database = self.database.lock();
        let database = &mut *database;
        let mut addresses = self.addresses.lock();
        let mut contracts = self.contracts.lock();
        let mut bounties = self.bounties.lock();

        Monitor {
            outputs: &mut database.outputs,
            sales: &mut database.sales,
            contracts: &mut *contracts,
            bounties: &mut *bounties,
            addresses: &mut **addresses,
        }
        .new_output(script, value, outpoint)
    }

    /// An output was spent
    ///
    /// When that redeems a script someone is working on, returns the workers
    /// that need new work.
    pub fn new_input(&self, outpoint: &Outpoint, txid: Digest256) -> Vec<Unassigned> {
        let mut database = self.database.lock();
        let database = &mut *database;
        let mut addresses = self.addresses.lock();
        let mut contracts = self.contracts.lock();
        let mut bounties = self.bounties.lock();
        let mut in_progress = self.in_progress.lock();

        let redeemed = Monitor {
            outputs: &mut database.outputs,
            sales: &mut database.sales,
            contracts: &mut *contracts,
            bounties: &mut *bounties,
            addresses: &mut **addresses,
        }
        .new_input(outpoint, txid);

        match redeemed {
            Some(id) if in_progress.contains(&id) => match in_progress.complete(&id, None) {
                Ok(completed) => {
                    info!(id = %id, workers = completed.workers.len(), "job redeemed elsewhere");
                    completed.workers
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "failed to release redeemed job");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        }
    }

    /// Offer to work a contract; the sale is accepted when its output appears
    pub fn offer(&self, job: Job, secret: Secret, expires_at: DateTime<Utc>) -> Result<Digest256> {
        if job.job_type != BoostType::Contract || !job.is_valid() {
            return Err(Error::job("only valid contract jobs can be offered"));
        }
        if !secret.is_valid() {
            return Err(Error::job("contract offer needs a secret"));
        }

        let sale = SaleRecord::offer(job, secret, expires_at);
        let id = sale.id();
        self.database.lock().sales.put(sale);
        info!(id = %id, expires_at = %expires_at, "contract offered");
        Ok(id)
    }

    /// Find work for a worker, contracts first
    ///
    /// The worker is taken off any job it was on.
    pub fn assign(&self, worker: Unassigned, snapshot: &WorkSnapshot) -> Option<Assignment> {
        let contracts = self.contracts.lock();
        let bounties = self.bounties.lock();
        let mut in_progress = self.in_progress.lock();

        in_progress.release(&worker.worker);

        if contracts.current().is_some() {
            let job = contracts.selected().clone();
            if let Some(assignment) = admit(&mut in_progress, &*contracts, job, worker, snapshot) {
                return Some(assignment);
            }
        }

        let job = bounties.selected().clone();
        if job.is_valid() {
            if let Some(assignment) = admit(&mut in_progress, &*bounties, job, worker, snapshot) {
                return Some(assignment);
            }
        }

        debug!(worker = %worker.worker, "no work available");
        None
    }

    /// Take a worker off its job, e.g. when it disconnects
    pub fn release(&self, worker: &WorkerId) -> Option<Digest256> {
        self.in_progress.lock().release(worker)
    }

    /// Finish a job, with our solution or without one if it was redeemed
    /// elsewhere, and reassign its workers
    pub fn complete(
        &self,
        id: &Digest256,
        solution: Option<Solution>,
        snapshot: &WorkSnapshot,
    ) -> Result<Settlement> {
        let (mut settlement, workers) = {
            let mut database = self.database.lock();
            let mut contracts = self.contracts.lock();
            let mut bounties = self.bounties.lock();
            let mut in_progress = self.in_progress.lock();

            let job = in_progress.job(id).cloned().ok_or_else(|| Error::unknown_job(id))?;
            let completed = in_progress.complete(id, solution)?;

            // Read after completion so outputs seen while the job was worked
            // are included.
            let outpoints = match job.job_type {
                BoostType::Contract => contracts
                    .queue()
                    .get(id)
                    .map(|c| c.outpoints.clone())
                    .unwrap_or_default(),
                BoostType::Bounty => bounties.queue().outpoints(id).to_vec(),
                BoostType::Invalid => Vec::new(),
            };

            let mut settlement = Settlement {
                id: *id,
                job_type: job.job_type,
                outpoints,
                solution: completed.solution,
                redeem_address: None,
                secret: None,
                assignments: Vec::new(),
                idle: Vec::new(),
            };

            match job.job_type {
                BoostType::Contract => {
                    if settlement.solution.is_some() {
                        settlement.secret = contracts
                            .current()
                            .filter(|c| &c.output.id == id)
                            .map(|c| c.secret.clone());
                        database.sales.update(id, SaleStatus::Completed);
                    }
                    contracts.job_complete(&job.puzzle, snapshot, &[]);
                }
                BoostType::Bounty => {
                    if settlement.solution.is_some() {
                        settlement.redeem_address = Some(job.miner_address());
                    }
                    bounties.job_complete(&job.puzzle, snapshot, &[]);
                }
                BoostType::Invalid => {}
            }

            (settlement, completed.workers)
        };

        for worker in workers {
            match self.assign(worker, snapshot) {
                Some(assignment) => settlement.assignments.push(assignment),
                None => settlement.idle.push(worker),
            }
        }

        Ok(settlement)
    }

    /// Build a market observation from the current queues
    pub fn observe(&self, blocks: Profitability, price: f64, current: Assignments) -> MarketObservation {
        let contracts = self.contracts.lock();
        let bounties = self.bounties.lock();
        MarketObservation {
            blocks,
            hashpower_price_satoshis_per_difficulty: price,
            bounty_queue_profitable_difficulty: bounties
                .queue()
                .profitable_difficulty(self.settings.cost_per_difficulty, self.settings.constant_cost),
            contract_queue_difficulty: contracts.difficulty(),
            current_assignments: current,
        }
    }

    /// Recompute the goal on a new block; the old goal stays on failure
    pub fn reasses(&self, observation: &MarketObservation) -> Result<Goal> {
        let mut goal = self.goal.lock();
        let next = goal.reasses(observation)?;
        *goal = next;
        Ok(next)
    }

    pub fn goal(&self) -> Goal {
        *self.goal.lock()
    }

    /// Look up what the ledger knows about a script
    pub fn script(&self, id: &Digest256) -> ScriptRecord {
        self.database.lock().outputs.get(id)
    }

    pub fn query(&self, query: &ContentQuery) -> Vec<ContentRecord> {
        self.database.lock().outputs.query(query)
    }

    pub fn sale(&self, id: &Digest256) -> Option<SaleRecord> {
        self.database.lock().sales.search(id)
    }

    pub fn status(&self) -> BackendStatus {
        let contracts = self.contracts.lock();
        let bounties = self.bounties.lock();
        let in_progress = self.in_progress.lock();
        let goal = self.goal.lock();
        BackendStatus {
            contracts_queued: contracts.queue().len(),
            contract_difficulty: contracts.difficulty(),
            bounties_queued: bounties.queue().len(),
            bounty_difficulty: bounties.difficulty(),
            profitable_bounty_difficulty: bounties
                .queue()
                .profitable_difficulty(self.settings.cost_per_difficulty, self.settings.constant_cost),
            in_progress: in_progress.len(),
            in_progress_difficulty: in_progress.difficulty(),
            goal: *goal,
        }
    }
}

/// Ask the manager for the worker's puzzle and register it as in progress
fn admit(
    in_progress: &mut InProgress,
    manager: &dyn JobManager,
    job: Job,
    worker: Unassigned,
    snapshot: &WorkSnapshot,
) -> Option<Assignment> {
    let assignment = manager.new_miner(snapshot, &[worker]).into_iter().next()?;
    match in_progress.assign(job, worker.worker, worker.hashpower) {
        Admission::Accepted { expected } => {
            debug!(worker = %worker.worker, ?expected, "worker assigned");
            Some(assignment)
        }
        refused => {
            debug!(worker = %worker.worker, ?refused, "assignment refused");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Sha256dHasher;
    use crate::work::Target;
    use assert_matches::assert_matches;

    fn settings() -> BackendSettings {
        BackendSettings {
            min_solve_time: Duration::ZERO,
            max_in_progress_difficulty: f64::MAX,
            ..BackendSettings::default()
        }
    }

    fn backend() -> Backend {
        Backend::with_addresses(settings(), Box::new(SequentialAddresses::new([1; 32])))
    }

    fn worker() -> Unassigned {
        Unassigned {
            worker: WorkerId::new(),
            hashpower: 1.0,
        }
    }

    fn bounty(nonce: u32) -> OutputScript {
        OutputScript::bounty(0, Digest256([0x11; 32]), Target::SUCCESS_HALF, b"b".to_vec(), nonce, Vec::new())
    }

    fn contract(nonce: u32) -> OutputScript {
        OutputScript::contract(
            0,
            Digest256([0x22; 32]),
            Target::SUCCESS_HALF,
            b"c".to_vec(),
            nonce,
            Vec::new(),
            Address([0x33; 20]),
        )
    }

    fn outpoint(n: u8) -> Outpoint {
        Outpoint::new(Digest256([n; 32]), 0)
    }

    fn solve(assignment: &Assignment) -> Solution {
        Sha256dHasher::new()
            .search(&assignment.puzzle, Solution::new(1, 0, 0, 0), 1000)
            .expect("half of all hashes succeed")
    }

    #[test]
    fn test_settings_default() {
        let settings = BackendSettings::default();
        assert_eq!(settings.contract_queue_time, Duration::from_secs(600));
        assert_eq!(settings.max_in_progress, 64);
        assert_eq!(settings.min_solve_time, Duration::from_secs(30));
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"30s\""));
    }

    #[test]
    fn test_bounty_lifecycle() {
        let backend = backend();
        let snapshot = WorkSnapshot::default();
        assert!(backend.assign(worker(), &snapshot).is_none());

        let script = bounty(1);
        assert_eq!(backend.new_output(&script, 1000, outpoint(1)), BoostType::Bounty);
        assert_eq!(backend.status().bounties_queued, 1);

        let w = worker();
        let assignment = backend.assign(w, &snapshot).expect("bounty queued");
        assert_eq!(assignment.worker, w.worker);
        assert_eq!(backend.status().in_progress, 1);

        let settlement = backend.complete(&script.id(), Some(solve(&assignment)), &snapshot).unwrap();
        assert_eq!(settlement.job_type, BoostType::Bounty);
        assert_eq!(settlement.outpoints, vec![outpoint(1)]);
        assert!(settlement.redeem_address.is_some());
        assert!(settlement.assignments.is_empty());
        assert_eq!(settlement.idle.len(), 1);

        let status = backend.status();
        assert_eq!(status.bounties_queued, 0);
        assert_eq!(status.in_progress, 0);
    }

    #[test]
    fn test_contract_lifecycle() {
        let backend = backend();
        let snapshot = WorkSnapshot::default();
        let script = contract(1);
        let job = Job::new(&script, Address([0x33; 20]));
        let secret = Secret::from_bytes([9; 32]);

        let id = backend
            .offer(job, secret.clone(), Utc::now() + chrono::Duration::minutes(10))
            .unwrap();
        assert_eq!(id, script.id());
        assert_eq!(backend.new_output(&script, 500, outpoint(2)), BoostType::Contract);
        assert_eq!(backend.sale(&id).unwrap().status, SaleStatus::Accepted);

        // Contracts come before bounties.
        backend.new_output(&bounty(2), 1000, outpoint(3));
        let assignment = backend.assign(worker(), &snapshot).unwrap();
        assert_eq!(assignment.puzzle, Job::new(&script, Address([0x33; 20])).puzzle);

        let settlement = backend.complete(&id, Some(solve(&assignment)), &snapshot).unwrap();
        assert_eq!(settlement.secret, Some(secret));
        assert_eq!(settlement.outpoints, vec![outpoint(2)]);
        assert_eq!(backend.sale(&id).unwrap().status, SaleStatus::Completed);

        // The worker moves on to the bounty.
        assert_eq!(settlement.assignments.len(), 1);
        assert_eq!(backend.status().contracts_queued, 0);
    }

    #[test]
    fn test_settlement_includes_outputs_seen_while_working() {
        let backend = backend();
        let snapshot = WorkSnapshot::default();
        let script = bounty(4);
        backend.new_output(&script, 1000, outpoint(5));
        let assignment = backend.assign(worker(), &snapshot).unwrap();

        // A second payment to the same script arrives mid-job.
        assert_eq!(backend.new_output(&script, 700, outpoint(6)), BoostType::Bounty);
        assert_eq!(backend.status().bounties_queued, 1);

        let settlement = backend.complete(&script.id(), Some(solve(&assignment)), &snapshot).unwrap();
        assert_eq!(settlement.outpoints, vec![outpoint(5), outpoint(6)]);
        assert_eq!(backend.status().bounties_queued, 0);
    }

    #[test]
    fn test_contract_top_up_is_settled() {
        let backend = backend();
        let snapshot = WorkSnapshot::default();
        let script = contract(2);
        let id = backend
            .offer(
                Job::new(&script, Address([0x33; 20])),
                Secret::from_bytes([8; 32]),
                Utc::now() + chrono::Duration::minutes(10),
            )
            .unwrap();

        backend.new_output(&script, 500, outpoint(7));
        // Topped up before and during work.
        assert_eq!(backend.new_output(&script, 100, outpoint(8)), BoostType::Contract);
        let assignment = backend.assign(worker(), &snapshot).unwrap();
        assert_eq!(backend.new_output(&script, 100, outpoint(9)), BoostType::Contract);
        assert_eq!(backend.status().contracts_queued, 1);

        let settlement = backend.complete(&id, Some(solve(&assignment)), &snapshot).unwrap();
        assert_eq!(settlement.outpoints, vec![outpoint(7), outpoint(8), outpoint(9)]);
        assert!(settlement.secret.is_some());
        assert_eq!(backend.status().contracts_queued, 0);
    }

    #[test]
    fn test_offer_rejects_bounty() {
        let backend = backend();
        let job = Job::new(&bounty(1), Address([1; 20]));
        assert_matches!(
            backend.offer(job, Secret::from_bytes([1; 32]), Utc::now()),
            Err(Error::Job { .. })
        );
    }

    #[test]
    fn test_redeemed_elsewhere_frees_workers() {
        let backend = backend();
        let snapshot = WorkSnapshot::default();
        let script = bounty(3);
        backend.new_output(&script, 1000, outpoint(4));
        let w = worker();
        backend.assign(w, &snapshot).unwrap();

        let freed = backend.new_input(&outpoint(4), Digest256([0x44; 32]));
        assert_eq!(freed, vec![w]);
        assert_eq!(backend.script(&script.id()).status, OutputStatus::Redeemed);
        assert_eq!(backend.status().in_progress, 0);
    }

    #[test]
    fn test_complete_unknown_job() {
        let backend = backend();
        assert_matches!(
            backend.complete(&Digest256([1; 32]), None, &WorkSnapshot::default()),
            Err(Error::UnknownJob { .. })
        );
    }

    #[test]
    fn test_reasses_keeps_goal() {
        let backend = backend();
        let observation = backend.observe(1.0, 0.5, Assignments::default());
        assert_eq!(observation.contract_queue_difficulty, 0.0);
        assert_matches!(backend.reasses(&observation), Err(Error::NotImplemented { .. }));
        assert_eq!(backend.goal(), Goal::default());
    }
}
