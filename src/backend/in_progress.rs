//! Jobs that workers are currently solving
//!
//! Admission is bounded three ways: the number of jobs, their total
//! difficulty, and a floor on the expected time to solve. A job that would
//! be solved faster than the floor is not worth splitting across workers.

use super::hashpower::Hashpower;
use super::manager::{Unassigned, WorkerId};
use crate::boost::Job;
use crate::types::Digest256;
use crate::work::{Proof, Solution};
use crate::{Error, Result};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of asking to put a worker on a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The worker is assigned; expected time to solve at the job's hashpower
    Accepted { expected: Duration },
    /// Too many jobs in progress
    Full,
    /// Total difficulty in progress would exceed the bound
    TooDifficult,
    /// The job would be solved faster than the minimum time
    TooFast,
}

/// What is released when a job finishes
///
/// The outputs a job redeems are read from its queue, not from here.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    /// Workers that need new work
    pub workers: Vec<Unassigned>,
    /// The solution, if we found it
    pub solution: Option<Solution>,
}

#[derive(Debug, Clone)]
struct Tracked {
    job: Job,
    difficulty: f64,
    workers: HashMap<WorkerId, Hashpower>,
}

impl Tracked {
    fn hashpower(&self) -> Hashpower {
        self.workers.values().sum()
    }
}

fn expected_time(difficulty: f64, hashpower: Hashpower) -> Duration {
    if hashpower <= 0.0 {
        return Duration::MAX;
    }
    Duration::try_from_secs_f64(difficulty / hashpower).unwrap_or(Duration::MAX)
}

#[derive(Debug)]
pub struct InProgress {
    max_size: usize,
    max_difficulty: f64,
    min_time: Duration,
    jobs: HashMap<Digest256, Tracked>,
    difficulty: f64,
}

impl InProgress {
    pub fn new(max_size: usize, max_difficulty: f64, min_time: Duration) -> Self {
        Self {
            max_size,
            max_difficulty,
            min_time,
            jobs: HashMap::new(),
            difficulty: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn contains(&self, id: &Digest256) -> bool {
        self.jobs.contains_key(id)
    }

    /// Total difficulty of the jobs in progress
    pub fn difficulty(&self) -> f64 {
        self.difficulty
    }

    pub fn job(&self, id: &Digest256) -> Option<&Job> {
        self.jobs.get(id).map(|t| &t.job)
    }

    /// Workers on a job
    pub fn workers(&self, id: &Digest256) -> Vec<Unassigned> {
        self.jobs
            .get(id)
            .map(|t| {
                t.workers
                    .iter()
                    .map(|(&worker, &hashpower)| Unassigned { worker, hashpower })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Put a worker on a job, tracking the job if it is new
    pub fn assign(&mut self, job: Job, worker: WorkerId, hashpower: Hashpower) -> Admission {
        let id = job.output_script().id();

        if let Some(tracked) = self.jobs.get_mut(&id) {
            let combined = tracked.hashpower() + hashpower;
            let expected = expected_time(tracked.difficulty, combined);
            if expected < self.min_time {
                return Admission::TooFast;
            }
            tracked.workers.insert(worker, hashpower);
            debug!(id = %id, worker = %worker, "worker joined job");
            return Admission::Accepted { expected };
        }

        if self.jobs.len() >= self.max_size {
            return Admission::Full;
        }

        let difficulty = match job.puzzle.target.difficulty() {
            Ok(d) => d.to_f64(),
            Err(_) => return Admission::TooDifficult,
        };
        if self.difficulty + difficulty > self.max_difficulty {
            return Admission::TooDifficult;
        }

        let expected = expected_time(difficulty, hashpower);
        if expected < self.min_time {
            return Admission::TooFast;
        }

        info!(id = %id, worker = %worker, difficulty, ?expected, "job in progress");
        self.difficulty += difficulty;
        self.jobs.insert(
            id,
            Tracked {
                job,
                difficulty,
                workers: HashMap::from([(worker, hashpower)]),
            },
        );
        Admission::Accepted { expected }
    }

    /// Take a worker off whatever job it is on
    ///
    /// A job left with no workers stops being tracked.
    pub fn release(&mut self, worker: &WorkerId) -> Option<Digest256> {
        let id = self
            .jobs
            .iter()
            .find(|(_, t)| t.workers.contains_key(worker))
            .map(|(id, _)| *id)?;

        let empty = match self.jobs.get_mut(&id) {
            Some(tracked) => {
                tracked.workers.remove(worker);
                tracked.workers.is_empty()
            }
            None => false,
        };
        if empty {
            self.untrack(&id);
        }
        Some(id)
    }

    /// Finish a job
    ///
    /// With a solution, it must meet the job's target. Without one the job is
    /// taken to have been redeemed by someone else.
    pub fn complete(&mut self, id: &Digest256, solution: Option<Solution>) -> Result<Completed> {
        let tracked = self.jobs.get(id).ok_or_else(|| Error::unknown_job(id))?;

        if let Some(solution) = &solution {
            if !Proof::new(tracked.job.puzzle.clone(), *solution).is_valid() {
                warn!(id = %id, nonce = solution.nonce, "rejected solution");
                return Err(Error::invalid_solution(id, "hash does not meet target"));
            }
        }

        let tracked = self.untrack(id).ok_or_else(|| Error::unknown_job(id))?;
        info!(id = %id, solved = solution.is_some(), "job complete");

        Ok(Completed {
            workers: tracked
                .workers
                .into_iter()
                .map(|(worker, hashpower)| Unassigned { worker, hashpower })
                .collect(),
            solution,
        })
    }

    fn untrack(&mut self, id: &Digest256) -> Option<Tracked> {
        let tracked = self.jobs.remove(id)?;
        self.difficulty -= tracked.difficulty;
        if self.jobs.is_empty() {
            self.difficulty = 0.0;
        }
        Some(tracked)
    }
}
