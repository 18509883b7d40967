//! Jobs: the puzzle a Boost output script asks a particular miner to solve
//!
//! The puzzle header is `tag ‖ miner_address` and the body is
//! `user_nonce ‖ additional_data`, so the output script can be rebuilt from
//! a job without loss.

use super::{BoostType, InputScript, OutputScript};
use crate::types::Address;
use crate::work::{MerklePath, Proof, Puzzle, Solution};
use serde::{Deserialize, Serialize};

/// A Boost job: its type and the puzzle to solve
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "type")]
    pub job_type: BoostType,
    pub puzzle: Puzzle,
}

impl Job {
    pub fn from_parts(job_type: BoostType, puzzle: Puzzle) -> Self {
        Self { job_type, puzzle }
    }

    /// Derive the job `miner_address` would work on
    ///
    /// Invalid when the script is invalid, or when it is a contract bound to
    /// a different address.
    pub fn new(script: &OutputScript, miner_address: Address) -> Self {
        match script.script_type {
            BoostType::Invalid => return Self::default(),
            BoostType::Contract if script.miner_address != miner_address => {
                return Self::default()
            }
            _ => {}
        }

        let mut header = Vec::with_capacity(script.tag.len() + Address::SIZE);
        header.extend_from_slice(&script.tag);
        header.extend_from_slice(miner_address.as_bytes());

        let mut body = Vec::with_capacity(4 + script.additional_data.len());
        body.extend_from_slice(&script.user_nonce.to_le_bytes());
        body.extend_from_slice(&script.additional_data);

        Self {
            job_type: script.script_type,
            puzzle: Puzzle::new(
                script.category,
                script.content,
                script.target,
                MerklePath::default(),
                header,
                body,
            ),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.job_type.is_valid()
            && self.puzzle.is_valid()
            && self.puzzle.header.len() >= Address::SIZE
            && self.puzzle.body.len() >= 4
    }

    /// The miner address, taken from the end of the header
    ///
    /// Zero if the header is too short to hold one.
    pub fn miner_address(&self) -> Address {
        let header = &self.puzzle.header;
        if header.len() < Address::SIZE {
            return Address::default();
        }
        Address::from_slice(&header[header.len() - Address::SIZE..]).unwrap_or_default()
    }

    /// Rebuild the output script this job came from
    pub fn output_script(&self) -> OutputScript {
        if !self.job_type.is_valid() {
            return OutputScript::default();
        }

        let header = &self.puzzle.header;
        let body = &self.puzzle.body;
        if header.len() < Address::SIZE || body.len() < 4 {
            return OutputScript::default();
        }

        let tag = header[..header.len() - Address::SIZE].to_vec();
        let user_nonce = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
        let additional_data = body[4..].to_vec();
        let p = &self.puzzle;

        match self.job_type {
            BoostType::Bounty => {
                OutputScript::bounty(p.category, p.content, p.target, tag, user_nonce, additional_data)
            }
            BoostType::Contract => OutputScript::contract(
                p.category,
                p.content,
                p.target,
                tag,
                user_nonce,
                additional_data,
                self.miner_address(),
            ),
            BoostType::Invalid => OutputScript::default(),
        }
    }
}

/// Pair an output with the input that redeems it
///
/// `None` if either side is invalid or their types differ. The miner address
/// comes from the input for bounties and from the output for contracts.
pub fn work_proof(output: &OutputScript, input: &InputScript) -> Option<Proof> {
    if !output.is_valid() || !input.is_valid() || output.script_type != input.script_type {
        return None;
    }

    let miner_address = match output.script_type {
        BoostType::Bounty => input.miner_address,
        _ => output.miner_address,
    };

    let job = Job::new(output, miner_address);
    if !job.is_valid() {
        return None;
    }

    Some(Proof::new(
        job.puzzle,
        Solution::new(input.timestamp, input.nonce, input.extra_nonce_1, input.extra_nonce_2),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Sha256dHasher;
    use crate::types::{Digest256, Pubkey, Signature};
    use crate::work::Target;

    fn contract(address: Address) -> OutputScript {
        OutputScript::contract(
            5,
            Digest256([0x42; 32]),
            Target::SUCCESS_QUARTER,
            b"boost tag".to_vec(),
            77,
            b"data".to_vec(),
            address,
        )
    }

    fn bounty() -> OutputScript {
        OutputScript::bounty(
            5,
            Digest256([0x42; 32]),
            Target::SUCCESS_QUARTER,
            Vec::new(),
            77,
            Vec::new(),
        )
    }

    #[test]
    fn test_contract_job_round_trip() {
        let address = Address([0x99; 20]);
        let script = contract(address);
        let job = Job::new(&script, address);
        assert!(job.is_valid());
        assert_eq!(job.miner_address(), address);
        assert_eq!(job.output_script(), script);
    }

    #[test]
    fn test_contract_address_mismatch() {
        let script = contract(Address([0x99; 20]));
        let job = Job::new(&script, Address([0x98; 20]));
        assert!(!job.is_valid());
        assert_eq!(job, Job::default());
    }

    #[test]
    fn test_bounty_accepts_any_address() {
        let script = bounty();
        let job = Job::new(&script, Address([0x01; 20]));
        assert!(job.is_valid());
        assert_eq!(job.miner_address(), Address([0x01; 20]));
        // The address is not part of a bounty script.
        assert_eq!(job.output_script(), script);
        assert_eq!(job.puzzle.header, vec![0x01; 20]);
        assert_eq!(job.puzzle.body, 77u32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_output_script_short_fields() {
        let mut job = Job::new(&bounty(), Address([0x01; 20]));
        job.puzzle.header.truncate(19);
        assert!(!job.output_script().is_valid());
        assert!(job.miner_address().is_zero());

        let mut job = Job::new(&bounty(), Address([0x01; 20]));
        job.puzzle.body.truncate(3);
        assert!(!job.output_script().is_valid());
    }

    #[test]
    fn test_work_proof_type_mismatch() {
        let output = bounty();
        let input = InputScript::contract(Signature::new(vec![1]), Pubkey::new(vec![2; 33]), 0, 0, 0, 0);
        assert!(work_proof(&output, &input).is_none());
        assert!(work_proof(&OutputScript::default(), &input).is_none());
    }

    #[test]
    fn test_work_proof_verifies_found_solution() {
        let mut key = vec![0x02];
        key.extend_from_slice(&[0x33; 32]);
        let pubkey = Pubkey::new(key);
        let output = bounty();

        let job = Job::new(&output, pubkey.address());
        let solution = Sha256dHasher::new()
            .search(&job.puzzle, Solution::new(1_650_000_000, 0, 1, 2), 1000)
            .expect("a quarter of all hashes succeed");

        let input = InputScript::from_solution(
            Signature::new(vec![0x30; 70]),
            pubkey,
            &solution,
            BoostType::Bounty,
        );
        let proof = work_proof(&output, &input).expect("types agree");
        assert_eq!(proof.puzzle, job.puzzle);
        assert!(proof.is_valid());
    }
}
