//! End-to-end flows: scripts on chain, queued as jobs, solved and settled

use boost_pow::{
    backend::{
        Backend, BackendSettings, BountiesQueue, Output, SaleStatus, SequentialAddresses,
        Unassigned, WorkSnapshot, WorkerId,
    },
    crypto::Sha256dHasher,
    work_proof, Address, BoostType, Digest256, InputScript, Job, OutputScript, Outpoint, Pubkey,
    Signature, Solution, Target,
};
use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;

fn bounty_output(value: u64, nonce: u32) -> Output {
    let script = OutputScript::bounty(
        0,
        Digest256([0xc0; 32]),
        Target::encode(0x1d, 0x00ffff),
        b"e2e".to_vec(),
        nonce,
        Vec::new(),
    );
    Output::new(Outpoint::new(Digest256([nonce as u8 + 1; 32]), 0), script, value)
}

fn pubkey() -> Pubkey {
    let mut bytes = vec![0x02];
    bytes.extend_from_slice(&[0x5a; 32]);
    Pubkey::new(bytes)
}

#[test]
fn test_bounty_selection_scenario() {
    let mut queue = BountiesQueue::new();
    let outputs = [bounty_output(100, 1), bounty_output(50, 2), bounty_output(10, 3)];
    for output in &outputs {
        queue.push(output);
    }
    assert_eq!(queue.len(), 3);

    let selected = queue.select(0.99, 0.0, 1.0).expect("all three are profitable");
    let entry = queue.iter().find(|e| &e.script == selected).unwrap();
    assert!(entry.profitability(0.0, 1.0).unwrap() > 0.0);

    for _ in 0..10 {
        assert_eq!(queue.select(0.0, 0.0, 1.0), Some(&outputs[0].script));
    }

    // Nothing pays for a constant cost of a thousand satoshis.
    assert_eq!(queue.select(0.5, 0.0, 1000.0), None);
}

#[test]
fn test_easy_target_is_solved_quickly() {
    let script = OutputScript::bounty(
        3,
        Digest256([0x77; 32]),
        Target::EASY,
        b"quick".to_vec(),
        9,
        b"some data".to_vec(),
    );
    let address = pubkey().address();
    let job = Job::new(&script, address);
    assert!(job.is_valid());

    let mut hasher = Sha256dHasher::new();
    let solution = hasher
        .search(&job.puzzle, Solution::new(1_700_000_000, 0, 0x01020304, 5), 1000)
        .expect("easy target is met within a thousand nonces");
    assert!(hasher.hashes() <= 1000);

    // Redeem it through the script codec and check the proof again.
    let input = InputScript::from_solution(
        Signature::new(vec![0x30; 71]),
        pubkey(),
        &solution,
        BoostType::Bounty,
    );
    let decoded_output = OutputScript::read(&script.write());
    let decoded_input = InputScript::read(&input.write());
    assert_eq!(decoded_output, script);
    assert_eq!(decoded_input, input);

    let proof = work_proof(&decoded_output, &decoded_input).expect("types match");
    assert!(proof.is_valid());
    assert_eq!(proof.solution, solution);
}

#[test]
fn test_backend_pays_contracts_before_bounties() {
    let settings = BackendSettings {
        min_solve_time: Duration::ZERO,
        ..BackendSettings::default()
    };
    let backend = Backend::with_addresses(settings, Box::new(SequentialAddresses::new([7; 32])));
    let snapshot = WorkSnapshot::default();

    let contract_address = Address([0x99; 20]);
    let contract = OutputScript::contract(
        1,
        Digest256([0xd0; 32]),
        Target::SUCCESS_QUARTER,
        Vec::new(),
        1,
        Vec::new(),
        contract_address,
    );
    let bounty = OutputScript::bounty(1, Digest256([0xd1; 32]), Target::SUCCESS_QUARTER, Vec::new(), 2, Vec::new());

    // A contract nobody offered is recorded but not worked.
    assert_eq!(
        backend.new_output(&contract, 1000, Outpoint::new(Digest256([1; 32]), 0)),
        BoostType::Contract
    );
    assert_eq!(backend.status().contracts_queued, 0);

    let id = backend
        .offer(
            Job::new(&contract, contract_address),
            boost_pow::Secret::from_bytes([3; 32]),
            Utc::now() + ChronoDuration::minutes(5),
        )
        .unwrap();
    backend.new_output(&contract, 1000, Outpoint::new(Digest256([1; 32]), 1));
    backend.new_output(&bounty, 1000, Outpoint::new(Digest256([2; 32]), 0));
    assert_eq!(backend.sale(&id).unwrap().status, SaleStatus::Accepted);

    let first = Unassigned {
        worker: WorkerId::new(),
        hashpower: 1.0,
    };
    let assignment = backend.assign(first, &snapshot).unwrap();
    assert_eq!(Job::new(&contract, contract_address).puzzle, assignment.puzzle);

    let solution = Sha256dHasher::new()
        .search(&assignment.puzzle, Solution::new(0, 0, 0, 0), 10_000)
        .unwrap();
    let settlement = backend.complete(&id, Some(solution), &snapshot).unwrap();
    assert_eq!(settlement.job_type, BoostType::Contract);
    assert!(settlement.secret.is_some());
    assert_eq!(settlement.assignments.len(), 1);
    assert_eq!(settlement.assignments[0].worker, first.worker);

    // The bounty is the only job left, and someone else redeems it.
    let freed = backend.new_input(&Outpoint::new(Digest256([2; 32]), 0), Digest256([0xee; 32]));
    assert_eq!(freed.len(), 1);
    let status = backend.status();
    assert_eq!(status.bounties_queued, 0);
    assert_eq!(status.in_progress, 0);
}
