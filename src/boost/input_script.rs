//! The Boost input script
//!
//! `signature pubkey nonce timestamp extra_nonce_2 extra_nonce_1 [miner_address]`
//!
//! A bounty redemption names the miner address here; a contract already bound
//! it in the output.

use super::script::{compile, decompile, Instruction, Matcher};
use super::BoostType;
use crate::types::{Address, Pubkey, Signature};
use crate::work::Solution;
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded Boost input script
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputScript {
    #[serde(rename = "type")]
    pub script_type: BoostType,
    pub signature: Signature,
    pub pubkey: Pubkey,
    pub nonce: u32,
    pub timestamp: u32,
    pub extra_nonce_2: u64,
    pub extra_nonce_1: u32,
    /// Zero for contracts
    pub miner_address: Address,
}

impl InputScript {
    /// Input redeeming a bounty, naming the miner's address
    pub fn bounty(
        signature: Signature,
        pubkey: Pubkey,
        nonce: u32,
        timestamp: u32,
        extra_nonce_2: u64,
        extra_nonce_1: u32,
        miner_address: Address,
    ) -> Self {
        Self {
            script_type: BoostType::Bounty,
            signature,
            pubkey,
            nonce,
            timestamp,
            extra_nonce_2,
            extra_nonce_1,
            miner_address,
        }
    }

    /// Input redeeming a contract
    pub fn contract(
        signature: Signature,
        pubkey: Pubkey,
        nonce: u32,
        timestamp: u32,
        extra_nonce_2: u64,
        extra_nonce_1: u32,
    ) -> Self {
        Self {
            script_type: BoostType::Contract,
            signature,
            pubkey,
            nonce,
            timestamp,
            extra_nonce_2,
            extra_nonce_1,
            miner_address: Address::default(),
        }
    }

    /// Input carrying a found solution. For a bounty the miner address is
    /// the hash of `pubkey`.
    pub fn from_solution(
        signature: Signature,
        pubkey: Pubkey,
        solution: &Solution,
        script_type: BoostType,
    ) -> Self {
        match script_type {
            BoostType::Invalid => Self::default(),
            BoostType::Bounty => {
                let miner_address = pubkey.address();
                Self::bounty(
                    signature,
                    pubkey,
                    solution.nonce,
                    solution.timestamp,
                    solution.extra_nonce_2,
                    solution.extra_nonce_1,
                    miner_address,
                )
            }
            BoostType::Contract => Self::contract(
                signature,
                pubkey,
                solution.nonce,
                solution.timestamp,
                solution.extra_nonce_2,
                solution.extra_nonce_1,
            ),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.script_type.is_valid()
    }

    /// The solution this input carries
    pub fn solution(&self) -> Solution {
        Solution::new(self.timestamp, self.nonce, self.extra_nonce_1, self.extra_nonce_2)
    }

    /// Compile to script bytes; an invalid script compiles to nothing
    pub fn write(&self) -> Vec<u8> {
        if !self.is_valid() {
            return Vec::new();
        }

        let mut program = vec![
            Instruction::push(self.signature.as_bytes().to_vec()),
            Instruction::push(self.pubkey.as_bytes().to_vec()),
            Instruction::push(self.nonce.to_le_bytes().to_vec()),
            Instruction::push(self.timestamp.to_le_bytes().to_vec()),
            Instruction::push(self.extra_nonce_2.to_le_bytes().to_vec()),
            Instruction::push(self.extra_nonce_1.to_le_bytes().to_vec()),
        ];
        if self.script_type == BoostType::Bounty {
            program.push(Instruction::push(self.miner_address.as_bytes().to_vec()));
        }

        compile(&program)
    }

    /// Match script bytes against the template; anything else is invalid
    pub fn read(script: &[u8]) -> Self {
        Self::parse(script).unwrap_or_default()
    }

    fn parse(script: &[u8]) -> Option<Self> {
        let instructions = decompile(script)?;
        let mut m = Matcher::new(&instructions);

        let signature = m.expect_push()?;
        let pubkey = m
            .expect_push_size(Pubkey::COMPRESSED_SIZE)
            .or_else(|| m.expect_push_size(Pubkey::UNCOMPRESSED_SIZE))?;
        let nonce = m.expect_push_size(4)?;
        let timestamp = m.expect_push_size(4)?;
        let extra_nonce_2 = m.expect_push_size(8)?;
        let extra_nonce_1 = m.expect_push_size(4)?;
        let miner_address = m.optional_push_size(Address::SIZE);
        m.expect_end()?;

        let (script_type, miner_address) = match miner_address {
            Some(bytes) => (BoostType::Bounty, Address::from_slice(bytes).ok()?),
            None => (BoostType::Contract, Address::default()),
        };

        Some(Self {
            script_type,
            signature: Signature::new(signature.to_vec()),
            pubkey: Pubkey::new(pubkey.to_vec()),
            nonce: LittleEndian::read_u32(nonce),
            timestamp: LittleEndian::read_u32(timestamp),
            extra_nonce_2: LittleEndian::read_u64(extra_nonce_2),
            extra_nonce_1: LittleEndian::read_u32(extra_nonce_1),
            miner_address,
        })
    }
}

impl fmt::Display for InputScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "InputScript {{ type: invalid }}");
        }
        write!(
            f,
            "InputScript {{ type: {}, signature: {}, pubkey: {}, nonce: {}, timestamp: {}, extra_nonce_2: {}, extra_nonce_1: {}",
            self.script_type,
            self.signature,
            self.pubkey,
            self.nonce,
            self.timestamp,
            self.extra_nonce_2,
            self.extra_nonce_1
        )?;
        if self.script_type == BoostType::Bounty {
            write!(f, ", miner_address: {}", self.miner_address)?;
        }
        write!(f, " }}")
    }
}
