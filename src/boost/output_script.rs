//! The Boost output script
//!
//! Layout:
//!
//! ```text
//! "boostpow" OP_DROP [miner_address] category content target tag user_nonce data
//! <verification program>
//! ```
//!
//! The miner address push is present only for contracts.

use super::script::{compile, decompile, op, Instruction, Matcher};
use super::BoostType;
use crate::crypto::hash256;
use crate::types::{Address, Digest256};
use crate::work::{Difficulty, Target};
use crate::Result;
use byteorder::{ByteOrder, LittleEndian};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker pushed at the start of every Boost output
pub const BOOST_MARKER: &[u8] = b"boostpow";

/// Longest tag a Boost script may carry
pub const MAX_TAG_SIZE: usize = 20;

fn ops(bytes: &[u8]) -> impl Iterator<Item = Instruction> + '_ {
    bytes.iter().map(|&b| Instruction::Op(b))
}

/// Converts a compact target on the stack to its expanded form
static EXPAND_TARGET: Lazy<Vec<Instruction>> = Lazy::new(|| {
    use op::*;
    let mut program: Vec<Instruction> = ops(&[
        OP_SIZE, OP_4, OP_EQUALVERIFY, OP_3, OP_SPLIT,
        OP_DUP, OP_3, OP_GREATERTHANOREQUAL, OP_VERIFY,
        OP_DUP,
    ])
    .collect();
    program.push(Instruction::push(vec![0x20]));
    program.extend(ops(&[OP_LESSTHANOREQUAL, OP_VERIFY, OP_TOALTSTACK]));
    program.push(Instruction::push(vec![0u8; 29]));
    program.extend(ops(&[OP_CAT, OP_FROMALTSTACK, OP_3, OP_SUB, OP_RSHIFT]));
    program
});

/// Everything after the data pushes: checks the proof of work and the signature
static VERIFICATION_PROGRAM: Lazy<Vec<Instruction>> = Lazy::new(|| {
    use op::*;
    let mut program: Vec<Instruction> = ops(&[
        OP_CAT, OP_SWAP,
        // Miner address to the alt stack, keeping a copy.
        OP_5, OP_ROLL, OP_DUP, OP_TOALTSTACK, OP_CAT,
        OP_2, OP_PICK,
    ])
    .collect();
    program.extend(EXPAND_TARGET.iter().cloned());
    program.extend(ops(&[
        OP_TOALTSTACK,
        // extra_nonce_1
        OP_5, OP_ROLL, OP_SIZE, OP_4, OP_EQUALVERIFY, OP_CAT,
        // extra_nonce_2
        OP_5, OP_ROLL, OP_SIZE, OP_8, OP_EQUALVERIFY, OP_CAT,
        // Merkle root
        OP_SWAP, OP_CAT, OP_HASH256,
        OP_SWAP, OP_TOALTSTACK, OP_CAT, OP_CAT,
        // timestamp
        OP_SWAP, OP_SIZE, OP_4, OP_EQUALVERIFY, OP_CAT,
        OP_FROMALTSTACK, OP_CAT,
        // nonce
        OP_SWAP, OP_SIZE, OP_4, OP_EQUALVERIFY, OP_CAT,
        OP_HASH256, OP_FROMALTSTACK, OP_LESSTHAN, OP_VERIFY,
        OP_DUP, OP_HASH256, OP_FROMALTSTACK, OP_EQUALVERIFY, OP_CHECKSIG,
    ]));
    program
});

/// A decoded Boost output script
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputScript {
    #[serde(rename = "type")]
    pub script_type: BoostType,
    pub category: i32,
    pub content: Digest256,
    pub target: Target,
    #[serde(with = "hex::serde")]
    pub tag: Vec<u8>,
    pub user_nonce: u32,
    #[serde(with = "hex::serde")]
    pub additional_data: Vec<u8>,
    /// Zero for bounties
    pub miner_address: Address,
}

impl OutputScript {
    /// A bounty script, invalid if the tag is too long
    pub fn bounty(
        category: i32,
        content: Digest256,
        target: Target,
        tag: impl Into<Vec<u8>>,
        user_nonce: u32,
        additional_data: impl Into<Vec<u8>>,
    ) -> Self {
        Self::build(
            BoostType::Bounty,
            category,
            content,
            target,
            tag.into(),
            user_nonce,
            additional_data.into(),
            Address::default(),
        )
    }

    /// A contract script bound to `miner_address`, invalid if the tag is too long
    pub fn contract(
        category: i32,
        content: Digest256,
        target: Target,
        tag: impl Into<Vec<u8>>,
        user_nonce: u32,
        additional_data: impl Into<Vec<u8>>,
        miner_address: Address,
    ) -> Self {
        Self::build(
            BoostType::Contract,
            category,
            content,
            target,
            tag.into(),
            user_nonce,
            additional_data.into(),
            miner_address,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        script_type: BoostType,
        category: i32,
        content: Digest256,
        target: Target,
        tag: Vec<u8>,
        user_nonce: u32,
        additional_data: Vec<u8>,
        miner_address: Address,
    ) -> Self {
        if tag.len() > MAX_TAG_SIZE {
            return Self::default();
        }
        Self {
            script_type,
            category,
            content,
            target,
            tag,
            user_nonce,
            additional_data,
            miner_address,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.script_type.is_valid()
    }

    pub fn is_bounty(&self) -> bool {
        self.script_type == BoostType::Bounty
    }

    pub fn is_contract(&self) -> bool {
        self.script_type == BoostType::Contract
    }

    /// Compile to script bytes; an invalid script compiles to nothing
    pub fn write(&self) -> Vec<u8> {
        if !self.is_valid() {
            return Vec::new();
        }

        let mut program = vec![Instruction::push(BOOST_MARKER), Instruction::Op(op::OP_DROP)];
        if self.is_contract() {
            program.push(Instruction::push(self.miner_address.as_bytes().to_vec()));
        }
        program.extend([
            Instruction::push(self.category.to_le_bytes().to_vec()),
            Instruction::push(self.content.as_bytes().to_vec()),
            Instruction::push(self.target.to_le_bytes().to_vec()),
            Instruction::push(self.tag.clone()),
            Instruction::push(self.user_nonce.to_le_bytes().to_vec()),
            Instruction::push(self.additional_data.clone()),
        ]);
        program.extend(VERIFICATION_PROGRAM.iter().cloned());

        compile(&program)
    }

    /// Match script bytes against the template; anything else is invalid
    pub fn read(script: &[u8]) -> Self {
        Self::parse(script).unwrap_or_default()
    }

    fn parse(script: &[u8]) -> Option<Self> {
        let instructions = decompile(script)?;
        let mut m = Matcher::new(&instructions);

        m.expect_data(BOOST_MARKER)?;
        m.expect_sequence(&[Instruction::Op(op::OP_DROP)])?;
        let miner_address = m.optional_push_size(Address::SIZE);
        let category = m.expect_push_size(4)?;
        let content = m.expect_push_size(Digest256::SIZE)?;
        let target = m.expect_push_size(4)?;
        let tag = m.expect_push()?;
        let user_nonce = m.expect_push_size(4)?;
        let additional_data = m.expect_push()?;
        m.expect_sequence(&VERIFICATION_PROGRAM)?;
        m.expect_end()?;

        if tag.len() > MAX_TAG_SIZE {
            return None;
        }

        let (script_type, miner_address) = match miner_address {
            Some(bytes) => (BoostType::Contract, Address::from_slice(bytes).ok()?),
            None => (BoostType::Bounty, Address::default()),
        };

        Some(Self {
            script_type,
            category: LittleEndian::read_i32(category),
            content: Digest256::from_slice(content).ok()?,
            target: Target::from_compact(LittleEndian::read_u32(target)),
            tag: tag.to_vec(),
            user_nonce: LittleEndian::read_u32(user_nonce),
            additional_data: additional_data.to_vec(),
            miner_address,
        })
    }

    /// Job identity: hash of the written script, zero when invalid
    pub fn id(&self) -> Digest256 {
        if self.is_valid() {
            hash256(&self.write())
        } else {
            Digest256::default()
        }
    }

    pub fn difficulty(&self) -> Result<Difficulty> {
        self.target.difficulty()
    }
}

impl fmt::Display for OutputScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "OutputScript {{ type: invalid }}");
        }
        write!(f, "OutputScript {{ type: {}", self.script_type)?;
        if self.is_contract() {
            write!(f, ", miner_address: {}", self.miner_address)?;
        }
        write!(
            f,
            ", category: {}, content: {}, target: {}, tag: {}, user_nonce: {}, additional_data: {} }}",
            self.category,
            self.content,
            self.target,
            hex::encode(&self.tag),
            self.user_nonce,
            hex::encode(&self.additional_data)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounty() -> OutputScript {
        OutputScript::bounty(
            0x41,
            Digest256([0xc0; 32]),
            Target::encode(0x1d, 0x00ffff),
            b"test".to_vec(),
            0x01020304,
            b"some data".to_vec(),
        )
    }

    #[test]
    fn test_bounty_round_trip() {
        let script = bounty();
        let bytes = script.write();
        assert_eq!(OutputScript::read(&bytes), script);
        assert!(OutputScript::read(&bytes).is_bounty());
    }

    #[test]
    fn test_contract_round_trip() {
        let script = OutputScript::contract(
            -7,
            Digest256([0x01; 32]),
            Target::EASY,
            Vec::new(),
            0,
            Vec::new(),
            Address([0xab; 20]),
        );
        let read = OutputScript::read(&script.write());
        assert!(read.is_contract());
        assert_eq!(read.miner_address, Address([0xab; 20]));
        assert_eq!(read, script);
    }

    #[test]
    fn test_script_prefix_bytes() {
        let bytes = bounty().write();
        assert_eq!(&bytes[..10], b"\x08boostpow\x75");
        // category push follows directly for bounties
        assert_eq!(&bytes[10..15], &[4, 0x41, 0, 0, 0]);
        assert_eq!(*bytes.last().unwrap(), op::OP_CHECKSIG);
    }

    #[test]
    fn test_expand_target_bytes() {
        let program = compile(&EXPAND_TARGET);
        let mut expected = hex::decode("825488537f7653a269760120a1696b1d").unwrap();
        expected.extend_from_slice(&[0u8; 29]);
        expected.extend_from_slice(&hex::decode("7e6c539499").unwrap());
        assert_eq!(program, expected);
    }

    #[test]
    fn test_tag_too_long_is_invalid() {
        let script = OutputScript::bounty(
            1,
            Digest256([1; 32]),
            Target::EASY,
            vec![0u8; 21],
            0,
            Vec::new(),
        );
        assert!(!script.is_valid());
        assert!(script.write().is_empty());
        assert!(!script.id().is_valid());
    }

    #[test]
    fn test_read_rejects_long_tag_in_bytes() {
        let mut script = bounty();
        script.tag = vec![7u8; 21];
        // Bypass the constructor check and compile directly.
        let bytes = script.write();
        assert!(!OutputScript::read(&bytes).is_valid());
    }

    #[test]
    fn test_read_rejects_garbage() {
        assert!(!OutputScript::read(&[]).is_valid());
        assert!(!OutputScript::read(&[0x76, 0xa9, 0x14]).is_valid());
        let mut bytes = bounty().write();
        bytes.push(op::OP_DROP);
        assert!(!OutputScript::read(&bytes).is_valid());
        bytes.truncate(bytes.len() - 2);
        assert!(!OutputScript::read(&bytes).is_valid());
    }

    #[test]
    fn test_id_is_hash_of_script() {
        let script = bounty();
        assert_eq!(script.id(), hash256(&script.write()));
        assert_eq!(script.id(), bounty().id());
        let mut other = bounty();
        other.user_nonce += 1;
        assert_ne!(script.id(), other.id());
    }

    #[test]
    fn test_display() {
        assert_eq!(OutputScript::default().to_string(), "OutputScript { type: invalid }");
        assert!(bounty().to_string().contains("type: bounty"));
    }
}
