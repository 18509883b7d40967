//! Script byte code: opcodes, push encoding and a structural matcher
//!
//! Only what the Boost templates need is modelled. Scripts are never executed
//! here; they are compiled from fields and pattern-matched back into them.

use std::fmt;

/// Opcodes used by the Boost templates
pub mod op {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_PUSHDATA4: u8 = 0x4e;
    pub const OP_2: u8 = 0x52;
    pub const OP_3: u8 = 0x53;
    pub const OP_4: u8 = 0x54;
    pub const OP_5: u8 = 0x55;
    pub const OP_8: u8 = 0x58;
    pub const OP_VERIFY: u8 = 0x69;
    pub const OP_TOALTSTACK: u8 = 0x6b;
    pub const OP_FROMALTSTACK: u8 = 0x6c;
    pub const OP_DROP: u8 = 0x75;
    pub const OP_DUP: u8 = 0x76;
    pub const OP_PICK: u8 = 0x79;
    pub const OP_ROLL: u8 = 0x7a;
    pub const OP_SWAP: u8 = 0x7c;
    pub const OP_CAT: u8 = 0x7e;
    pub const OP_SPLIT: u8 = 0x7f;
    pub const OP_SIZE: u8 = 0x82;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_SUB: u8 = 0x94;
    pub const OP_RSHIFT: u8 = 0x99;
    pub const OP_LESSTHAN: u8 = 0x9f;
    pub const OP_LESSTHANOREQUAL: u8 = 0xa1;
    pub const OP_GREATERTHANOREQUAL: u8 = 0xa2;
    pub const OP_HASH256: u8 = 0xaa;
    pub const OP_CHECKSIG: u8 = 0xac;
}

/// One decoded script element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Data push, including the empty push `OP_0`
    Push(Vec<u8>),
    /// Any other opcode
    Op(u8),
}

impl Instruction {
    pub fn push(data: impl Into<Vec<u8>>) -> Self {
        Instruction::Push(data.into())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Push(data) if data.is_empty() => write!(f, "OP_0"),
            Instruction::Push(data) => write!(f, "{{{}}}", hex::encode(data)),
            Instruction::Op(byte) => write!(f, "{}", opcode_name(*byte)),
        }
    }
}

fn opcode_name(byte: u8) -> String {
    use op::*;
    let name = match byte {
        OP_2 => "OP_2",
        OP_3 => "OP_3",
        OP_4 => "OP_4",
        OP_5 => "OP_5",
        OP_8 => "OP_8",
        OP_VERIFY => "OP_VERIFY",
        OP_TOALTSTACK => "OP_TOALTSTACK",
        OP_FROMALTSTACK => "OP_FROMALTSTACK",
        OP_DROP => "OP_DROP",
        OP_DUP => "OP_DUP",
        OP_PICK => "OP_PICK",
        OP_ROLL => "OP_ROLL",
        OP_SWAP => "OP_SWAP",
        OP_CAT => "OP_CAT",
        OP_SPLIT => "OP_SPLIT",
        OP_SIZE => "OP_SIZE",
        OP_EQUALVERIFY => "OP_EQUALVERIFY",
        OP_SUB => "OP_SUB",
        OP_RSHIFT => "OP_RSHIFT",
        OP_LESSTHAN => "OP_LESSTHAN",
        OP_LESSTHANOREQUAL => "OP_LESSTHANOREQUAL",
        OP_GREATERTHANOREQUAL => "OP_GREATERTHANOREQUAL",
        OP_HASH256 => "OP_HASH256",
        OP_CHECKSIG => "OP_CHECKSIG",
        other => return format!("OP_{:#04x}", other),
    };
    name.to_string()
}

/// Append the minimal push of `data`. Data is never encoded as a small-number opcode.
pub fn write_push(out: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    if len == 0 {
        out.push(op::OP_0);
        return;
    } else if len < op::OP_PUSHDATA1 as usize {
        out.push(len as u8);
    } else if len <= u8::MAX as usize {
        out.push(op::OP_PUSHDATA1);
        out.push(len as u8);
    } else if len <= u16::MAX as usize {
        out.push(op::OP_PUSHDATA2);
        out.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        out.push(op::OP_PUSHDATA4);
        out.extend_from_slice(&(len as u32).to_le_bytes());
    }
    out.extend_from_slice(data);
}

/// Serialize a list of instructions
pub fn compile(instructions: &[Instruction]) -> Vec<u8> {
    let mut out = Vec::new();
    for instruction in instructions {
        match instruction {
            Instruction::Push(data) => write_push(&mut out, data),
            Instruction::Op(byte) => out.push(*byte),
        }
    }
    out
}

/// Split a script into instructions, `None` if a push runs past the end
pub fn decompile(script: &[u8]) -> Option<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut rest = script;

    while let Some((&byte, tail)) = rest.split_first() {
        rest = tail;
        let len = match byte {
            op::OP_0 => 0,
            1..=0x4b => byte as usize,
            op::OP_PUSHDATA1 => {
                let (&n, tail) = rest.split_first()?;
                rest = tail;
                n as usize
            }
            op::OP_PUSHDATA2 => {
                let n = rest.get(..2)?;
                let n = u16::from_le_bytes([n[0], n[1]]) as usize;
                rest = &rest[2..];
                n
            }
            op::OP_PUSHDATA4 => {
                let n = rest.get(..4)?;
                let n = u32::from_le_bytes([n[0], n[1], n[2], n[3]]) as usize;
                rest = &rest[4..];
                n
            }
            other => {
                instructions.push(Instruction::Op(other));
                continue;
            }
        };
        let data = rest.get(..len)?;
        instructions.push(Instruction::Push(data.to_vec()));
        rest = &rest[len..];
    }

    Some(instructions)
}

/// Human-readable rendering of a script
pub fn to_asm(script: &[u8]) -> String {
    match decompile(script) {
        Some(instructions) => instructions
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" "),
        None => format!("<invalid {}>", hex::encode(script)),
    }
}

/// Cursor over decompiled instructions used to match a fixed template
pub struct Matcher<'a> {
    instructions: &'a [Instruction],
    position: usize,
}

impl<'a> Matcher<'a> {
    pub fn new(instructions: &'a [Instruction]) -> Self {
        Self {
            instructions,
            position: 0,
        }
    }

    fn peek(&self) -> Option<&'a Instruction> {
        self.instructions.get(self.position)
    }

    /// Take the next push of any size
    pub fn expect_push(&mut self) -> Option<&'a [u8]> {
        match self.peek()? {
            Instruction::Push(data) => {
                self.position += 1;
                Some(data)
            }
            Instruction::Op(_) => None,
        }
    }

    /// Take the next push, which must be exactly `size` bytes
    pub fn expect_push_size(&mut self, size: usize) -> Option<&'a [u8]> {
        match self.peek()? {
            Instruction::Push(data) if data.len() == size => {
                self.position += 1;
                Some(data)
            }
            _ => None,
        }
    }

    /// Take the next push only if it is exactly `size` bytes
    pub fn optional_push_size(&mut self, size: usize) -> Option<&'a [u8]> {
        self.expect_push_size(size)
    }

    /// Take the next push only if it has exactly these bytes
    pub fn expect_data(&mut self, expected: &[u8]) -> Option<()> {
        match self.peek()? {
            Instruction::Push(data) if data.as_slice() == expected => {
                self.position += 1;
                Some(())
            }
            _ => None,
        }
    }

    /// Match a run of instructions exactly
    pub fn expect_sequence(&mut self, expected: &[Instruction]) -> Option<()> {
        let end = self.position.checked_add(expected.len())?;
        if self.instructions.get(self.position..end)? != expected {
            return None;
        }
        self.position = end;
        Some(())
    }

    /// Require that everything has been consumed
    pub fn expect_end(&self) -> Option<()> {
        (self.position == self.instructions.len()).then_some(())
    }

    pub fn is_at_end(&self) -> bool {
        self.position == self.instructions.len()
    }
}
