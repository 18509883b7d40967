//! Compact mining target
//!
//! A target is a 32-bit value whose most significant byte is an exponent and
//! whose low 24 bits are the digits. It expands to `digits << 8 * (exponent - 3)`.

use crate::work::difficulty::Difficulty;
use crate::{Error, Result};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Compact-encoded proof-of-work target
///
/// Comparison, equality and hashing all go through [`Target::expand`]; two
/// different encodings of the same magnitude are the same target.
#[derive(Debug, Clone, Copy, Default)]
pub struct Target(u32);

impl Target {
    /// Smallest valid exponent
    pub const MIN_EXPONENT: u8 = 3;
    /// Largest valid exponent
    pub const MAX_EXPONENT: u8 = 32;

    /// The easiest representable target
    pub const EASY: Target = Target::encode(32, 0xff_ffff);
    /// The hardest representable target
    pub const HARD: Target = Target::encode(3, 0x00_0001);

    /// A target met by half of all hashes
    pub const SUCCESS_HALF: Target = Target::encode(32, 0x80_0000);
    /// A target met by a quarter of all hashes
    pub const SUCCESS_QUARTER: Target = Target::encode(32, 0x40_0000);
    /// A target met by an eighth of all hashes
    pub const SUCCESS_EIGHTH: Target = Target::encode(32, 0x20_0000);
    /// A target met by a sixteenth of all hashes
    pub const SUCCESS_SIXTEENTH: Target = Target::encode(32, 0x10_0000);

    /// Pack an exponent and 24-bit digits. No normalization is done.
    pub const fn encode(exponent: u8, digits: u32) -> Self {
        Self(((exponent as u32) << 24) | (digits & 0x00ff_ffff))
    }

    /// Create from the raw 32-bit encoding
    pub const fn from_compact(compact: u32) -> Self {
        Self(compact)
    }

    /// Raw 32-bit encoding
    pub const fn to_compact(&self) -> u32 {
        self.0
    }

    /// Create from the 4-byte little-endian wire form
    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    /// The 4-byte little-endian wire form
    pub fn to_le_bytes(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Exponent byte
    pub fn exponent(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// 24-bit mantissa
    pub fn digits(&self) -> u32 {
        self.0 & 0x00ff_ffff
    }

    /// Valid iff `3 <= exponent <= 32` and the digits are nonzero
    pub fn is_valid(&self) -> bool {
        let exponent = self.exponent();
        (Self::MIN_EXPONENT..=Self::MAX_EXPONENT).contains(&exponent) && self.digits() != 0
    }

    /// Expanded 256-bit magnitude, zero for an invalid encoding
    pub fn expand(&self) -> BigUint {
        if !self.is_valid() {
            return BigUint::zero();
        }
        let shift = 8 * (self.exponent() - Self::MIN_EXPONENT) as usize;
        BigUint::from(self.digits()) << shift
    }

    /// Exact difficulty of this target
    pub fn difficulty(&self) -> Result<Difficulty> {
        if !self.is_valid() {
            return Err(Error::target(format!(
                "difficulty of invalid target {} is undefined",
                self
            )));
        }
        Ok(Difficulty::from_expanded_target(&self.expand()))
    }

    /// Convert to hexadecimal string of the compact value
    pub fn to_hex(&self) -> String {
        format!("{:08x}", self.0)
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.expand() == other.expand()
    }
}

impl Eq for Target {}

impl PartialOrd for Target {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Target {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expand().cmp(&other.expand())
    }
}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.expand().hash(state);
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != 8 {
            return Err(Error::target(format!(
                "Invalid target hex length: expected 8 chars, got {}",
                digits.len()
            )));
        }
        u32::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|e| Error::target(format!("Invalid hex in target: {}", e)))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Target {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Target::from_str(&s).map_err(serde::de::Error::custom)
    }
}
