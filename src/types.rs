//! Primitive value types shared by the Boost codec and backend
//!
//! Transactions, keys and signatures are treated as opaque values: the backend
//! only needs `is_valid`, hashing and equality from them.

use crate::{Error, Result};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Amount of satoshis
pub type Satoshi = u64;

macro_rules! hex_serde {
    ($name:ident) => {
        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $name::from_str(&s).map_err(serde::de::Error::custom)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }
    };
}

/// 256-bit digest, stored in the byte order it is hashed and pushed in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest256(pub [u8; 32]);

impl Digest256 {
    /// Size in bytes
    pub const SIZE: usize = 32;

    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, which must be exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            Error::script(format!("Invalid digest length: expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    /// Get the digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The zero digest marks "no value"
    pub fn is_valid(&self) -> bool {
        self.0 != [0u8; 32]
    }

    /// Interpret the digest as a little-endian 256-bit number
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_le(&self.0)
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Digest256 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::script(format!("Invalid digest hex: {}", e)))?;
        Self::from_slice(&bytes)
    }
}

hex_serde!(Digest256);

/// 160-bit address (public key hash)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Size in bytes
    pub const SIZE: usize = 20;

    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, which must be exactly 20 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 20] = bytes.try_into().map_err(|_| {
            Error::script(format!("Invalid address length: expected 20 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    /// Get the address bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The zero address marks "no address"
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes =
            hex::decode(s).map_err(|e| Error::script(format!("Invalid address hex: {}", e)))?;
        Self::from_slice(&bytes)
    }
}

hex_serde!(Address);

/// Reference to a transaction output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outpoint {
    /// Transaction id
    pub txid: Digest256,
    /// Output index
    pub index: u32,
}

impl Outpoint {
    /// Create a new outpoint
    pub fn new(txid: Digest256, index: u32) -> Self {
        Self { txid, index }
    }

    /// An outpoint is valid when it names a transaction
    pub fn is_valid(&self) -> bool {
        self.txid.is_valid()
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// DER signature with sighash byte, treated as opaque
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    /// Create a new signature
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the signature bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the signature carries any data
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        hex::decode(s)
            .map(Self)
            .map_err(|e| Error::script(format!("Invalid signature hex: {}", e)))
    }
}

hex_serde!(Signature);

/// Serialized secp256k1 public key, treated as opaque
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Pubkey(pub Vec<u8>);

impl Pubkey {
    /// Compressed key size
    pub const COMPRESSED_SIZE: usize = 33;
    /// Uncompressed key size
    pub const UNCOMPRESSED_SIZE: usize = 65;

    /// Create a new public key
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Structural check on size and prefix byte
    pub fn is_valid(&self) -> bool {
        match (self.0.len(), self.0.first()) {
            (Self::COMPRESSED_SIZE, Some(0x02 | 0x03)) => true,
            (Self::UNCOMPRESSED_SIZE, Some(0x04)) => true,
            _ => false,
        }
    }

    /// The address this key redeems to
    pub fn address(&self) -> Address {
        Address(crate::crypto::hash160(&self.0))
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl FromStr for Pubkey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        hex::decode(s)
            .map(Self)
            .map_err(|e| Error::script(format!("Invalid public key hex: {}", e)))
    }
}

hex_serde!(Pubkey);

/// Private key used to redeem a contract output
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(pub [u8; 32]);

impl Secret {
    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// A zero key is never valid
    pub fn is_valid(&self) -> bool {
        self.0 != [0u8; 32]
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}
