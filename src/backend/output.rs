//! A Boost output observed on chain

use crate::boost::OutputScript;
use crate::types::{Digest256, Outpoint, Satoshi};
use serde::{Deserialize, Serialize};

/// An unspent output carrying a Boost script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub outpoint: Outpoint,
    pub script: OutputScript,
    pub value: Satoshi,
    /// Hash of the script, shared by every output with the same script
    pub id: Digest256,
}

impl Output {
    pub fn new(outpoint: Outpoint, script: OutputScript, value: Satoshi) -> Self {
        let id = script.id();
        Self {
            outpoint,
            script,
            value,
            id,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.outpoint.is_valid() && self.script.is_valid() && self.id.is_valid()
    }
}
