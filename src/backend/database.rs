//! Collaborators the backend records its view of the chain through
//!
//! The traits are what the monitor needs. The in-memory implementations back
//! the binary and the tests.

use crate::boost::{Job, OutputScript};
use crate::crypto::{hash160, hash256};
use crate::types::{Address, Digest256, Outpoint, Satoshi, Secret};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Hands out addresses whose keys we hold
pub trait AddressSource {
    /// A fresh address, never returned before
    fn get_new(&mut self) -> Address;
}

/// What we know about the outputs of a script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStatus {
    /// Never seen
    #[default]
    Unknown,
    /// Offered to a client but not yet on chain
    Unspent,
    /// Outputs exist on chain and none are spent
    Unredeemed,
    /// Every output has been spent
    Redeemed,
    /// Some outputs have been spent
    PartiallyRedeemed,
}

/// An on-chain output of a Boost script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub value: Satoshi,
    pub outpoint: Outpoint,
    /// Txid of the spending transaction
    pub redeemed: Option<Digest256>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub status: OutputStatus,
    /// Expected seconds to solve; zero once redeemed
    pub expected_time: f64,
    pub difficulty: f64,
    pub outputs: Vec<OutputRecord>,
}

impl ScriptRecord {
    /// Satoshis offered per unit of difficulty
    pub fn price(&self) -> f64 {
        if self.difficulty <= 0.0 {
            return 0.0;
        }
        self.outputs.iter().map(|o| o.value as f64).sum::<f64>() / self.difficulty
    }

    fn refresh_status(&mut self) {
        let spent = self.outputs.iter().filter(|o| o.redeemed.is_some()).count();
        self.status = match spent {
            _ if self.outputs.is_empty() => OutputStatus::Unspent,
            0 => OutputStatus::Unredeemed,
            n if n == self.outputs.len() => OutputStatus::Redeemed,
            _ => OutputStatus::PartiallyRedeemed,
        };
        if self.status == OutputStatus::Redeemed {
            self.expected_time = 0.0;
        }
    }
}

/// Ledger of Boost outputs, keyed by script ID
pub trait OutputLedger {
    /// Record an output of a known or new script
    fn register_output(&mut self, id: Digest256, value: Satoshi, outpoint: Outpoint) -> bool;

    fn get(&self, id: &Digest256) -> ScriptRecord;

    /// Record a script; false if it is invalid
    fn put(&mut self, script: &OutputScript) -> bool;

    /// Mark an output spent. Returns the script ID and its new status.
    fn redeem(&mut self, outpoint: &Outpoint, txid: Digest256) -> Option<(Digest256, OutputStatus)>;
}

/// Where a sale of Boost work stands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    #[default]
    NotOurs,
    Offered,
    Accepted,
    Working,
    Completed,
}

/// A contract we have offered or agreed to work on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub job: Job,
    /// Key for the contract's miner address
    #[serde(skip)]
    pub secret: Secret,
}

impl SaleRecord {
    pub fn offer(job: Job, secret: Secret, expires_at: DateTime<Utc>) -> Self {
        Self {
            status: SaleStatus::Offered,
            created_at: Utc::now(),
            expires_at,
            job,
            secret,
        }
    }

    /// ID of the script the sale is for
    pub fn id(&self) -> Digest256 {
        self.job.output_script().id()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Contracts we have sold
pub trait SalesTracker {
    fn put(&mut self, sale: SaleRecord);

    fn search(&self, id: &Digest256) -> Option<SaleRecord>;

    /// False if there is no such sale
    fn update(&mut self, id: &Digest256, status: SaleStatus) -> bool;
}

/// Filter over indexed content. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentQuery {
    pub digest: Option<Digest256>,
    /// Hash of the additional data
    pub title: Option<Digest256>,
    pub tag: Option<Vec<u8>>,
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub first_record: u64,
    pub max_records: u64,
}

/// All scripts boosting one piece of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub digest: Digest256,
    pub scripts: Vec<ScriptRecord>,
    /// Sum of the scripts' difficulty
    pub total: f64,
}

pub trait ContentIndex {
    fn query(&self, query: &ContentQuery) -> Vec<ContentRecord>;
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    script: Option<OutputScript>,
    first_seen: DateTime<Utc>,
    record: ScriptRecord,
}

/// Output ledger and content index held in memory
#[derive(Debug, Default)]
pub struct MemoryLedger {
    scripts: HashMap<Digest256, LedgerEntry>,
    outpoints: HashMap<Outpoint, Digest256>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    fn entry(&mut self, id: Digest256) -> &mut LedgerEntry {
        self.scripts.entry(id).or_insert_with(|| LedgerEntry {
            script: None,
            first_seen: Utc::now(),
            record: ScriptRecord::default(),
        })
    }

    fn matches(entry: &LedgerEntry, query: &ContentQuery) -> bool {
        let Some(script) = &entry.script else {
            return false;
        };
        query.digest.map_or(true, |d| d == script.content)
            && query.title.map_or(true, |t| t == hash256(&script.additional_data))
            && query.tag.as_ref().map_or(true, |t| t == &script.tag)
            && query.begin.map_or(true, |b| entry.first_seen >= b)
            && query.end.map_or(true, |e| entry.first_seen < e)
    }
}

impl OutputLedger for MemoryLedger {
    fn register_output(&mut self, id: Digest256, value: Satoshi, outpoint: Outpoint) -> bool {
        if !id.is_valid() || !outpoint.is_valid() {
            return false;
        }
        if self.outpoints.get(&outpoint).is_some_and(|known| known == &id) {
            return false;
        }

        let entry = self.entry(id);
        entry.record.outputs.push(OutputRecord {
            value,
            outpoint,
            redeemed: None,
        });
        entry.record.refresh_status();
        self.outpoints.insert(outpoint, id);
        true
    }

    fn get(&self, id: &Digest256) -> ScriptRecord {
        self.scripts
            .get(id)
            .map(|e| e.record.clone())
            .unwrap_or_default()
    }

    fn put(&mut self, script: &OutputScript) -> bool {
        if !script.is_valid() {
            return false;
        }
        let difficulty = script.difficulty().map(|d| d.to_f64()).unwrap_or_default();
        let entry = self.entry(script.id());
        entry.script = Some(script.clone());
        entry.record.difficulty = difficulty;
        entry.record.refresh_status();
        true
    }

    fn redeem(&mut self, outpoint: &Outpoint, txid: Digest256) -> Option<(Digest256, OutputStatus)> {
        let id = *self.outpoints.get(outpoint)?;
        let entry = self.scripts.get_mut(&id)?;
        for output in entry.record.outputs.iter_mut().filter(|o| &o.outpoint == outpoint) {
            output.redeemed = Some(txid);
        }
        entry.record.refresh_status();
        debug!(id = %id, outpoint = %outpoint, status = ?entry.record.status, "output redeemed");
        Some((id, entry.record.status))
    }
}

impl ContentIndex for MemoryLedger {
    fn query(&self, query: &ContentQuery) -> Vec<ContentRecord> {
        let mut by_content: BTreeMap<Digest256, ContentRecord> = BTreeMap::new();
        for entry in self.scripts.values().filter(|e| Self::matches(e, query)) {
            let Some(script) = &entry.script else { continue };
            let record = by_content.entry(script.content).or_insert_with(|| ContentRecord {
                digest: script.content,
                scripts: Vec::new(),
                total: 0.0,
            });
            record.total += entry.record.difficulty;
            record.scripts.push(entry.record.clone());
        }

        let limit = if query.max_records == 0 {
            usize::MAX
        } else {
            query.max_records as usize
        };
        by_content
            .into_values()
            .skip(query.first_record as usize)
            .take(limit)
            .collect()
    }
}

/// Sales held in memory
#[derive(Debug, Default)]
pub struct MemorySales {
    sales: HashMap<Digest256, SaleRecord>,
}

impl MemorySales {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SalesTracker for MemorySales {
    fn put(&mut self, sale: SaleRecord) {
        self.sales.insert(sale.id(), sale);
    }

    fn search(&self, id: &Digest256) -> Option<SaleRecord> {
        self.sales.get(id).cloned()
    }

    fn update(&mut self, id: &Digest256, status: SaleStatus) -> bool {
        match self.sales.get_mut(id) {
            Some(sale) => {
                sale.status = status;
                true
            }
            None => false,
        }
    }
}

/// Both in-memory stores. Kept as separate fields so they can be borrowed
/// independently.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    pub outputs: MemoryLedger,
    pub sales: MemorySales,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Addresses derived from a seed and a counter
#[derive(Debug)]
pub struct SequentialAddresses {
    seed: [u8; 32],
    next: u64,
}

impl SequentialAddresses {
    pub fn new(seed: [u8; 32]) -> Self {
        Self { seed, next: 0 }
    }

    /// Seeded from the thread RNG
    pub fn random() -> Self {
        Self::new(rand::random())
    }

    pub fn issued(&self) -> u64 {
        self.next
    }
}

impl AddressSource for SequentialAddresses {
    fn get_new(&mut self) -> Address {
        let mut preimage = [0u8; 40];
        preimage[..32].copy_from_slice(&self.seed);
        preimage[32..].copy_from_slice(&self.next.to_le_bytes());
        self.next += 1;
        Address(hash160(&preimage))
    }
}
