//! Reacting to Boost outputs and inputs seen on chain

use super::contracts::ContractJob;
use super::database::{AddressSource, OutputLedger, OutputStatus, SaleStatus, SalesTracker};
use super::manager::{BountyJob, QueueEnd};
use super::output::Output;
use crate::boost::{BoostType, OutputScript};
use crate::types::{Digest256, Outpoint, Satoshi};
use tracing::{debug, info};

/// Routes chain events to the ledger and the job queues
///
/// Borrows every collaborator for the duration of one event.
pub struct Monitor<'a> {
    pub outputs: &'a mut dyn OutputLedger,
    pub sales: &'a mut dyn SalesTracker,
    pub contracts: &'a mut dyn QueueEnd<ContractJob>,
    pub bounties: &'a mut dyn QueueEnd<BountyJob>,
    pub addresses: &'a mut dyn AddressSource,
}

impl<'a> Monitor<'a> {
    /// A transaction paid to a Boost output script
    ///
    /// New bounties are queued with a fresh redeem address. Contracts are
    /// only queued when they pay for a sale we offered. Further outputs of a
    /// queued script are added to its job. Returns the script's type, or
    /// `Invalid` if it was rejected.
    pub fn new_output(&mut self, script: &OutputScript, value: Satoshi, outpoint: Outpoint) -> BoostType {
        if !script.is_valid() || !outpoint.is_valid() {
            debug!(outpoint = %outpoint, "ignoring invalid output");
            return BoostType::Invalid;
        }

        let id = script.id();
        if !self.outputs.put(script) || !self.outputs.register_output(id, value, outpoint) {
            debug!(id = %id, outpoint = %outpoint, "output already known");
            return BoostType::Invalid;
        }

        let output = Output::new(outpoint, script.clone(), value);
        match script.script_type {
            BoostType::Bounty => {
                if !self.bounties.add_output(&output) {
                    let redeem_address = self.addresses.get_new();
                    info!(id = %id, value, "bounty seen");
                    self.bounties.insert(BountyJob { output, redeem_address });
                }
            }
            BoostType::Contract => match self.sales.search(&id).map(|sale| (sale.status, sale)) {
                Some((SaleStatus::Offered, sale)) => {
                    info!(id = %id, value, "contract accepted");
                    self.contracts.insert(ContractJob::new(output, sale.secret));
                    self.sales.update(&id, SaleStatus::Accepted);
                }
                Some((SaleStatus::Accepted, _)) if self.contracts.add_output(&output) => {}
                Some((status, _)) => debug!(id = %id, ?status, "contract no longer open"),
                None => debug!(id = %id, "contract is not ours"),
            },
            BoostType::Invalid => return BoostType::Invalid,
        }

        script.script_type
    }

    /// A transaction spent an output
    ///
    /// Returns the script ID once all of its outputs are spent, after taking
    /// it out of both queues.
    pub fn new_input(&mut self, outpoint: &Outpoint, txid: Digest256) -> Option<Digest256> {
        let (id, status) = self.outputs.redeem(outpoint, txid)?;
        if status != OutputStatus::Redeemed {
            return None;
        }

        info!(id = %id, txid = %txid, "script redeemed");
        self.contracts.remove(&id);
        self.bounties.remove(&id);
        Some(id)
    }
}
