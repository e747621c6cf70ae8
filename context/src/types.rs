//! Ledger-side view of an unspent output, as handed over by a UTxO source.
//!
//! This is the structured record the context builder consumes; turning it
//! into the module's `ResolvedUtxo` shape happens in [`crate::builder`].

use std::collections::BTreeMap;

use phase2_primitives::{Datum, PolicyId, ScriptRef, UtxoRef};

/// Native assets of an output grouped by policy: policy -> asset name -> quantity.
pub type MultiAsset = BTreeMap<PolicyId, BTreeMap<Vec<u8>, u64>>;

/// An output as the ledger describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerOutput {
    pub address: String,
    /// Base coin (lovelace).
    pub coin: u64,
    pub multiasset: MultiAsset,
    pub datum: Datum,
    pub script_ref: Option<ScriptRef>,
}

impl LedgerOutput {
    /// An output holding only the base coin, with no datum or script.
    pub fn new(address: impl Into<String>, coin: u64) -> Self {
        Self {
            address: address.into(),
            coin,
            multiasset: MultiAsset::new(),
            datum: Datum::None,
            script_ref: None,
        }
    }

    pub fn with_asset(mut self, policy: PolicyId, asset_name: impl Into<Vec<u8>>, quantity: u64) -> Self {
        self.multiasset
            .entry(policy)
            .or_default()
            .insert(asset_name.into(), quantity);
        self
    }

    pub fn with_datum(mut self, datum: Datum) -> Self {
        self.datum = datum;
        self
    }

    pub fn with_script_ref(mut self, script_ref: ScriptRef) -> Self {
        self.script_ref = Some(script_ref);
        self
    }
}

/// An unspent output together with the reference that spends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerUtxo {
    pub utxo_ref: UtxoRef,
    pub output: LedgerOutput,
}

impl LedgerUtxo {
    pub fn new(utxo_ref: UtxoRef, output: LedgerOutput) -> Self {
        Self { utxo_ref, output }
    }
}
