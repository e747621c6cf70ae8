//! Offline UTxO snapshot in the JSON shape exported by chain indexers:
//!
//! ```text
//! [ { "hash": "<tx hash>",
//!     "outputs": [ { "tx_hash", "output_index", "address",
//!                    "amount": [ { "unit", "quantity" } ],
//!                    "inline_datum", "data_hash" } ] } ]
//! ```
//!
//! `unit` is `lovelace` for the base coin, otherwise the 56-char policy id
//! followed by the hex asset name. Quantities may be JSON numbers or strings.
//! An inline datum wins over a datum hash when both are present.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use phase2_primitives::types::parse_hash32;
use phase2_primitives::{Datum, PolicyId, UtxoRef, LOVELACE};

use crate::error::ContextError;
use crate::provider::UtxoProvider;
use crate::types::{LedgerOutput, LedgerUtxo};

/// Hex length of a policy id.
const POLICY_HEX_LEN: usize = 56;

#[derive(Debug, Deserialize)]
struct TxJson {
    outputs: Vec<OutputJson>,
}

#[derive(Debug, Deserialize)]
struct OutputJson {
    tx_hash: String,
    output_index: u64,
    address: String,
    #[serde(default)]
    amount: Vec<AmountJson>,
    #[serde(default)]
    inline_datum: Option<String>,
    #[serde(default)]
    data_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AmountJson {
    unit: String,
    quantity: Quantity,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Quantity {
    Number(u64),
    Text(String),
}

impl Quantity {
    fn value(&self) -> Result<u64, ContextError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s
                .parse()
                .map_err(|e| ContextError::Snapshot(format!("quantity '{s}': {e}"))),
        }
    }
}

/// UTxOs loaded from an offline JSON snapshot, keyed by reference.
#[derive(Debug, Clone, Default)]
pub struct UtxoSnapshot {
    entries: BTreeMap<UtxoRef, LedgerOutput>,
}

impl UtxoSnapshot {
    /// Parse a snapshot. Duplicate `(tx_hash, output_index)` pairs are rejected.
    pub fn from_json(data: &[u8]) -> Result<Self, ContextError> {
        let txs: Vec<TxJson> = serde_json::from_slice(data)?;

        let mut entries = BTreeMap::new();
        for output in txs.into_iter().flat_map(|tx| tx.outputs) {
            let utxo_ref = UtxoRef::new(
                parse_hash32(&output.tx_hash).map_err(|e| ContextError::Snapshot(e.to_string()))?,
                output.output_index,
            );
            let ledger_output = convert_output(output)?;
            if entries.insert(utxo_ref, ledger_output).is_some() {
                return Err(ContextError::DuplicateUtxo(utxo_ref));
            }
        }

        debug!(outputs = entries.len(), "loaded utxo snapshot");
        Ok(Self { entries })
    }

    /// Resolve `inputs` in order, skipping the ones the snapshot lacks.
    ///
    /// Absent inputs surface later as `MissingUtxo` when the context is built.
    pub fn resolve(&self, inputs: &[UtxoRef]) -> Vec<LedgerUtxo> {
        inputs
            .iter()
            .filter_map(|r| {
                self.entries
                    .get(r)
                    .map(|output| LedgerUtxo::new(*r, output.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl UtxoProvider for UtxoSnapshot {
    fn utxo(&self, utxo_ref: &UtxoRef) -> Result<Option<LedgerUtxo>, ContextError> {
        Ok(self
            .entries
            .get(utxo_ref)
            .map(|output| LedgerUtxo::new(*utxo_ref, output.clone())))
    }
}

fn convert_output(output: OutputJson) -> Result<LedgerOutput, ContextError> {
    let mut ledger_output = LedgerOutput::new(output.address, 0);

    for amount in &output.amount {
        let quantity = amount.quantity.value()?;
        if amount.unit == LOVELACE {
            ledger_output.coin = quantity;
            continue;
        }
        let (policy, asset_name) = split_unit(&amount.unit)?;
        ledger_output = ledger_output.with_asset(policy, asset_name, quantity);
    }

    let inline_datum = non_empty(output.inline_datum);
    let data_hash = non_empty(output.data_hash);
    ledger_output.datum = match (inline_datum, data_hash) {
        (Some(datum), _) => Datum::Inline(
            hex::decode(&datum)
                .map_err(|e| ContextError::Snapshot(format!("inline datum: {e}")))?,
        ),
        (None, Some(hash)) => Datum::Hash(
            parse_hash32(&hash).map_err(|e| ContextError::Snapshot(format!("data hash: {e}")))?,
        ),
        (None, None) => Datum::None,
    };

    Ok(ledger_output)
}

/// Split an asset unit into policy id and asset name bytes.
fn split_unit(unit: &str) -> Result<(PolicyId, Vec<u8>), ContextError> {
    if unit.len() < POLICY_HEX_LEN || !unit.is_char_boundary(POLICY_HEX_LEN) {
        return Err(ContextError::Snapshot(format!("asset unit too short: '{unit}'")));
    }
    let (policy_hex, name_hex) = unit.split_at(POLICY_HEX_LEN);

    let mut policy = [0u8; 28];
    hex::decode_to_slice(policy_hex, &mut policy)
        .map_err(|e| ContextError::Snapshot(format!("policy id '{policy_hex}': {e}")))?;
    let asset_name = hex::decode(name_hex)
        .map_err(|e| ContextError::Snapshot(format!("asset name '{name_hex}': {e}")))?;
    Ok((policy, asset_name))
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}
