//! Transaction input extraction.
//!
//! Only the spent inputs matter to the frame; their order is the order the
//! transaction body declares them in, which is also the order the module
//! walks them in.

use pallas_traverse::MultiEraTx;
use tracing::trace;

use phase2_primitives::{Hash32, UtxoRef};

use crate::error::ContextError;
use crate::provider::UtxoProvider;
use crate::types::LedgerUtxo;

/// Decode `tx_bytes` and return the spent inputs in body order.
pub fn transaction_inputs(tx_bytes: &[u8]) -> Result<Vec<UtxoRef>, ContextError> {
    let tx = MultiEraTx::decode(tx_bytes)
        .map_err(|e| ContextError::MalformedTransaction(e.to_string()))?;

    let inputs: Vec<UtxoRef> = tx
        .inputs()
        .iter()
        .map(|input| {
            let oref = input.output_ref();
            let tx_hash: Hash32 = **oref.hash();
            UtxoRef::new(tx_hash, oref.index())
        })
        .collect();

    trace!(era = ?tx.era(), inputs = inputs.len(), "decoded transaction inputs");
    Ok(inputs)
}

/// Resolve every input of `tx_bytes` through `provider`, in body order.
///
/// Fails with `MissingUtxo` on the first input the provider does not know.
pub fn resolve_inputs(
    tx_bytes: &[u8],
    provider: &dyn UtxoProvider,
) -> Result<Vec<LedgerUtxo>, ContextError> {
    transaction_inputs(tx_bytes)?
        .into_iter()
        .map(|utxo_ref| {
            provider
                .utxo(&utxo_ref)?
                .ok_or(ContextError::MissingUtxo(utxo_ref))
        })
        .collect()
}
