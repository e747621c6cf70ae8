//! Evaluation context builder.
//!
//! Turns the spent inputs of a transaction into the `ResolvedUtxo` records
//! the module consumes. One record per input, in input order; the frame the
//! sandbox builds from them is positional, so order is load-bearing.

use tracing::trace;

use phase2_primitives::{encode_utxo_record, Assets, ResolvedUtxo, UtxoRef};

use crate::error::ContextError;
use crate::types::LedgerUtxo;
use crate::utxo_set::UtxoSet;

/// Resolve each of `inputs` against `utxos` and build its record.
///
/// Any input without a UTxO aborts the whole build with `MissingUtxo`.
pub fn build_context(inputs: &[UtxoRef], utxos: &UtxoSet) -> Result<Vec<ResolvedUtxo>, ContextError> {
    inputs
        .iter()
        .map(|input| {
            utxos
                .get(input)
                .map(resolved_utxo)
                .ok_or(ContextError::MissingUtxo(*input))
        })
        .collect()
}

/// Same as [`build_context`], then CBOR-encode every record.
pub fn build_records(inputs: &[UtxoRef], utxos: &UtxoSet) -> Result<Vec<Vec<u8>>, ContextError> {
    let records = build_context(inputs, utxos)?
        .iter()
        .map(encode_utxo_record)
        .collect::<Result<Vec<_>, _>>()?;
    trace!(records = records.len(), "encoded utxo records");
    Ok(records)
}

/// Convert a ledger UTxO into the module's record shape.
pub fn resolved_utxo(utxo: &LedgerUtxo) -> ResolvedUtxo {
    let output = &utxo.output;
    ResolvedUtxo {
        address: output.address.clone(),
        utxo_ref: utxo.utxo_ref,
        assets: asset_ledger(utxo),
        datum: output.datum.clone(),
        script_ref: output.script_ref.clone(),
    }
}

fn asset_ledger(utxo: &LedgerUtxo) -> Assets {
    let mut assets = Assets::from_coin(utxo.output.coin);
    for (policy, names) in &utxo.output.multiasset {
        for (name, quantity) in names {
            assets.insert_asset(policy, name, *quantity);
        }
    }
    assets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LedgerOutput;
    use phase2_primitives::{decode_utxo_record, Datum, ScriptRef, ScriptType, LOVELACE};

    fn sample_set() -> UtxoSet {
        UtxoSet::from_utxos(vec![
            LedgerUtxo::new(
                UtxoRef::new([0x01; 32], 0),
                LedgerOutput::new("addr_test1vpay", 3_000_000),
            ),
            LedgerUtxo::new(
                UtxoRef::new([0x02; 32], 1),
                LedgerOutput::new("addr_test1wscript", 2_000_000)
                    .with_asset([0x0a; 28], b"alpha".to_vec(), 10)
                    .with_asset([0x0a; 28], b"beta".to_vec(), 20)
                    .with_asset([0x0b; 28], Vec::new(), 1)
                    .with_datum(Datum::Inline(vec![0xd8, 0x79, 0x80]))
                    .with_script_ref(ScriptRef {
                        script_type: ScriptType::PlutusV2,
                        script: vec![0x4e, 0x4d, 0x01],
                    }),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_coin_only_ledger() {
        let set = sample_set();
        let records = build_context(&[UtxoRef::new([0x01; 32], 0)], &set).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.address, "addr_test1vpay");
        assert_eq!(record.assets.len(), 1);
        assert_eq!(record.assets.get(LOVELACE), Some(3_000_000));
        assert_eq!(record.datum, Datum::None);
        assert!(record.script_ref.is_none());
    }

    #[test]
    fn test_multiasset_ledger_keys() {
        let set = sample_set();
        let records = build_context(&[UtxoRef::new([0x02; 32], 1)], &set).unwrap();
        let assets = &records[0].assets;
        assert_eq!(assets.coin(), 2_000_000);
        assert_eq!(assets.len(), 4);

        let policy_a = "0a".repeat(28);
        assert_eq!(assets.get(&format!("{policy_a}{}", hex::encode("alpha"))), Some(10));
        assert_eq!(assets.get(&format!("{policy_a}{}", hex::encode("beta"))), Some(20));
        // empty asset name keys on the policy alone
        assert_eq!(assets.get(&"0b".repeat(28)), Some(1));
    }

    #[test]
    fn test_records_follow_input_order() {
        let set = sample_set();
        let inputs = [UtxoRef::new([0x02; 32], 1), UtxoRef::new([0x01; 32], 0)];
        let records = build_context(&inputs, &set).unwrap();
        let refs: Vec<UtxoRef> = records.iter().map(|r| r.utxo_ref).collect();
        assert_eq!(refs, inputs);
    }

    #[test]
    fn test_missing_input_aborts() {
        let set = sample_set();
        let missing = UtxoRef::new([0x01; 32], 1);
        let err = build_context(&[UtxoRef::new([0x01; 32], 0), missing], &set).unwrap_err();
        assert!(matches!(err, ContextError::MissingUtxo(r) if r == missing));
    }

    #[test]
    fn test_encoded_records_decode_back() {
        let set = sample_set();
        let inputs = [UtxoRef::new([0x02; 32], 1)];
        let encoded = build_records(&inputs, &set).unwrap();
        let decoded = decode_utxo_record(&encoded[0]).unwrap();
        assert_eq!(decoded, build_context(&inputs, &set).unwrap()[0]);
    }
}
