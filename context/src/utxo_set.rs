//! Immutable keyed set of resolved UTxOs.
//!
//! `UtxoSet` is built once per evaluation from the caller's resolved list
//! and dropped afterwards. A `BTreeMap` keeps iteration deterministic.
//! Duplicate keys are rejected at construction instead of overwriting.

use std::collections::BTreeMap;

use phase2_primitives::UtxoRef;

use crate::error::ContextError;
use crate::provider::UtxoProvider;
use crate::types::LedgerUtxo;

/// Resolved UTxOs keyed by `(tx_hash, index)`.
#[derive(Debug, Clone, Default)]
pub struct UtxoSet {
    entries: BTreeMap<UtxoRef, LedgerUtxo>,
}

impl UtxoSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Build a set from resolved UTxOs.
    ///
    /// Returns `DuplicateUtxo` if two entries share a reference.
    pub fn from_utxos<I>(utxos: I) -> Result<Self, ContextError>
    where
        I: IntoIterator<Item = LedgerUtxo>,
    {
        let mut entries = BTreeMap::new();
        for utxo in utxos {
            let key = utxo.utxo_ref;
            if entries.insert(key, utxo).is_some() {
                return Err(ContextError::DuplicateUtxo(key));
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, utxo_ref: &UtxoRef) -> Option<&LedgerUtxo> {
        self.entries.get(utxo_ref)
    }

    /// Returns the number of entries in the set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerUtxo> {
        self.entries.values()
    }
}

impl UtxoProvider for UtxoSet {
    fn utxo(&self, utxo_ref: &UtxoRef) -> Result<Option<LedgerUtxo>, ContextError> {
        Ok(self.entries.get(utxo_ref).cloned())
    }

    fn contains(&self, utxo_ref: &UtxoRef) -> Result<bool, ContextError> {
        Ok(self.entries.contains_key(utxo_ref))
    }
}
