//! UTxO lookup abstraction.
//!
//! A `UtxoProvider` answers `(tx_hash, index) -> output | not found`. The
//! evaluator never walks a chain index itself; callers plug in whatever
//! source they have (a node query, an indexer, an offline snapshot).
//!
//! Implementations:
//! - [`UtxoSet`](crate::UtxoSet): immutable in-memory set
//! - [`UtxoSnapshot`](crate::UtxoSnapshot): offline JSON snapshot

use phase2_primitives::UtxoRef;

use crate::error::ContextError;
use crate::types::LedgerUtxo;

/// Source of resolved UTxOs.
pub trait UtxoProvider: Send + Sync {
    /// Look up the output at `utxo_ref`.
    ///
    /// Returns `Ok(None)` if the output is unknown to this provider.
    fn utxo(&self, utxo_ref: &UtxoRef) -> Result<Option<LedgerUtxo>, ContextError>;

    /// Check whether `utxo_ref` resolves.
    fn contains(&self, utxo_ref: &UtxoRef) -> Result<bool, ContextError> {
        Ok(self.utxo(utxo_ref)?.is_some())
    }
}
