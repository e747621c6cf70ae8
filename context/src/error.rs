//! Context building errors.

use phase2_primitives::{CodecError, UtxoRef};

/// Error raised while resolving inputs or building an evaluation context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Transaction bytes could not be decoded.
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    /// A transaction input has no resolved UTxO.
    #[error("missing UTxO for input {0}")]
    MissingUtxo(UtxoRef),

    /// The same `(tx_hash, index)` appears twice in one resolved set.
    #[error("duplicate UTxO {0} in resolved set")]
    DuplicateUtxo(UtxoRef),

    /// The offline UTxO snapshot could not be parsed.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// A UTxO provider failed for a reason other than absence.
    #[error("lookup of {utxo_ref} failed: {reason}")]
    Lookup { utxo_ref: UtxoRef, reason: String },

    /// Record encoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl From<serde_json::Error> for ContextError {
    fn from(e: serde_json::Error) -> Self {
        Self::Snapshot(e.to_string())
    }
}
