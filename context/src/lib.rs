//! `phase2-context`: resolving transaction inputs into evaluation records.
//!
//! - [`transaction_inputs`]: spent inputs of a transaction, in body order
//! - [`UtxoProvider`]: lookup seam for any UTxO source
//! - [`UtxoSet`]: immutable keyed set built once per evaluation
//! - [`UtxoSnapshot`]: offline JSON snapshot
//! - [`build_context`]: `ResolvedUtxo` records ready for the codec

pub mod types;
pub mod error;
pub mod provider;
pub mod utxo_set;
pub mod snapshot;
pub mod transaction;
pub mod builder;

pub use types::{LedgerOutput, LedgerUtxo, MultiAsset};
pub use error::ContextError;
pub use provider::UtxoProvider;
pub use utxo_set::UtxoSet;
pub use snapshot::UtxoSnapshot;
pub use transaction::{resolve_inputs, transaction_inputs};
pub use builder::{build_context, build_records, resolved_utxo};
