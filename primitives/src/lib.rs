//! `phase2-primitives`: data model and byte formats for phase-two script
//! evaluation.
//!
//! This crate holds everything that is pure and deterministic about the
//! host/guest contract:
//!
//! - `ResolvedUtxo` and friends: the plain records handed to the module
//! - `codec`: the CBOR UTxO record and the u64-LE framed UTxO list
//! - `verdict`: decoding of the tagged result returned by the module
//! - `CodecError`: encoding/decoding failures
//!
//! No WASM runtime is involved here; see `phase2-sandbox` for the bridge.

pub mod types;
pub mod error;
pub mod codec;
pub mod verdict;

pub use types::{
    Assets, Budget, Datum, EncodedUtxo, EvalFailure, Hash32, PolicyId, ResolvedUtxo, ScriptRef,
    ScriptType, UtxoRef, Verdict, LOVELACE,
};
pub use error::CodecError;
pub use codec::{decode_utxo_frame, decode_utxo_record, encode_utxo_frame, encode_utxo_record};
pub use verdict::decode_verdict;
