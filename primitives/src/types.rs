//! Core types shared by the context builder and the sandbox host.
//!
//! These mirror the plain records the evaluation module consumes: a UTxO
//! reference, the resolved output it points at, and the asset ledger.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CodecError;

/// 32-byte Blake2b-256 hash (transaction ids, datum hashes).
pub type Hash32 = [u8; 32];

/// 28-byte minting policy id.
pub type PolicyId = [u8; 28];

/// Asset ledger key reserved for the base coin.
pub const LOVELACE: &str = "lovelace";

/// Reference to a transaction output: `(transaction hash, output index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtxoRef {
    pub tx_hash: Hash32,
    pub index: u64,
}

impl UtxoRef {
    pub fn new(tx_hash: Hash32, index: u64) -> Self {
        Self { tx_hash, index }
    }

    /// Lowercase hex of the transaction hash.
    pub fn tx_hash_hex(&self) -> String {
        hex::encode(self.tx_hash)
    }
}

impl fmt::Display for UtxoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash_hex(), self.index)
    }
}

impl FromStr for UtxoRef {
    type Err = CodecError;

    /// Parse the `<hex>#<index>` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash, index) = s
            .split_once('#')
            .ok_or_else(|| CodecError::InvalidRecord(format!("utxo ref without '#': {s}")))?;
        let tx_hash = parse_hash32(hash)?;
        let index = index
            .parse::<u64>()
            .map_err(|e| CodecError::InvalidRecord(format!("utxo ref index '{index}': {e}")))?;
        Ok(Self { tx_hash, index })
    }
}

/// Parse a 32-byte hash from hex.
pub fn parse_hash32(s: &str) -> Result<Hash32, CodecError> {
    let bytes = hex::decode(s)
        .map_err(|e| CodecError::InvalidRecord(format!("hash '{s}': {e}")))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| CodecError::InvalidRecord(format!("hash has {} bytes, expected 32", b.len())))
}

/// Datum attached to an output. At most one form is ever present.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Datum {
    #[default]
    None,
    /// Datum referenced by its hash.
    Hash(Hash32),
    /// Serialized (CBOR) datum carried inline.
    Inline(Vec<u8>),
}

impl Datum {
    pub fn hash(&self) -> Option<&Hash32> {
        match self {
            Self::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn inline(&self) -> Option<&[u8]> {
        match self {
            Self::Inline(d) => Some(d),
            _ => None,
        }
    }
}

/// Language tag of a reference script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptType {
    Native,
    PlutusV1,
    PlutusV2,
    PlutusV3,
}

impl ScriptType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::PlutusV1 => "plutus_v1",
            Self::PlutusV2 => "plutus_v2",
            Self::PlutusV3 => "plutus_v3",
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "plutus_v1" => Ok(Self::PlutusV1),
            "plutus_v2" => Ok(Self::PlutusV2),
            "plutus_v3" => Ok(Self::PlutusV3),
            other => Err(CodecError::InvalidRecord(format!("unknown script type '{other}'"))),
        }
    }
}

/// Reference script carried by an output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRef {
    pub script_type: ScriptType,
    /// Serialized script bytes.
    pub script: Vec<u8>,
}

/// Asset ledger of an output: asset id -> quantity.
///
/// Keys are `lovelace` for the base coin and `policy_hex ++ asset_name_hex`
/// otherwise. `BTreeMap` keeps iteration (and therefore encoding) ordered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assets(BTreeMap<String, u64>);

impl Assets {
    /// A ledger holding only the base coin.
    pub fn from_coin(coin: u64) -> Self {
        let mut map = BTreeMap::new();
        map.insert(LOVELACE.to_string(), coin);
        Self(map)
    }

    /// Add a native asset under its concatenated identifier.
    pub fn insert_asset(&mut self, policy: &PolicyId, asset_name: &[u8], quantity: u64) {
        let mut id = hex::encode(policy);
        id.push_str(&hex::encode(asset_name));
        self.0.insert(id, quantity);
    }

    /// Insert a raw entry. Used by decoders that already hold the identifier.
    pub fn insert(&mut self, asset_id: String, quantity: u64) {
        self.0.insert(asset_id, quantity);
    }

    pub fn coin(&self) -> u64 {
        self.0.get(LOVELACE).copied().unwrap_or(0)
    }

    pub fn get(&self, asset_id: &str) -> Option<u64> {
        self.0.get(asset_id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// A transaction input resolved to the output it spends, in the shape the
/// evaluation module expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUtxo {
    /// Bech32 (or base58 for Byron) address string.
    pub address: String,
    pub utxo_ref: UtxoRef,
    pub assets: Assets,
    pub datum: Datum,
    pub script_ref: Option<ScriptRef>,
}

/// Input/output record pair the module produced for one resolved UTxO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedUtxo {
    pub input: Vec<u8>,
    pub output: Vec<u8>,
}

/// Execution units consumed by a failed evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Budget {
    pub mem: u64,
    pub cpu: u64,
}

/// Structured failure reported by the evaluation module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalFailure {
    pub error_type: String,
    pub budget: Budget,
    pub debug_trace: Vec<String>,
}

impl fmt::Display for EvalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (mem={}, cpu={})",
            self.error_type, self.budget.mem, self.budget.cpu
        )
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Serialized redeemers in evaluation order.
    Success(Vec<Vec<u8>>),
    Failure(EvalFailure),
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
