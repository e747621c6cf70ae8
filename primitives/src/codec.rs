//! Deterministic encodings that cross the host/guest boundary.
//!
//! Two formats live here:
//!
//! - The **UTxO record**: a CBOR map handed to `utxo_to_input_bytes` /
//!   `utxo_to_output_bytes`. Keys are text and always written in the same
//!   order; optional keys are omitted; asset keys are written in
//!   byte-lexicographic order; lengths are definite.
//! - The **UTxO frame**: the input/output record pairs passed to
//!   `eval_phase_two_raw` in one buffer. All integers are u64 little-endian:
//!
//! ```text
//! [count: 8] ( [in_len: 8] [in_bytes] [out_len: 8] [out_bytes] ) * count
//! ```
//!
//! Frame order is the order of inputs in the transaction body; the module
//! correlates entries with inputs by position.

use std::collections::BTreeMap;

use minicbor::{Decoder, Encoder};

use crate::error::CodecError;
use crate::types::{parse_hash32, Assets, Datum, EncodedUtxo, ResolvedUtxo, ScriptRef, UtxoRef};

const KEY_ADDRESS: &str = "address";
const KEY_TX_HASH: &str = "tx_hash";
const KEY_OUTPUT_INDEX: &str = "output_index";
const KEY_DATUM_HASH: &str = "datum_hash";
const KEY_DATUM: &str = "datum";
const KEY_SCRIPT_REF: &str = "script_ref";
const KEY_SCRIPT_TYPE: &str = "script_type";
const KEY_SCRIPT: &str = "script";
const KEY_ASSETS: &str = "assets";

// ── UTxO record ──

/// Encode a resolved UTxO into the CBOR record the module converts into
/// input/output bytes. Same input, same bytes.
pub fn encode_utxo_record(utxo: &ResolvedUtxo) -> Result<Vec<u8>, CodecError> {
    let fields = 4
        + u64::from(!matches!(utxo.datum, Datum::None))
        + u64::from(utxo.script_ref.is_some());

    let mut e = Encoder::new(Vec::with_capacity(128 + 48 * utxo.assets.len()));
    e.map(fields)?;

    e.str(KEY_ADDRESS)?.str(&utxo.address)?;
    e.str(KEY_TX_HASH)?.str(&utxo.utxo_ref.tx_hash_hex())?;
    e.str(KEY_OUTPUT_INDEX)?.u64(utxo.utxo_ref.index)?;

    match &utxo.datum {
        Datum::None => {}
        Datum::Hash(hash) => {
            e.str(KEY_DATUM_HASH)?.str(&hex::encode(hash))?;
        }
        Datum::Inline(datum) => {
            e.str(KEY_DATUM)?.str(&hex::encode(datum))?;
        }
    }

    if let Some(script_ref) = &utxo.script_ref {
        e.str(KEY_SCRIPT_REF)?.map(2)?;
        e.str(KEY_SCRIPT_TYPE)?.str(script_ref.script_type.as_str())?;
        e.str(KEY_SCRIPT)?.str(&hex::encode(&script_ref.script))?;
    }

    e.str(KEY_ASSETS)?.map(utxo.assets.len() as u64)?;
    for (asset_id, quantity) in utxo.assets.iter() {
        e.str(asset_id)?.u64(quantity)?;
    }

    Ok(e.into_writer())
}

/// Decode a UTxO record produced by [`encode_utxo_record`].
///
/// Keys may appear in any order; unknown keys are skipped. A record carrying
/// both a datum hash and an inline datum is rejected.
pub fn decode_utxo_record(data: &[u8]) -> Result<ResolvedUtxo, CodecError> {
    let mut d = Decoder::new(data);
    let len = definite_map(&mut d)?;

    let mut address = None;
    let mut tx_hash = None;
    let mut index = None;
    let mut datum_hash = None;
    let mut inline_datum = None;
    let mut script_ref = None;
    let mut assets = None;

    for _ in 0..len {
        match d.str()? {
            KEY_ADDRESS => address = Some(d.str()?.to_string()),
            KEY_TX_HASH => tx_hash = Some(parse_hash32(d.str()?)?),
            KEY_OUTPUT_INDEX => index = Some(d.u64()?),
            KEY_DATUM_HASH => datum_hash = Some(parse_hash32(d.str()?)?),
            KEY_DATUM => inline_datum = Some(decode_hex(d.str()?)?),
            KEY_SCRIPT_REF => script_ref = Some(decode_script_ref(&mut d)?),
            KEY_ASSETS => assets = Some(decode_assets(&mut d)?),
            _ => d.skip()?,
        }
    }
    ensure_consumed(&d, data)?;

    let datum = match (datum_hash, inline_datum) {
        (Some(_), Some(_)) => {
            return Err(CodecError::InvalidRecord(
                "record carries both datum_hash and datum".into(),
            ))
        }
        (Some(hash), None) => Datum::Hash(hash),
        (None, Some(datum)) => Datum::Inline(datum),
        (None, None) => Datum::None,
    };

    Ok(ResolvedUtxo {
        address: address.ok_or_else(|| missing(KEY_ADDRESS))?,
        utxo_ref: UtxoRef::new(
            tx_hash.ok_or_else(|| missing(KEY_TX_HASH))?,
            index.ok_or_else(|| missing(KEY_OUTPUT_INDEX))?,
        ),
        assets: assets.ok_or_else(|| missing(KEY_ASSETS))?,
        datum,
        script_ref,
    })
}

fn decode_script_ref(d: &mut Decoder<'_>) -> Result<ScriptRef, CodecError> {
    let len = definite_map(d)?;
    let mut script_type = None;
    let mut script = None;
    for _ in 0..len {
        match d.str()? {
            KEY_SCRIPT_TYPE => script_type = Some(d.str()?.parse()?),
            KEY_SCRIPT => script = Some(decode_hex(d.str()?)?),
            _ => d.skip()?,
        }
    }
    Ok(ScriptRef {
        script_type: script_type.ok_or_else(|| missing(KEY_SCRIPT_TYPE))?,
        script: script.ok_or_else(|| missing(KEY_SCRIPT))?,
    })
}

fn decode_assets(d: &mut Decoder<'_>) -> Result<Assets, CodecError> {
    let len = definite_map(d)?;
    let mut entries = BTreeMap::new();
    for _ in 0..len {
        let id = d.str()?.to_string();
        let quantity = d.u64()?;
        if entries.insert(id.clone(), quantity).is_some() {
            return Err(CodecError::InvalidRecord(format!("duplicate asset '{id}'")));
        }
    }
    let mut assets = Assets::default();
    for (id, quantity) in entries {
        assets.insert(id, quantity);
    }
    Ok(assets)
}

// ── UTxO frame ──

/// Frame the record pairs of every transaction input into one buffer.
pub fn encode_utxo_frame(records: &[EncodedUtxo]) -> Vec<u8> {
    let body: usize = records
        .iter()
        .map(|r| 16 + r.input.len() + r.output.len())
        .sum();
    let mut buf = Vec::with_capacity(8 + body);

    write_u64(&mut buf, records.len() as u64);
    for record in records {
        write_var_bytes(&mut buf, &record.input);
        write_var_bytes(&mut buf, &record.output);
    }
    buf
}

/// Parse a frame back into its record pairs. Rejects truncation and
/// trailing bytes.
pub fn decode_utxo_frame(data: &[u8]) -> Result<Vec<EncodedUtxo>, CodecError> {
    let mut r = Reader::new(data);
    let count = r.read_u64()?;
    // Each entry needs at least its two length words.
    if count > (r.remaining() / 16) as u64 {
        return Err(CodecError::InvalidFrame(format!(
            "count {count} exceeds frame size {}",
            data.len()
        )));
    }

    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let input = r.read_var_bytes()?.to_vec();
        let output = r.read_var_bytes()?.to_vec();
        records.push(EncodedUtxo { input, output });
    }

    if r.remaining() != 0 {
        return Err(CodecError::TrailingBytes(r.remaining()));
    }
    Ok(records)
}

/// A cursor over frame bytes.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if n > self.remaining() {
            return Err(CodecError::InvalidFrame(format!(
                "need {n} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u64(&mut self) -> Result<u64, CodecError> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    fn read_var_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_u64()?;
        let len = usize::try_from(len)
            .map_err(|_| CodecError::InvalidFrame(format!("length {len} overflows usize")))?;
        self.read_bytes(len)
    }
}

fn write_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_var_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_u64(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

// ── CBOR helpers shared with the verdict decoder ──

pub(crate) fn definite_map(d: &mut Decoder<'_>) -> Result<u64, CodecError> {
    d.map()?
        .ok_or_else(|| CodecError::InvalidRecord("indefinite-length map".into()))
}

pub(crate) fn ensure_consumed(d: &Decoder<'_>, data: &[u8]) -> Result<(), CodecError> {
    match data.len() - d.position() {
        0 => Ok(()),
        n => Err(CodecError::TrailingBytes(n)),
    }
}

pub(crate) fn missing(key: &str) -> CodecError {
    CodecError::InvalidRecord(format!("missing key '{key}'"))
}

fn decode_hex(s: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(s).map_err(|e| CodecError::InvalidRecord(format!("hex field: {e}")))
}
