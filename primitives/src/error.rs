//! Codec error type.

/// Error raised while encoding UTxO records or decoding module output.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// CBOR encoder failed.
    #[error("cbor encode error: {0}")]
    Encode(String),

    /// CBOR payload is malformed.
    #[error("cbor decode error: {0}")]
    Decode(#[from] minicbor::decode::Error),

    /// Raw evaluation result carried no tag byte.
    #[error("empty evaluation result")]
    EmptyResult,

    /// Structurally valid CBOR that does not describe the expected record.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// UTxO frame is truncated or carries trailing bytes.
    #[error("invalid utxo frame: {0}")]
    InvalidFrame(String),

    /// Bytes left over after the expected payload.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for CodecError {
    fn from(e: minicbor::encode::Error<E>) -> Self {
        Self::Encode(e.to_string())
    }
}
