//! Evaluation error taxonomy.

use std::path::PathBuf;

use phase2_context::ContextError;
use phase2_primitives::{CodecError, EvalFailure, UtxoRef};

/// Error returned by [`Evaluator`](crate::Evaluator).
///
/// Everything except `ScriptEvaluationFailed` is operational: the host, the
/// inputs or the module contract went wrong. `ScriptEvaluationFailed` is the
/// module's structured verdict that the scripts did not validate.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// Engine, compilation, linking or instantiation error.
    #[error("module instantiation failed: {0:#}")]
    InstantiationFailed(#[source] anyhow::Error),

    /// Module ABI check failed (missing exports, bad imports, etc.).
    #[error("module validation failed: {0}")]
    Validation(String),

    /// The module override path could not be read.
    #[error("failed to read module {path}: {source}")]
    ModuleIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("missing UTxO for input {0}")]
    MissingUtxo(UtxoRef),

    #[error("duplicate UTxO {0} in resolved set")]
    DuplicateUtxo(UtxoRef),

    /// Any other context building failure.
    #[error(transparent)]
    Context(ContextError),

    /// Host-side record encoding failed.
    #[error("encoding failed: {0}")]
    Codec(#[from] CodecError),

    /// Guest `alloc` returned no usable pointer.
    #[error("guest allocation of {size} bytes failed")]
    AllocationFailed { size: u64 },

    #[error("write of {len} bytes at {ptr:#x} outside guest memory ({memory_size} bytes)")]
    MemoryWriteFailed { ptr: u32, len: usize, memory_size: usize },

    #[error("read of {len} bytes at {ptr:#x} outside guest memory ({memory_size} bytes)")]
    MemoryReadFailed { ptr: u32, len: usize, memory_size: usize },

    /// Guest trap or invocation error in an exported function.
    #[error("call to '{export}' failed: {reason}")]
    CallFailed { export: &'static str, reason: String },

    #[error("evaluation returned an empty result")]
    EmptyEvaluationResult,

    /// The raw result's payload did not decode.
    #[error("evaluation result decode failed: {0}")]
    ResultDecodeFailed(#[source] CodecError),

    /// The scripts failed; carries the module's error type, budget and trace.
    #[error("script evaluation failed: {0}")]
    ScriptEvaluationFailed(EvalFailure),
}

impl EvaluationError {
    /// The structured failure, if this is a semantic script failure.
    pub fn script_failure(&self) -> Option<&EvalFailure> {
        match self {
            Self::ScriptEvaluationFailed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<ContextError> for EvaluationError {
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::MalformedTransaction(msg) => Self::MalformedTransaction(msg),
            ContextError::MissingUtxo(r) => Self::MissingUtxo(r),
            ContextError::DuplicateUtxo(r) => Self::DuplicateUtxo(r),
            ContextError::Codec(e) => Self::Codec(e),
            other => Self::Context(other),
        }
    }
}
