//! `phase2-sandbox`: Wasmtime host bridge for phase-two script evaluation.
//!
//! This crate loads a pre-compiled evaluation module, validates its ABI and
//! drives it through a narrow memory-based calling convention:
//!
//! - **Allocation protocol:** every guest buffer is acquired through the
//!   module's `alloc` and released through `dealloc` on every exit path
//! - **Packed results:** variable-length results come back as
//!   `ptr << 32 | len` and are copied out before release
//! - **Determinism:** no SIMD, no threads, NaN canonicalization
//! - **Limits:** bounded linear memory, optional fuel metering
//! - **Imports:** `wasi_snapshot_preview1` only, with no filesystem access
//!
//! The primary entry point is [`Evaluator::evaluate`].

pub mod error;
pub mod config;
pub mod memory;
pub mod validation;
mod bridge;
pub mod runtime;

pub use error::EvaluationError;
pub use config::{EvaluatorConfig, ModuleSource, SlotConfig};
pub use runtime::Evaluator;
