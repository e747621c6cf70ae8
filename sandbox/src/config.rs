//! Evaluator configuration.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

/// Where the evaluation module's bytes come from.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleSource {
    /// Module bytes (binary `.wasm` or text `.wat`) supplied by the caller.
    #[serde(skip)]
    Bytes(Arc<[u8]>),
    /// Path to a module file, read once when the evaluator is built.
    File(PathBuf),
}

impl ModuleSource {
    /// Wrap a binary compiled into the host, e.g. via `include_bytes!`.
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Self::Bytes(Arc::from(bytes))
    }
}

impl fmt::Debug for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl Default for ModuleSource {
    fn default() -> Self {
        Self::Bytes(Arc::from(Vec::new()))
    }
}

impl From<Vec<u8>> for ModuleSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Arc::from(bytes))
    }
}

impl From<PathBuf> for ModuleSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

/// Chain time reference: maps POSIX milliseconds to slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SlotConfig {
    /// POSIX time (ms) of `zero_slot`.
    pub zero_time: u64,
    pub zero_slot: u64,
    /// Slot length in milliseconds.
    pub slot_length: u64,
}

impl SlotConfig {
    pub const fn mainnet() -> Self {
        Self {
            zero_time: 1_596_059_091_000,
            zero_slot: 4_492_800,
            slot_length: 1_000,
        }
    }

    pub const fn preview() -> Self {
        Self {
            zero_time: 1_666_656_000_000,
            zero_slot: 0,
            slot_length: 1_000,
        }
    }

    pub const fn preprod() -> Self {
        Self {
            zero_time: 1_655_769_600_000,
            zero_slot: 86_400,
            slot_length: 1_000,
        }
    }
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// Configuration for an [`Evaluator`](crate::Evaluator).
///
/// Fixed for the evaluator's lifetime: every evaluation passes the same
/// cost models, budget and time reference to the module.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub module: ModuleSource,

    /// Serialized cost models, passed to the module verbatim.
    #[serde(with = "hex::serde")]
    pub cost_models: Vec<u8>,

    /// Per-transaction execution step budget.
    pub max_tx_ex_steps: u64,

    /// Per-transaction execution memory budget.
    pub max_tx_ex_mem: u64,

    pub zero_time: u64,
    pub zero_slot: u64,
    pub slot_length: u64,

    /// Upper bound on guest linear memory, in bytes.
    /// Default: 512 MiB.
    pub max_memory_bytes: usize,

    /// Wasmtime fuel per guest call. `None` disables fuel metering; the
    /// module's own step budget then bounds execution.
    pub fuel_limit: Option<u64>,

    /// Forward guest stdout/stderr to the host process.
    pub inherit_stdio: bool,
}

impl EvaluatorConfig {
    /// Default budget and mainnet time reference for `module`.
    pub fn new(module: impl Into<ModuleSource>) -> Self {
        Self {
            module: module.into(),
            ..Self::default()
        }
    }

    pub fn with_cost_models(mut self, cost_models: impl Into<Vec<u8>>) -> Self {
        self.cost_models = cost_models.into();
        self
    }

    pub fn with_slot_config(mut self, slot: SlotConfig) -> Self {
        self.zero_time = slot.zero_time;
        self.zero_slot = slot.zero_slot;
        self.slot_length = slot.slot_length;
        self
    }

    pub fn slot_config(&self) -> SlotConfig {
        SlotConfig {
            zero_time: self.zero_time,
            zero_slot: self.zero_slot,
            slot_length: self.slot_length,
        }
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        let slot = SlotConfig::mainnet();
        Self {
            module: ModuleSource::default(),
            cost_models: Vec::new(),
            max_tx_ex_steps: 10_000_000_000,
            max_tx_ex_mem: 14_000_000,
            zero_time: slot.zero_time,
            zero_slot: slot.zero_slot,
            slot_length: slot.slot_length,
            max_memory_bytes: 512 * 1024 * 1024,
            fuel_limit: None,
            inherit_stdio: true,
        }
    }
}
