//! Evaluator runtime: Wasmtime engine, module loading, and evaluation.
//!
//! An `Evaluator` owns one instantiated module for its whole life. Each
//! evaluation reuses that instance; the guest heap is shared between calls,
//! so `&mut self` serializes them. Independent evaluators share nothing and
//! may run on separate threads.

use std::sync::Arc;

use tracing::debug;
use wasmtime::{Config, Engine, Linker, Module, Store, StoreLimitsBuilder};
use wasmtime_wasi::preview1;
use wasmtime_wasi::WasiCtxBuilder;

use phase2_context::{
    build_records, resolve_inputs, transaction_inputs, LedgerUtxo, UtxoProvider, UtxoSet,
};
use phase2_primitives::{decode_verdict, encode_utxo_frame, Verdict};

use crate::bridge::{GuestBridge, GuestState};
use crate::config::{EvaluatorConfig, ModuleSource};
use crate::error::EvaluationError;
use crate::validation::{validate_module, EXPORT_EVAL};

/// Phase-two script evaluator backed by a sandboxed evaluation module.
pub struct Evaluator {
    bridge: GuestBridge,
    config: EvaluatorConfig,
}

impl Evaluator {
    /// Load, validate and instantiate the configured module.
    pub fn new(config: EvaluatorConfig) -> Result<Self, EvaluationError> {
        let bytes = load_module_bytes(&config.module)?;
        let engine = create_engine(&config)?;
        let module = Module::new(&engine, &bytes[..]).map_err(EvaluationError::InstantiationFailed)?;
        validate_module(&module)?;

        let mut wasi = WasiCtxBuilder::new();
        if config.inherit_stdio {
            wasi.inherit_stdout().inherit_stderr();
        }
        let limits = StoreLimitsBuilder::new()
            .memory_size(config.max_memory_bytes)
            .instances(1)
            .build();

        let mut store = Store::new(
            &engine,
            GuestState {
                wasi: wasi.build_p1(),
                limits,
            },
        );
        store.limiter(|state| &mut state.limits as &mut dyn wasmtime::ResourceLimiter);
        if let Some(fuel) = config.fuel_limit {
            store.set_fuel(fuel).map_err(EvaluationError::InstantiationFailed)?;
        }

        let mut linker: Linker<GuestState> = Linker::new(&engine);
        preview1::add_to_linker_sync(&mut linker, |state: &mut GuestState| &mut state.wasi)
            .map_err(EvaluationError::InstantiationFailed)?;
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(EvaluationError::InstantiationFailed)?;

        let mut bridge = GuestBridge::new(store, &instance, config.fuel_limit)?;
        bridge.initialize(&instance)?;

        debug!(
            module_bytes = bytes.len(),
            fuel_limit = ?config.fuel_limit,
            "evaluation module instantiated"
        );
        Ok(Self { bridge, config })
    }

    /// Evaluate the scripts of `tx_bytes` against the resolved inputs.
    ///
    /// Returns the serialized redeemers in evaluation order. A script
    /// failure is `ScriptEvaluationFailed`; see [`Self::verdict`] to get it
    /// as a value instead.
    pub fn evaluate(
        &mut self,
        tx_bytes: &[u8],
        utxos: &[LedgerUtxo],
    ) -> Result<Vec<Vec<u8>>, EvaluationError> {
        match self.verdict(tx_bytes, utxos)? {
            Verdict::Success(redeemers) => Ok(redeemers),
            Verdict::Failure(failure) => Err(EvaluationError::ScriptEvaluationFailed(failure)),
        }
    }

    /// Resolve the inputs of `tx_bytes` through `provider`, then evaluate.
    pub fn evaluate_with_provider(
        &mut self,
        tx_bytes: &[u8],
        provider: &dyn UtxoProvider,
    ) -> Result<Vec<Vec<u8>>, EvaluationError> {
        let utxos = resolve_inputs(tx_bytes, provider)?;
        self.evaluate(tx_bytes, &utxos)
    }

    /// Run one evaluation and return the decoded verdict.
    pub fn verdict(
        &mut self,
        tx_bytes: &[u8],
        utxos: &[LedgerUtxo],
    ) -> Result<Verdict, EvaluationError> {
        // 1. Inputs in body order
        let inputs = transaction_inputs(tx_bytes)?;

        // 2. Keyed set for this call only, then one record per input
        let utxo_set = UtxoSet::from_utxos(utxos.iter().cloned())?;
        let records = build_records(&inputs, &utxo_set)?;

        // 3. Module-specific input/output encodings, framed positionally
        let encoded = records
            .iter()
            .map(|record| self.bridge.encode_utxo(record))
            .collect::<Result<Vec<_>, _>>()?;
        let frame = encode_utxo_frame(&encoded);
        debug!(
            inputs = inputs.len(),
            tx_len = tx_bytes.len(),
            frame_len = frame.len(),
            "evaluating transaction"
        );

        // 4. Write arguments, call, copy the result out
        let raw = {
            let mut scope = self.bridge.scope();
            let tx = scope.write_buffer(tx_bytes)?;
            let frame = scope.write_buffer(&frame)?;
            let cost_models = scope.write_buffer(&self.config.cost_models)?;
            let args = [
                u64::from(tx.ptr),
                u64::from(tx.len),
                u64::from(frame.ptr),
                u64::from(frame.len),
                u64::from(cost_models.ptr),
                u64::from(cost_models.len),
                self.config.max_tx_ex_steps,
                self.config.max_tx_ex_mem,
                self.config.zero_time,
                self.config.zero_slot,
                self.config.slot_length,
            ];
            scope.call_for_bytes(EXPORT_EVAL, &args)?
        };

        // 5. Decode
        if raw.is_empty() {
            return Err(EvaluationError::EmptyEvaluationResult);
        }
        let verdict = decode_verdict(&raw).map_err(EvaluationError::ResultDecodeFailed)?;
        debug!(
            success = verdict.is_success(),
            result_len = raw.len(),
            "evaluation finished"
        );
        Ok(verdict)
    }

    /// Release the module instance. The evaluator cannot be used afterwards.
    ///
    /// Dropping the bridge drops its store, which frees the instance, its
    /// linear memory and the WASI context exactly once.
    pub fn close(self) {
        debug!(
            dealloc_failures = self.bridge.dealloc_failures(),
            "closing evaluator"
        );
        drop(self.bridge);
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Guest regions currently held by the bridge. Zero between calls.
    pub fn live_allocations(&self) -> usize {
        self.bridge.live_allocations()
    }

    /// Guest deallocations that have failed so far.
    pub fn dealloc_failures(&self) -> u64 {
        self.bridge.dealloc_failures()
    }
}

fn load_module_bytes(source: &ModuleSource) -> Result<Arc<[u8]>, EvaluationError> {
    let bytes: Arc<[u8]> = match source {
        ModuleSource::Bytes(bytes) => Arc::clone(bytes),
        ModuleSource::File(path) => std::fs::read(path)
            .map_err(|source| EvaluationError::ModuleIo {
                path: path.clone(),
                source,
            })?
            .into(),
    };
    if bytes.is_empty() {
        return Err(EvaluationError::Validation("no evaluation module configured".into()));
    }
    Ok(bytes)
}

/// Create a Wasmtime engine with deterministic configuration.
fn create_engine(config: &EvaluatorConfig) -> Result<Engine, EvaluationError> {
    let mut wasm_config = Config::new();

    // Fuel metering only when a limit is configured
    wasm_config.consume_fuel(config.fuel_limit.is_some());

    // Determinism enforcement
    wasm_config.wasm_threads(false);
    wasm_config.wasm_simd(false);
    wasm_config.wasm_relaxed_simd(false);
    wasm_config.wasm_multi_memory(false);
    wasm_config.cranelift_nan_canonicalization(true);

    Engine::new(&wasm_config).map_err(EvaluationError::InstantiationFailed)
}
