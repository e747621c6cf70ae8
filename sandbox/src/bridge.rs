//! Guest memory bridge: the allocate / write / call / read / deallocate
//! protocol against the module's linear memory.
//!
//! Raw pointers never leave this module. Callers work through an
//! [`AllocationScope`], which records every region it acquires (buffers it
//! writes and result buffers the guest hands back) and releases all of
//! them when dropped, on success and error paths alike.
//!
//! Release failures do not propagate: by the time a region is released its
//! contents have been copied to host memory. They are logged and counted.

use tracing::{trace, warn};
use wasmtime::{Func, Instance, Memory, Store, StoreLimits, Trap, Val, ValType};
use wasmtime_wasi::preview1::WasiP1Ctx;
use wasmtime_wasi::I32Exit;

use phase2_primitives::EncodedUtxo;

use crate::error::EvaluationError;
use crate::memory::{self, GuestRegion, OutOfBounds};
use crate::validation::{
    EXPORT_ALLOC, EXPORT_DEALLOC, EXPORT_EVAL, EXPORT_MEMORY, EXPORT_UTXO_TO_INPUT,
    EXPORT_UTXO_TO_OUTPUT,
};

/// Per-store host state: WASI context and resource limits.
pub(crate) struct GuestState {
    pub(crate) wasi: WasiP1Ctx,
    pub(crate) limits: StoreLimits,
}

/// Exclusive handle on one instantiated evaluation module.
pub(crate) struct GuestBridge {
    store: Store<GuestState>,
    memory: Memory,
    alloc: Func,
    dealloc: Func,
    utxo_to_input: Func,
    utxo_to_output: Func,
    eval: Func,
    fuel_limit: Option<u64>,
    /// Regions acquired and not yet released.
    live: usize,
    dealloc_failures: u64,
}

impl GuestBridge {
    /// Resolve the ABI exports of `instance`.
    pub(crate) fn new(
        mut store: Store<GuestState>,
        instance: &Instance,
        fuel_limit: Option<u64>,
    ) -> Result<Self, EvaluationError> {
        let memory = instance
            .get_memory(&mut store, EXPORT_MEMORY)
            .ok_or_else(|| EvaluationError::Validation(format!("no '{EXPORT_MEMORY}' export")))?;

        let mut func = |name: &str| {
            instance
                .get_func(&mut store, name)
                .ok_or_else(|| EvaluationError::Validation(format!("missing required export: {name}")))
        };
        let alloc = func(EXPORT_ALLOC)?;
        let dealloc = func(EXPORT_DEALLOC)?;
        let utxo_to_input = func(EXPORT_UTXO_TO_INPUT)?;
        let utxo_to_output = func(EXPORT_UTXO_TO_OUTPUT)?;
        let eval = func(EXPORT_EVAL)?;

        Ok(Self {
            store,
            memory,
            alloc,
            dealloc,
            utxo_to_input,
            utxo_to_output,
            eval,
            fuel_limit,
            live: 0,
            dealloc_failures: 0,
        })
    }

    /// Run the module's start routine, if it has one.
    ///
    /// Reactors export `_initialize`. Commands export `_start`, which may end
    /// with `proc_exit(0)`; that exit is not an error.
    pub(crate) fn initialize(&mut self, instance: &Instance) -> Result<(), EvaluationError> {
        for name in ["_initialize", "_start"] {
            let Some(start) = instance.get_func(&mut self.store, name) else {
                continue;
            };
            self.refuel(name)?;
            let result = start.call(&mut self.store, &[], &mut []);
            return match result {
                Ok(()) => Ok(()),
                Err(e) if matches!(e.downcast_ref::<I32Exit>(), Some(I32Exit(0))) => Ok(()),
                Err(e) => Err(EvaluationError::InstantiationFailed(
                    e.context(format!("module '{name}' failed")),
                )),
            };
        }
        Ok(())
    }

    /// Open a scope whose allocations are released when it drops.
    pub(crate) fn scope(&mut self) -> AllocationScope<'_> {
        AllocationScope {
            bridge: self,
            regions: Vec::new(),
        }
    }

    /// Encode one UTxO record into its input and output forms.
    pub(crate) fn encode_utxo(&mut self, record: &[u8]) -> Result<EncodedUtxo, EvaluationError> {
        let mut scope = self.scope();
        let arg = scope.write_buffer(record)?;
        let args = [u64::from(arg.ptr), u64::from(arg.len)];
        let input = scope.call_for_bytes(EXPORT_UTXO_TO_INPUT, &args)?;
        let output = scope.call_for_bytes(EXPORT_UTXO_TO_OUTPUT, &args)?;
        Ok(EncodedUtxo { input, output })
    }

    pub(crate) fn live_allocations(&self) -> usize {
        self.live
    }

    pub(crate) fn dealloc_failures(&self) -> u64 {
        self.dealloc_failures
    }

    /// Request `size` bytes from the guest allocator.
    fn allocate(&mut self, size: usize) -> Result<GuestRegion, EvaluationError> {
        let failed = || EvaluationError::AllocationFailed { size: size as u64 };
        let len = u32::try_from(size).map_err(|_| failed())?;

        let ptr = match self.call(EXPORT_ALLOC, &[size as u64]) {
            Ok(ptr) => ptr.ok_or_else(failed)?,
            Err(e) => {
                warn!(size, error = %e, "guest alloc failed");
                return Err(failed());
            }
        };
        let ptr = u32::try_from(ptr).map_err(|_| failed())?;
        if ptr == 0 {
            return Err(failed());
        }

        self.live += 1;
        trace!(ptr, size, "guest alloc");
        Ok(GuestRegion::new(ptr, len))
    }

    fn write(&mut self, ptr: u32, data: &[u8]) -> Result<(), EvaluationError> {
        let mem = self.memory.data_mut(&mut self.store);
        memory::write_bytes(mem, ptr, data).map_err(
            |OutOfBounds { ptr, len, memory_size }| EvaluationError::MemoryWriteFailed {
                ptr,
                len,
                memory_size,
            },
        )
    }

    fn read(&self, region: GuestRegion) -> Result<Vec<u8>, EvaluationError> {
        let mem = self.memory.data(&self.store);
        // a null pointer only ever carries an empty result
        if region.ptr == 0 && region.len > 0 {
            return Err(EvaluationError::MemoryReadFailed {
                ptr: region.ptr,
                len: region.len as usize,
                memory_size: mem.len(),
            });
        }
        memory::read_bytes(mem, region.ptr, region.len).map_err(
            |OutOfBounds { ptr, len, memory_size }| EvaluationError::MemoryReadFailed {
                ptr,
                len,
                memory_size,
            },
        )
    }

    /// Release `region`. Never fails; failures are logged and counted.
    fn deallocate(&mut self, region: GuestRegion) {
        self.live = self.live.saturating_sub(1);
        let args = [u64::from(region.ptr), u64::from(region.len)];
        match self.call(EXPORT_DEALLOC, &args) {
            Ok(_) => trace!(%region, "guest dealloc"),
            Err(e) => {
                self.dealloc_failures += 1;
                warn!(%region, error = %e, "guest dealloc failed");
            }
        }
    }

    fn export(&self, name: &'static str) -> Func {
        match name {
            EXPORT_ALLOC => self.alloc,
            EXPORT_DEALLOC => self.dealloc,
            EXPORT_UTXO_TO_INPUT => self.utxo_to_input,
            EXPORT_UTXO_TO_OUTPUT => self.utxo_to_output,
            _ => self.eval,
        }
    }

    /// Call an export with unsigned scalar arguments.
    ///
    /// Each argument is narrowed or widened to the declared parameter type;
    /// the single result (if any) is zero-extended back to `u64`.
    fn call(&mut self, export: &'static str, args: &[u64]) -> Result<Option<u64>, EvaluationError> {
        let func = self.export(export);
        let ty = func.ty(&self.store);

        let params = ty
            .params()
            .zip(args)
            .enumerate()
            .map(|(i, (vt, &arg))| match vt {
                ValType::I32 => u32::try_from(arg)
                    .map(|v| Val::I32(v as i32))
                    .map_err(|_| EvaluationError::CallFailed {
                        export,
                        reason: format!("argument {i} ({arg}) does not fit i32"),
                    }),
                _ => Ok(Val::I64(arg as i64)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut results = vec![Val::I64(0); ty.results().len()];

        self.refuel(export)?;
        func.call(&mut self.store, &params, &mut results)
            .map_err(|e| call_failed(export, e))?;

        Ok(results.first().and_then(|v| match v {
            Val::I32(x) => Some(u64::from(*x as u32)),
            Val::I64(x) => Some(*x as u64),
            _ => None,
        }))
    }

    /// Call an export that returns a packed region.
    fn call_packed(&mut self, export: &'static str, args: &[u64]) -> Result<GuestRegion, EvaluationError> {
        let packed = self.call(export, args)?.ok_or_else(|| EvaluationError::CallFailed {
            export,
            reason: "no result".into(),
        })?;
        Ok(GuestRegion::from_packed(packed))
    }

    /// Reset the fuel budget before a guest call.
    fn refuel(&mut self, export: &'static str) -> Result<(), EvaluationError> {
        if let Some(fuel) = self.fuel_limit {
            self.store.set_fuel(fuel).map_err(|e| EvaluationError::CallFailed {
                export,
                reason: format!("setting fuel: {e}"),
            })?;
        }
        Ok(())
    }
}

/// Convert a failed guest call into `CallFailed`.
fn call_failed(export: &'static str, e: anyhow::Error) -> EvaluationError {
    let reason = if let Some(Trap::OutOfFuel) = e.downcast_ref::<Trap>() {
        "fuel exhausted (instruction limit)".to_string()
    } else if let Some(I32Exit(code)) = e.downcast_ref::<I32Exit>() {
        format!("guest exited with code {code}")
    } else {
        format!("{e:#}")
    };
    EvaluationError::CallFailed { export, reason }
}

/// Guard over guest regions acquired during one operation.
///
/// Dropping the scope deallocates every region, most recent first.
pub(crate) struct AllocationScope<'b> {
    bridge: &'b mut GuestBridge,
    regions: Vec<GuestRegion>,
}

impl AllocationScope<'_> {
    /// Allocate a guest buffer, copy `data` into it and return its region.
    ///
    /// The region is owned by the scope from the moment it is allocated, so
    /// a failed write still releases it.
    pub(crate) fn write_buffer(&mut self, data: &[u8]) -> Result<GuestRegion, EvaluationError> {
        // zero-sized requests are ambiguous to guest allocators
        let region = self.bridge.allocate(data.len().max(1))?;
        self.regions.push(region);
        self.bridge.write(region.ptr, data)?;
        Ok(GuestRegion::new(region.ptr, data.len() as u32))
    }

    /// Call an export returning a packed region, copy the bytes out, and
    /// hold the region for release.
    pub(crate) fn call_for_bytes(
        &mut self,
        export: &'static str,
        args: &[u64],
    ) -> Result<Vec<u8>, EvaluationError> {
        let region = self.bridge.call_packed(export, args)?;
        trace!(export, %region, "guest returned region");
        if region.ptr != 0 {
            self.bridge.live += 1;
            self.regions.push(region);
        }
        self.bridge.read(region)
    }
}

impl Drop for AllocationScope<'_> {
    fn drop(&mut self) {
        while let Some(region) = self.regions.pop() {
            self.bridge.deallocate(region);
        }
    }
}
