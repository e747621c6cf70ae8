//! Module ABI checks, run before instantiation.
//!
//! 1. `memory` is exported
//! 2. The five evaluation exports are functions with the expected arity
//! 3. Every parameter and result is an integer (`i32` or `i64`)
//! 4. Exports returning a packed region return `i64`
//! 5. Imports come only from `wasi_snapshot_preview1` and are functions

use wasmtime::{ExternType, FuncType, Module, ValType};

use crate::error::EvaluationError;

pub const EXPORT_MEMORY: &str = "memory";
pub const EXPORT_ALLOC: &str = "alloc";
pub const EXPORT_DEALLOC: &str = "dealloc";
pub const EXPORT_UTXO_TO_INPUT: &str = "utxo_to_input_bytes";
pub const EXPORT_UTXO_TO_OUTPUT: &str = "utxo_to_output_bytes";
pub const EXPORT_EVAL: &str = "eval_phase_two_raw";

/// Allowed import module name.
pub const WASI_MODULE: &str = "wasi_snapshot_preview1";

/// Required export: (name, param count, result count, result is a packed region).
const REQUIRED_EXPORTS: &[(&str, usize, usize, bool)] = &[
    (EXPORT_ALLOC, 1, 1, false),
    (EXPORT_DEALLOC, 2, 0, false),
    (EXPORT_UTXO_TO_INPUT, 2, 1, true),
    (EXPORT_UTXO_TO_OUTPUT, 2, 1, true),
    (EXPORT_EVAL, 11, 1, true),
];

fn is_int(vt: &ValType) -> bool {
    matches!(vt, ValType::I32 | ValType::I64)
}

/// Validate that a module implements the evaluation ABI.
pub fn validate_module(module: &Module) -> Result<(), EvaluationError> {
    validate_exports(module)?;
    validate_imports(module)?;
    Ok(())
}

fn validate_exports(module: &Module) -> Result<(), EvaluationError> {
    let has_memory = module
        .exports()
        .any(|e| e.name() == EXPORT_MEMORY && matches!(e.ty(), ExternType::Memory(_)));
    if !has_memory {
        return Err(EvaluationError::Validation(format!(
            "module must export '{EXPORT_MEMORY}'"
        )));
    }

    for &(name, param_count, result_count, packed) in REQUIRED_EXPORTS {
        let export = module
            .exports()
            .find(|e| e.name() == name)
            .ok_or_else(|| EvaluationError::Validation(format!("missing required export: {name}")))?;

        let ExternType::Func(func_ty) = export.ty() else {
            return Err(EvaluationError::Validation(format!(
                "export '{name}' must be a function"
            )));
        };
        check_signature(name, &func_ty, param_count, result_count, packed)?;
    }

    Ok(())
}

fn check_signature(
    name: &str,
    func_ty: &FuncType,
    param_count: usize,
    result_count: usize,
    packed: bool,
) -> Result<(), EvaluationError> {
    let params: Vec<ValType> = func_ty.params().collect();
    let results: Vec<ValType> = func_ty.results().collect();

    if params.len() != param_count || !params.iter().all(is_int) {
        return Err(EvaluationError::Validation(format!(
            "export '{name}' has wrong param signature: expected {param_count} integer params, got {:?}",
            params
        )));
    }
    if results.len() != result_count || !results.iter().all(is_int) {
        return Err(EvaluationError::Validation(format!(
            "export '{name}' has wrong result signature: expected {result_count} integer results, got {:?}",
            results
        )));
    }
    // a packed (ptr << 32 | len) value does not fit an i32
    if packed && !matches!(results.first(), Some(ValType::I64)) {
        return Err(EvaluationError::Validation(format!(
            "export '{name}' must return i64 (packed pointer and length)"
        )));
    }
    Ok(())
}

fn validate_imports(module: &Module) -> Result<(), EvaluationError> {
    for import in module.imports() {
        let module_name = import.module();

        if module_name != WASI_MODULE {
            return Err(EvaluationError::Validation(format!(
                "import from unknown module '{}' (only '{}' allowed): {}",
                module_name,
                WASI_MODULE,
                import.name()
            )));
        }

        if !matches!(import.ty(), ExternType::Func(_)) {
            return Err(EvaluationError::Validation(format!(
                "non-function import not allowed: {}::{}",
                module_name,
                import.name()
            )));
        }
    }

    Ok(())
}
