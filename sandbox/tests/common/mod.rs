//! Shared test helpers for integration tests.
//!
//! Provides WAT guest modules implementing the evaluation ABI, minimal
//! Conway transactions, canned verdict payloads and evaluator factories.

#![allow(dead_code)]

use minicbor::Encoder;
use tracing_subscriber::EnvFilter;

use phase2_context::{LedgerOutput, LedgerUtxo};
use phase2_primitives::UtxoRef;
use phase2_sandbox::{Evaluator, EvaluatorConfig};

/// Base of the guest bump heap. Everything below is scratch and data.
pub const HEAP_BASE: u32 = 4096;

// ── Guest Modules ──

/// Bump allocator: 8-byte aligned, counts live regions, rewinds when empty.
pub const ALLOC_BUMP: &str = r#"
    (local.set $ptr (global.get $heap))
    (global.set $heap
      (i32.and
        (i32.add (i32.add (local.get $ptr) (i32.wrap_i64 (local.get $size))) (i32.const 7))
        (i32.const -8)))
    (global.set $live (i32.add (global.get $live) (i32.const 1)))
    (i64.extend_i32_u (local.get $ptr))"#;

/// Allocator that always reports failure with a null pointer.
pub const ALLOC_NULL: &str = "(i64.const 0)";

/// Allocator that hands out a pointer far past the end of memory.
pub const ALLOC_OUT_OF_RANGE: &str = r#"
    (global.set $live (i32.add (global.get $live) (i32.const 1)))
    (i64.const 0x7fff0000)"#;

pub const DEALLOC_COUNT: &str = r#"
    (global.set $live (i32.sub (global.get $live) (i32.const 1)))
    (if (i32.eqz (global.get $live))
      (then (global.set $heap (i32.const 4096))))"#;

pub const DEALLOC_TRAP: &str = "unreachable";

pub const ALLOC_TRAP: &str = "unreachable";

/// Output encoding that copies the record, like the input encoding.
pub const OUTPUT_COPY: &str =
    "(call $emit (i32.wrap_i64 (local.get $ptr)) (i32.wrap_i64 (local.get $len)))";

/// Output encoding that traps on its first call only.
pub const OUTPUT_TRAP_ONCE: &str = r#"
    (if (i32.eq (global.get $output_calls) (i32.const 1))
      (then unreachable))
    (call $emit (i32.wrap_i64 (local.get $ptr)) (i32.wrap_i64 (local.get $len)))"#;

/// Output encoding whose second call allocates a real region but reports a
/// length past the end of memory.
pub const OUTPUT_BAD_LEN_ON_SECOND: &str = r#"
    (if (result i64) (i32.eq (global.get $output_calls) (i32.const 2))
      (then
        (call $pack (i32.wrap_i64 (call $alloc (i64.const 8))) (i32.const 0x7fff0000)))
      (else
        (call $emit (i32.wrap_i64 (local.get $ptr)) (i32.wrap_i64 (local.get $len)))))"#;

/// Evaluation that echoes what it received as a success verdict with four
/// redeemers: the UTxO frame, the transaction, the cost models, and 48
/// bytes of little-endian u64 scalars (max steps, max mem, zero time,
/// zero slot, slot length, guest live allocations at call time).
pub const EVAL_ECHO: &str = r#"
    (i64.store (i32.const 1024) (local.get $steps))
    (i64.store (i32.const 1032) (local.get $mem))
    (i64.store (i32.const 1040) (local.get $zero_time))
    (i64.store (i32.const 1048) (local.get $zero_slot))
    (i64.store (i32.const 1056) (local.get $slot_length))
    (i64.store (i32.const 1064) (i64.extend_i32_u (global.get $live)))
    (local.set $total
      (i32.add (i32.const 62)
        (i32.add (i32.wrap_i64 (local.get $frame_len))
          (i32.add (i32.wrap_i64 (local.get $tx_len)) (i32.wrap_i64 (local.get $cm_len))))))
    (local.set $out (i32.wrap_i64 (call $alloc (i64.extend_i32_u (local.get $total)))))
    (i32.store8 (local.get $out) (i32.const 0))
    (i32.store8 offset=1 (local.get $out) (i32.const 0x84))
    (local.set $cur (i32.add (local.get $out) (i32.const 2)))
    (local.set $cur (call $bstr (local.get $cur) (i32.wrap_i64 (local.get $frame)) (i32.wrap_i64 (local.get $frame_len))))
    (local.set $cur (call $bstr (local.get $cur) (i32.wrap_i64 (local.get $tx)) (i32.wrap_i64 (local.get $tx_len))))
    (local.set $cur (call $bstr (local.get $cur) (i32.wrap_i64 (local.get $cm)) (i32.wrap_i64 (local.get $cm_len))))
    (local.set $cur (call $bstr (local.get $cur) (i32.const 1024) (i32.const 48)))
    (call $pack (local.get $out) (local.get $total))"#;

pub const EVAL_EMPTY: &str = "(i64.const 0)";

pub const EVAL_TRAP: &str = "unreachable";

/// Result region pointing past the end of memory.
pub const EVAL_BAD_RESULT: &str = "(call $pack (i32.const 0x7fff0000) (i32.const 8))";

/// Result region with a null pointer but a non-zero length.
pub const EVAL_NULL_RESULT: &str = "(call $pack (i32.const 0) (i32.const 8))";

/// Evaluation that returns the bytes of the data segment.
pub fn eval_canned(len: usize) -> String {
    format!("(call $emit (i32.const 16) (i32.const {len}))")
}

/// Assemble a guest module from its variable parts.
///
/// `data` is placed at offset 16. Imports `proc_exit` so the module links
/// against WASI like a real build would.
pub fn guest_module(alloc_body: &str, dealloc_body: &str, eval_body: &str, data: &[u8]) -> Vec<u8> {
    guest_module_with_output(alloc_body, dealloc_body, OUTPUT_COPY, eval_body, data)
}

/// [`guest_module`] with a custom `utxo_to_output_bytes` body. The body
/// sees `$output_calls`, the 1-based number of the current call.
pub fn guest_module_with_output(
    alloc_body: &str,
    dealloc_body: &str,
    output_body: &str,
    eval_body: &str,
    data: &[u8],
) -> Vec<u8> {
    let data: String = data.iter().map(|b| format!("\\{b:02x}")).collect();
    format!(
        r#"
(module
  (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
  (memory (export "memory") 4)
  (global $heap (mut i32) (i32.const 4096))
  (global $live (export "live") (mut i32) (i32.const 0))
  (global $output_calls (mut i32) (i32.const 0))
  (data (i32.const 16) "{data}")

  (func $alloc (export "alloc") (param $size i64) (result i64)
    (local $ptr i32)
    {alloc_body})

  (func (export "dealloc") (param $ptr i64) (param $size i64)
    {dealloc_body})

  (func $pack (param $ptr i32) (param $len i32) (result i64)
    (i64.or
      (i64.shl (i64.extend_i32_u (local.get $ptr)) (i64.const 32))
      (i64.extend_i32_u (local.get $len))))

  (func $emit (param $src i32) (param $len i32) (result i64)
    (local $dst i32)
    (local.set $dst (i32.wrap_i64 (call $alloc (i64.extend_i32_u (local.get $len)))))
    (memory.copy (local.get $dst) (local.get $src) (local.get $len))
    (call $pack (local.get $dst) (local.get $len)))

  ;; CBOR byte string with a two-byte length head; returns the next offset
  (func $bstr (param $dst i32) (param $src i32) (param $len i32) (result i32)
    (i32.store8 (local.get $dst) (i32.const 0x59))
    (i32.store8 offset=1 (local.get $dst) (i32.shr_u (local.get $len) (i32.const 8)))
    (i32.store8 offset=2 (local.get $dst) (local.get $len))
    (memory.copy (i32.add (local.get $dst) (i32.const 3)) (local.get $src) (local.get $len))
    (i32.add (local.get $dst) (i32.add (local.get $len) (i32.const 3))))

  (func (export "utxo_to_input_bytes") (param $ptr i64) (param $len i64) (result i64)
    (call $emit (i32.wrap_i64 (local.get $ptr)) (i32.wrap_i64 (local.get $len))))

  (func (export "utxo_to_output_bytes") (param $ptr i64) (param $len i64) (result i64)
    (global.set $output_calls (i32.add (global.get $output_calls) (i32.const 1)))
    {output_body})

  (func (export "eval_phase_two_raw")
    (param $tx i64) (param $tx_len i64)
    (param $frame i64) (param $frame_len i64)
    (param $cm i64) (param $cm_len i64)
    (param $steps i64) (param $mem i64)
    (param $zero_time i64) (param $zero_slot i64) (param $slot_length i64)
    (result i64)
    (local $out i32) (local $cur i32) (local $total i32)
    {eval_body})
)
"#
    )
    .into_bytes()
}

/// Guest whose evaluation always returns `verdict`.
pub fn canned_guest(verdict: &[u8]) -> Vec<u8> {
    guest_module(ALLOC_BUMP, DEALLOC_COUNT, &eval_canned(verdict.len()), verdict)
}

pub fn echo_guest() -> Vec<u8> {
    guest_module(ALLOC_BUMP, DEALLOC_COUNT, EVAL_ECHO, &[])
}

// ── Verdict Payloads ──

/// The redeemer returned by [`success_verdict`].
pub const REDEEMER: &[u8] = &[0x84, 0x00, 0x00, 0xd8, 0x79, 0x80];

/// Tag 0 followed by a one-element array holding [`REDEEMER`].
pub fn success_verdict() -> Vec<u8> {
    let mut e = Encoder::new(vec![0u8]);
    e.array(1).unwrap().bytes(REDEEMER).unwrap();
    e.into_writer()
}

/// Tag 1 followed by a failure record.
pub fn failure_verdict(error_type: &str, mem: u64, cpu: u64, trace: &[&str]) -> Vec<u8> {
    let mut e = Encoder::new(vec![1u8]);
    e.map(3).unwrap();
    e.str("error_type").unwrap().str(error_type).unwrap();
    e.str("budget").unwrap().map(2).unwrap();
    e.str("mem").unwrap().u64(mem).unwrap();
    e.str("cpu").unwrap().u64(cpu).unwrap();
    e.str("debug_trace").unwrap().array(trace.len() as u64).unwrap();
    for line in trace {
        e.str(line).unwrap();
    }
    e.into_writer()
}

// ── Transactions ──

/// Minimal Conway transaction spending `inputs`, with no outputs.
pub fn conway_tx(inputs: &[UtxoRef]) -> Vec<u8> {
    let mut e = Encoder::new(Vec::new());
    e.array(4).unwrap();
    e.map(3).unwrap();
    e.u8(0).unwrap().array(inputs.len() as u64).unwrap();
    for input in inputs {
        e.array(2).unwrap();
        e.bytes(&input.tx_hash).unwrap();
        e.u64(input.index).unwrap();
    }
    e.u8(1).unwrap().array(0).unwrap();
    e.u8(2).unwrap().u64(180_000).unwrap();
    e.map(0).unwrap();
    e.bool(true).unwrap();
    e.null().unwrap();
    e.into_writer()
}

/// Script input: seed 0x5c, index 0.
pub fn script_input() -> UtxoRef {
    UtxoRef::new([0x5c; 32], 0)
}

/// A coin-only UTxO with no datum or script.
pub fn coin_utxo(utxo_ref: UtxoRef, coin: u64) -> LedgerUtxo {
    LedgerUtxo::new(utxo_ref, LedgerOutput::new("addr_test1wqscript", coin))
}

// ── Evaluator Loaders ──

/// Config for `module` with stdio not forwarded.
pub fn quiet_config(module: Vec<u8>) -> EvaluatorConfig {
    let mut config = EvaluatorConfig::new(module);
    config.inherit_stdio = false;
    config
}

pub fn load_evaluator(module: Vec<u8>) -> Evaluator {
    init_tracing();
    Evaluator::new(quiet_config(module)).expect("failed to load evaluator")
}

/// Bridge traces only, unless `RUST_LOG` says otherwise.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("phase2_sandbox=trace,phase2_context=debug"));
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}

/// Split the 48-byte scalar block echoed by [`echo_guest`].
pub fn echoed_scalars(block: &[u8]) -> [u64; 6] {
    let mut out = [0u64; 6];
    for (i, chunk) in block.chunks_exact(8).enumerate() {
        out[i] = u64::from_le_bytes(chunk.try_into().unwrap());
    }
    out
}
