//! Verdict decoding for the raw bytes returned by `eval_phase_two_raw`.
//!
//! Byte 0 is the discriminant. `0` means success and the rest is a CBOR
//! array of serialized redeemers, in evaluation order. Any other value means
//! failure and the rest is a CBOR map:
//!
//! ```text
//! { "error_type": text, "budget": { "mem": uint, "cpu": uint }, "debug_trace": [* text] }
//! ```

use minicbor::bytes::ByteVec;
use minicbor::Decoder;

use crate::codec::{definite_map, ensure_consumed, missing};
use crate::error::CodecError;
use crate::types::{Budget, EvalFailure, Verdict};

/// Discriminant of a successful evaluation.
pub const TAG_SUCCESS: u8 = 0;

/// Decode a raw evaluation result.
///
/// An empty buffer is rejected before the tag is inspected.
pub fn decode_verdict(raw: &[u8]) -> Result<Verdict, CodecError> {
    let (&tag, payload) = raw.split_first().ok_or(CodecError::EmptyResult)?;
    if tag == TAG_SUCCESS {
        decode_redeemers(payload).map(Verdict::Success)
    } else {
        decode_eval_failure(payload).map(Verdict::Failure)
    }
}

/// Decode the success payload. Bytes after the array are ignored: the module
/// may hand back a buffer larger than the encoded list.
pub fn decode_redeemers(payload: &[u8]) -> Result<Vec<Vec<u8>>, CodecError> {
    let mut d = Decoder::new(payload);
    let mut redeemers = Vec::new();
    for item in d.array_iter::<ByteVec>()? {
        redeemers.push(item?.to_vec());
    }
    Ok(redeemers)
}

/// Decode the failure payload.
pub fn decode_eval_failure(payload: &[u8]) -> Result<EvalFailure, CodecError> {
    let mut d = Decoder::new(payload);
    let len = definite_map(&mut d)?;

    let mut error_type = None;
    let mut budget = None;
    let mut debug_trace = None;

    for _ in 0..len {
        match d.str()? {
            "error_type" => error_type = Some(d.str()?.to_string()),
            "budget" => budget = Some(decode_budget(&mut d)?),
            "debug_trace" => {
                let mut trace = Vec::new();
                for line in d.array_iter::<String>()? {
                    trace.push(line?);
                }
                debug_trace = Some(trace);
            }
            _ => d.skip()?,
        }
    }
    ensure_consumed(&d, payload)?;

    Ok(EvalFailure {
        error_type: error_type.ok_or_else(|| missing("error_type"))?,
        budget: budget.ok_or_else(|| missing("budget"))?,
        debug_trace: debug_trace.ok_or_else(|| missing("debug_trace"))?,
    })
}

fn decode_budget(d: &mut Decoder<'_>) -> Result<Budget, CodecError> {
    let len = definite_map(d)?;
    let mut mem = None;
    let mut cpu = None;
    for _ in 0..len {
        match d.str()? {
            "mem" => mem = Some(d.u64()?),
            "cpu" => cpu = Some(d.u64()?),
            _ => d.skip()?,
        }
    }
    Ok(Budget {
        mem: mem.ok_or_else(|| missing("mem"))?,
        cpu: cpu.ok_or_else(|| missing("cpu"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use minicbor::Encoder;

    fn success_raw(redeemers: &[&[u8]]) -> Vec<u8> {
        let mut e = Encoder::new(vec![TAG_SUCCESS]);
        e.array(redeemers.len() as u64).unwrap();
        for r in redeemers {
            e.bytes(r).unwrap();
        }
        e.into_writer()
    }

    fn failure_raw(tag: u8, error_type: &str, mem: u64, cpu: u64, trace: &[&str]) -> Vec<u8> {
        let mut e = Encoder::new(vec![tag]);
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

    #[test]
    fn test_empty_result_rejected() {
        assert!(matches!(decode_verdict(&[]), Err(CodecError::EmptyResult)));
    }

    #[test]
    fn test_success_single_redeemer() {
        let raw = success_raw(&[&[0x84, 0x00, 0x00, 0xd8, 0x79, 0x80]]);
        match decode_verdict(&raw).unwrap() {
            Verdict::Success(list) => {
                assert_eq!(list, vec![vec![0x84, 0x00, 0x00, 0xd8, 0x79, 0x80]]);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_success_preserves_order() {
        let raw = success_raw(&[b"first", b"second", b"third"]);
        let Verdict::Success(list) = decode_verdict(&raw).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(list, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
    }

    #[test]
    fn test_success_empty_list() {
        let raw = success_raw(&[]);
        assert_eq!(decode_verdict(&raw).unwrap(), Verdict::Success(vec![]));
    }

    #[test]
    fn test_success_indefinite_array() {
        // 0x9f = indefinite array, 0xff = break
        let raw = [0x00, 0x9f, 0x41, 0xaa, 0x42, 0xbb, 0xcc, 0xff];
        assert_eq!(
            decode_verdict(&raw).unwrap(),
            Verdict::Success(vec![vec![0xaa], vec![0xbb, 0xcc]])
        );
    }

    #[test]
    fn test_success_malformed_payload() {
        // tag 0 followed by a map instead of an array
        assert!(decode_verdict(&[0x00, 0xa0]).is_err());
        // tag 0 with nothing after it
        assert!(decode_verdict(&[0x00]).is_err());
        // array of text instead of bytes
        assert!(decode_verdict(&[0x00, 0x81, 0x61, b'x']).is_err());
    }

    #[test]
    fn test_failure_any_nonzero_tag() {
        for tag in [1u8, 2, 0x7f, 0xff] {
            let raw = failure_raw(tag, "EvaluationFailure", 1200, 3400, &["trace: boom"]);
            match decode_verdict(&raw).unwrap() {
                Verdict::Failure(f) => {
                    assert_eq!(f.error_type, "EvaluationFailure");
                    assert_eq!(f.budget, Budget { mem: 1200, cpu: 3400 });
                    assert_eq!(f.debug_trace, vec!["trace: boom".to_string()]);
                }
                other => panic!("tag {tag}: expected failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_failure_keys_any_order_and_unknown_skipped() {
        let mut e = Encoder::new(vec![1u8]);
        e.map(4).unwrap();
        e.str("debug_trace").unwrap().array(2).unwrap();
        e.str("a").unwrap().str("b").unwrap();
        e.str("extra").unwrap().u64(9).unwrap();
        e.str("budget").unwrap().map(2).unwrap();
        e.str("cpu").unwrap().u64(7).unwrap();
        e.str("mem").unwrap().u64(8).unwrap();
        e.str("error_type").unwrap().str("MissingRedeemer").unwrap();
        let raw = e.into_writer();

        let Verdict::Failure(f) = decode_verdict(&raw).unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(f.error_type, "MissingRedeemer");
        assert_eq!(f.budget, Budget { mem: 8, cpu: 7 });
        assert_eq!(f.debug_trace, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_failure_missing_key() {
        let mut e = Encoder::new(vec![1u8]);
        e.map(1).unwrap();
        e.str("error_type").unwrap().str("x").unwrap();
        let raw = e.into_writer();
        let err = decode_verdict(&raw).unwrap_err();
        assert!(err.to_string().contains("budget"));
    }

    #[test]
    fn test_failure_trailing_bytes() {
        let mut raw = failure_raw(1, "x", 0, 0, &[]);
        raw.push(0x00);
        assert!(matches!(
            decode_verdict(&raw),
            Err(CodecError::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_failure_malformed_payload() {
        assert!(decode_verdict(&[0x01]).is_err());
        assert!(decode_verdict(&[0x01, 0x80]).is_err());
    }
}
