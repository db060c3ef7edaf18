//! Typed record values and their byte encoding.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::{RecordError, RecordResult};

/// Type tag of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Integer,
    Doubles,
    Integers,
}

/// A value stored under a record key.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    String(String),
    Integer(i64),
    Doubles(Vec<f64>),
    Integers(Vec<i64>),
}

impl RecordValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            RecordValue::String(_) => ValueKind::String,
            RecordValue::Integer(_) => ValueKind::Integer,
            RecordValue::Doubles(_) => ValueKind::Doubles,
            RecordValue::Integers(_) => ValueKind::Integers,
        }
    }

    /// Little-endian encoding: UTF-8 for strings, 8 bytes per number.
    pub(crate) fn encode(&self) -> Bytes {
        match self {
            RecordValue::String(s) => Bytes::copy_from_slice(s.as_bytes()),
            RecordValue::Integer(v) => Bytes::copy_from_slice(&v.to_le_bytes()),
            RecordValue::Doubles(values) => {
                let mut buf = BytesMut::with_capacity(values.len() * 8);
                for v in values {
                    buf.put_f64_le(*v);
                }
                buf.freeze()
            }
            RecordValue::Integers(values) => {
                let mut buf = BytesMut::with_capacity(values.len() * 8);
                for v in values {
                    buf.put_i64_le(*v);
                }
                buf.freeze()
            }
        }
    }

    pub(crate) fn decode(key: &str, kind: ValueKind, raw: Bytes) -> RecordResult<Self> {
        match kind {
            ValueKind::String => String::from_utf8(raw.to_vec())
                .map(RecordValue::String)
                .map_err(|e| RecordError::Corrupt(format!("record {} is not UTF-8: {}", key, e))),
            ValueKind::Integer => {
                let mut raw = raw;
                if raw.len() != 8 {
                    return Err(RecordError::Corrupt(format!(
                        "integer record {} has {} bytes",
                        key,
                        raw.len()
                    )));
                }
                Ok(RecordValue::Integer(raw.get_i64_le()))
            }
            ValueKind::Doubles => {
                let mut values = vec![0.0; doubles_len(key, &raw)?];
                decode_doubles_into(&raw, &mut values);
                Ok(RecordValue::Doubles(values))
            }
            ValueKind::Integers => {
                let mut raw = raw;
                let count = doubles_len(key, &raw)?;
                let values = (0..count).map(|_| raw.get_i64_le()).collect();
                Ok(RecordValue::Integers(values))
            }
        }
    }
}

impl From<&str> for RecordValue {
    fn from(value: &str) -> Self {
        RecordValue::String(value.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(value: String) -> Self {
        RecordValue::String(value)
    }
}

impl From<i64> for RecordValue {
    fn from(value: i64) -> Self {
        RecordValue::Integer(value)
    }
}

impl From<Vec<f64>> for RecordValue {
    fn from(value: Vec<f64>) -> Self {
        RecordValue::Doubles(value)
    }
}

impl From<&[f64]> for RecordValue {
    fn from(value: &[f64]) -> Self {
        RecordValue::Doubles(value.to_vec())
    }
}

impl From<Vec<i64>> for RecordValue {
    fn from(value: Vec<i64>) -> Self {
        RecordValue::Integers(value)
    }
}

/// Number of 8-byte elements held by an encoded array.
pub(crate) fn doubles_len(key: &str, raw: &[u8]) -> RecordResult<usize> {
    if raw.len() % 8 != 0 {
        return Err(RecordError::Corrupt(format!(
            "array record {} has {} bytes, not a multiple of 8",
            key,
            raw.len()
        )));
    }
    Ok(raw.len() / 8)
}

/// Decode little-endian doubles into `out`, which must match the encoded length.
pub(crate) fn decode_doubles_into(mut raw: &[u8], out: &mut [f64]) {
    for slot in out.iter_mut() {
        *slot = raw.get_f64_le();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(RecordValue::from("F128").kind(), ValueKind::String);
        assert_eq!(RecordValue::from(3i64).kind(), ValueKind::Integer);
        assert_eq!(RecordValue::from(vec![1.0]).kind(), ValueKind::Doubles);
        assert_eq!(RecordValue::from(vec![20i64, 24]).kind(), ValueKind::Integers);
    }

    #[test]
    fn test_doubles_preserve_bits() {
        let values = vec![f64::NAN, -0.0, f64::MIN_POSITIVE, 1e308];
        let raw = RecordValue::Doubles(values.clone()).encode();
        let decoded = match RecordValue::decode("a", ValueKind::Doubles, raw).unwrap() {
            RecordValue::Doubles(v) => v,
            other => panic!("unexpected value {:?}", other),
        };
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&decoded), bits(&values));
    }

    #[test]
    fn test_integers_decode() {
        let raw = RecordValue::Integers(vec![20, -4, i64::MAX]).encode();
        assert_eq!(raw.len(), 24);
        assert_eq!(
            RecordValue::decode("pl", ValueKind::Integers, raw).unwrap(),
            RecordValue::Integers(vec![20, -4, i64::MAX])
        );
    }

    #[test]
    fn test_decode_rejects_bad_lengths() {
        assert!(RecordValue::decode("n", ValueKind::Integer, Bytes::from_static(&[1, 2])).is_err());
        assert!(RecordValue::decode("a", ValueKind::Doubles, Bytes::from_static(&[0; 9])).is_err());
        assert!(RecordValue::decode("p", ValueKind::Integers, Bytes::from_static(&[0; 4])).is_err());
        assert!(RecordValue::decode("s", ValueKind::String, Bytes::from_static(&[0xff])).is_err());
    }
}
