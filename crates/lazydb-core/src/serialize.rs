//! CBOR encoding for stored rows.
//!
//! Format-level only. Row layout and size policy belong to `db::store`,
//! which passes its own limit into [`deserialize_bounded`].

use serde::{Serialize, de::DeserializeOwned};
use serde_cbor::{from_slice, to_vec};
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error as ThisError;

///
/// SerializeError
///

#[derive(Debug, ThisError)]
pub enum SerializeError {
    #[error("serialize error: {0}")]
    Serialize(String),

    #[error("deserialize error: {0}")]
    Deserialize(String),

    #[error("deserialize size limit exceeded: {len} bytes (limit {max_bytes})")]
    DeserializeSizeLimitExceeded { len: usize, max_bytes: usize },
}

pub fn serialize<T>(value: &T) -> Result<Vec<u8>, SerializeError>
where
    T: Serialize,
{
    to_vec(value).map_err(|e| SerializeError::Serialize(e.to_string()))
}

/// Decode bytes produced by [`serialize`], refusing payloads over
/// `max_bytes`. A panic inside the decoder is reported as an error.
pub fn deserialize_bounded<T>(bytes: &[u8], max_bytes: usize) -> Result<T, SerializeError>
where
    T: DeserializeOwned,
{
    if bytes.len() > max_bytes {
        return Err(SerializeError::DeserializeSizeLimitExceeded {
            len: bytes.len(),
            max_bytes,
        });
    }

    match catch_unwind(AssertUnwindSafe(|| from_slice::<T>(bytes))) {
        Ok(decoded) => decoded.map_err(|e| SerializeError::Deserialize(e.to_string())),
        Err(_) => Err(SerializeError::Deserialize(
            "panic during CBOR deserialization".into(),
        )),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn row_values_survive_encoding() {
        let row = vec![
            Value::Int(1),
            Value::from(vec!["a", "b"]),
            Value::Null,
            Value::Bool(true),
        ];

        let bytes = serialize(&row).unwrap();
        let decoded: Vec<Value> = deserialize_bounded(&bytes, 1024).unwrap();

        assert_eq!(decoded, row);
    }

    #[test]
    fn oversized_payload_is_refused_before_decode() {
        let bytes = serialize(&vec![Value::from("x".repeat(64))]).unwrap();

        let err = deserialize_bounded::<Vec<Value>>(&bytes, 8).unwrap_err();

        assert!(matches!(
            err,
            SerializeError::DeserializeSizeLimitExceeded { max_bytes: 8, .. }
        ));
    }

    #[test]
    fn garbage_is_a_deserialize_error() {
        let err = deserialize_bounded::<Vec<Value>>(&[0xff, 0x00, 0x13], 64).unwrap_err();

        assert!(matches!(err, SerializeError::Deserialize(_)));
    }
}
