//! Record serialization.
//!
//! Stored records are CBOR documents produced from `serde` types.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serializes a value to CBOR bytes.
///
/// # Errors
///
/// Returns `EncodingFailed` if the value cannot be serialized.
pub fn to_record<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buf)
}

/// Deserializes a value from CBOR bytes.
///
/// # Errors
///
/// Returns `DecodingFailed` if the bytes are not a valid record of type `T`.
pub fn from_record<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        payload: Vec<u8>,
        done: bool,
    }

    #[test]
    fn record_roundtrip() {
        let sample = Sample {
            name: "num".into(),
            payload: vec![1, 2, 3],
            done: true,
        };
        let bytes = to_record(&sample).unwrap();
        assert_eq!(from_record::<Sample>(&bytes).unwrap(), sample);
    }

    #[test]
    fn record_garbage_fails() {
        let err = from_record::<Sample>(&[0xFF, 0x00]).unwrap_err();
        assert!(matches!(err, CodecError::DecodingFailed { .. }));
    }
}
