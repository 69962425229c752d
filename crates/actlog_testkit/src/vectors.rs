//! Key encoding test vectors.
//!
//! Stored keys must stay byte-identical across releases, so these vectors
//! pin the encoding of each value type and of the key spaces the log uses.

use actlog_codec::Value;
use serde::{Deserialize, Serialize};

/// A value in a test vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum VectorValue {
    /// A string.
    Str(String),
    /// A byte string, hex-encoded.
    Bytes(String),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    Uint(u64),
    /// A boolean.
    Bool(bool),
    /// The infinity marker.
    Inf,
}

impl VectorValue {
    /// Converts to a codec value.
    pub fn to_value(&self) -> Value {
        match self {
            VectorValue::Str(s) => Value::Str(s.clone()),
            VectorValue::Bytes(hex) => Value::Bytes(hex_decode(hex)),
            VectorValue::Int(n) => Value::Int(*n),
            VectorValue::Uint(n) => Value::Uint(*n),
            VectorValue::Bool(b) => Value::Bool(*b),
            VectorValue::Inf => Value::Inf,
        }
    }
}

/// A key encoding test vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Tuple to encode.
    pub input: Vec<VectorValue>,
    /// Expected encoding (hex-encoded).
    pub expected_hex: String,
}

impl KeyVector {
    /// The input as codec values.
    pub fn values(&self) -> Vec<Value> {
        self.input.iter().map(VectorValue::to_value).collect()
    }
}

fn vector(id: &str, description: &str, input: Vec<VectorValue>, expected_hex: &str) -> KeyVector {
    KeyVector {
        id: id.into(),
        description: description.into(),
        input,
        expected_hex: expected_hex.into(),
    }
}

/// Key encoding test vectors.
pub fn key_encoding_vectors() -> Vec<KeyVector> {
    use VectorValue::*;
    vec![
        vector("empty", "Empty tuple", vec![], ""),
        vector("str", "Short string", vec![Str("ab".into())], "0161620001"),
        vector(
            "bytes_zero",
            "Bytes with an embedded zero",
            vec![Bytes("0007".into())],
            "0200ff070001",
        ),
        vector("uint_1", "Unsigned one", vec![Uint(1)], "040000000000000001"),
        vector("int_neg_1", "Signed minus one", vec![Int(-1)], "037fffffffffffffff"),
        vector("int_0", "Signed zero", vec![Int(0)], "038000000000000000"),
        vector("bool_true", "Boolean true", vec![Bool(true)], "0501"),
        vector("inf", "Infinity marker", vec![Inf], "ff"),
        vector(
            "action_handle",
            "Handle of the action kind test",
            vec![Str("action.Log".into()), Str("test".into())],
            "01616374696f6e2e4c6f67000101746573740001",
        ),
        vector(
            "time_index_prefix",
            "Time index prefix for docs at DBTime 7",
            vec![Str("timed.ByTime".into()), Str("docs.Doc".into()), Uint(7)],
            "0174696d65642e427954696d65000101646f63732e446f630001040000000000000007",
        ),
    ]
}

/// Encodes bytes as lowercase hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes hex into bytes.
///
/// # Panics
///
/// Panics if `hex` is not valid hex.
pub fn hex_decode(hex: &str) -> Vec<u8> {
    assert!(hex.len() % 2 == 0, "odd-length hex string");
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("invalid hex"))
        .collect()
}

/// All test vectors as JSON.
pub fn all_vectors_json() -> String {
    let vectors = AllTestVectors {
        keys: key_encoding_vectors(),
    };
    serde_json::to_string_pretty(&vectors).expect("Failed to serialize vectors")
}

#[derive(Debug, Serialize, Deserialize)]
struct AllTestVectors {
    keys: Vec<KeyVector>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use actlog_codec::{decode, encode};

    #[test]
    fn test_key_vectors() {
        for vector in key_encoding_vectors() {
            let encoded = encode(&vector.values());
            assert_eq!(
                hex_encode(&encoded),
                vector.expected_hex,
                "Vector {} failed: {}",
                vector.id,
                vector.description
            );
            assert_eq!(decode(&encoded).unwrap(), vector.values(), "Vector {}", vector.id);
        }
    }

    #[test]
    fn test_vectors_json_roundtrip() {
        let json = all_vectors_json();
        let parsed: AllTestVectors = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.keys.len(), key_encoding_vectors().len());
        assert!(json.contains("action_handle"));
        assert!(json.contains(r#""type": "inf""#));
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex_encode(&[0x00, 0xab, 0xff]), "00abff");
        assert_eq!(hex_decode("00abff"), vec![0x00, 0xab, 0xff]);
    }
}
