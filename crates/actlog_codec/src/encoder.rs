//! Order-preserving key encoder.

use crate::value::Value;

pub(crate) const TAG_STR: u8 = 0x01;
pub(crate) const TAG_BYTES: u8 = 0x02;
pub(crate) const TAG_INT: u8 = 0x03;
pub(crate) const TAG_UINT: u8 = 0x04;
pub(crate) const TAG_BOOL: u8 = 0x05;
pub(crate) const TAG_INF: u8 = 0xFF;

pub(crate) const ESCAPE: u8 = 0x00;
pub(crate) const ESCAPED_ZERO: u8 = 0xFF;
pub(crate) const TERMINATOR: u8 = 0x01;

/// Encode a tuple of values as an ordered key.
///
/// For tuples `a` and `b`, `encode(a) < encode(b)` exactly when `a < b`
/// in lexicographic tuple order, and `encode(a ++ b) == encode(a) ++ encode(b)`.
pub fn encode(values: &[Value]) -> Vec<u8> {
    let mut encoder = KeyEncoder::new();
    for v in values {
        encoder.value(v);
    }
    encoder.into_bytes()
}

/// Returns the smallest key greater than every key that starts with `prefix`.
///
/// Returns `None` when no such key exists (the prefix is empty or all `0xFF`).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last != 0xFF {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// An incremental ordered-key builder.
///
/// ```
/// use actlog_codec::{decode, KeyEncoder, Value};
///
/// let key = KeyEncoder::new().str("num").uint(23).into_bytes();
/// assert_eq!(decode(&key).unwrap(), vec![Value::from("num"), Value::Uint(23)]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyEncoder {
    buffer: Vec<u8>,
}

impl KeyEncoder {
    /// Create a new encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an encoder that appends to an already-encoded key.
    #[must_use]
    pub fn from_key(key: &[u8]) -> Self {
        Self {
            buffer: key.to_vec(),
        }
    }

    /// Appends any element.
    pub fn value(&mut self, value: &Value) -> &mut Self {
        match value {
            Value::Str(s) => self.escaped(TAG_STR, s.as_bytes()),
            Value::Bytes(b) => self.escaped(TAG_BYTES, b),
            Value::Int(n) => {
                self.buffer.push(TAG_INT);
                // Flipping the sign bit makes two's complement sort as unsigned.
                self.buffer
                    .extend_from_slice(&((*n as u64) ^ (1 << 63)).to_be_bytes());
            }
            Value::Uint(n) => {
                self.buffer.push(TAG_UINT);
                self.buffer.extend_from_slice(&n.to_be_bytes());
            }
            Value::Bool(b) => {
                self.buffer.push(TAG_BOOL);
                self.buffer.push(u8::from(*b));
            }
            Value::Inf => self.buffer.push(TAG_INF),
        }
        self
    }

    /// Appends a string element.
    #[must_use]
    pub fn str(mut self, s: &str) -> Self {
        self.escaped(TAG_STR, s.as_bytes());
        self
    }

    /// Appends a byte-string element.
    #[must_use]
    pub fn bytes(mut self, b: &[u8]) -> Self {
        self.escaped(TAG_BYTES, b);
        self
    }

    /// Appends a signed integer element.
    #[must_use]
    pub fn int(mut self, n: i64) -> Self {
        self.value(&Value::Int(n));
        self
    }

    /// Appends an unsigned integer element.
    #[must_use]
    pub fn uint(mut self, n: u64) -> Self {
        self.value(&Value::Uint(n));
        self
    }

    /// Appends the [`Value::Inf`] element.
    #[must_use]
    pub fn inf(mut self) -> Self {
        self.buffer.push(TAG_INF);
        self
    }

    /// Appends raw, already-encoded key bytes.
    #[must_use]
    pub fn raw(mut self, encoded: &[u8]) -> Self {
        self.buffer.extend_from_slice(encoded);
        self
    }

    /// Consume this encoder and return the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn escaped(&mut self, tag: u8, data: &[u8]) {
        self.buffer.reserve(data.len() + 3);
        self.buffer.push(tag);
        for &b in data {
            self.buffer.push(b);
            if b == ESCAPE {
                self.buffer.push(ESCAPED_ZERO);
            }
        }
        self.buffer.push(ESCAPE);
        self.buffer.push(TERMINATOR);
    }
}
