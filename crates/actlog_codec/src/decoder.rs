//! Ordered key decoder.

use crate::encoder::{
    ESCAPE, ESCAPED_ZERO, TAG_BOOL, TAG_BYTES, TAG_INF, TAG_INT, TAG_STR, TAG_UINT, TERMINATOR,
};
use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Decode a complete ordered key into its tuple of values.
///
/// # Errors
///
/// Returns an error if the key is not a valid concatenation of encoded elements.
pub fn decode(key: &[u8]) -> CodecResult<Vec<Value>> {
    let mut decoder = KeyDecoder::new(key);
    let mut values = Vec::new();
    while let Some(v) = decoder.next_value()? {
        values.push(v);
    }
    Ok(values)
}

/// Renders a key for humans: the decoded tuple when it parses, hex otherwise.
#[must_use]
pub fn describe(key: &[u8]) -> String {
    match decode(key) {
        Ok(values) => {
            let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
            format!("({})", parts.join(", "))
        }
        Err(_) => Value::Bytes(key.to_vec()).to_string(),
    }
}

/// A streaming decoder over an ordered key.
///
/// Elements are read front to back. [`KeyDecoder::remaining`] exposes the
/// undecoded suffix, which lets callers split a composite key into a
/// decoded prefix and an opaque tail.
#[derive(Debug, Clone)]
pub struct KeyDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> KeyDecoder<'a> {
    /// Create a new decoder for the given bytes.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current offset.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the bytes that have not been decoded yet.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns true if every byte has been decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Decodes the next element, or returns `None` at the end of the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the next element is malformed.
    pub fn next_value(&mut self) -> CodecResult<Option<Value>> {
        let Some(&tag) = self.data.get(self.pos) else {
            return Ok(None);
        };
        let offset = self.pos;
        self.pos += 1;
        let value = match tag {
            TAG_STR => {
                let bytes = self.unescape()?;
                Value::Str(String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?)
            }
            TAG_BYTES => Value::Bytes(self.unescape()?),
            TAG_INT => Value::Int((self.fixed()? ^ (1 << 63)) as i64),
            TAG_UINT => Value::Uint(self.fixed()?),
            TAG_BOOL => match self.take_byte()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => {
                    return Err(CodecError::decoding_failed(format!(
                        "invalid bool byte {other}"
                    )))
                }
            },
            TAG_INF => Value::Inf,
            tag => return Err(CodecError::InvalidTag { tag, offset }),
        };
        Ok(Some(value))
    }

    /// Decodes the next element and requires it to be a string.
    ///
    /// # Errors
    ///
    /// Returns an error at end of input, on a malformed element, or on a type mismatch.
    pub fn read_str(&mut self) -> CodecResult<String> {
        match self.expect()? {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }

    /// Decodes the next element and requires it to be a byte string.
    ///
    /// # Errors
    ///
    /// Returns an error at end of input, on a malformed element, or on a type mismatch.
    pub fn read_bytes(&mut self) -> CodecResult<Vec<u8>> {
        match self.expect()? {
            Value::Bytes(b) => Ok(b),
            other => Err(mismatch("bytes", &other)),
        }
    }

    /// Decodes the next element and requires it to be an unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns an error at end of input, on a malformed element, or on a type mismatch.
    pub fn read_uint(&mut self) -> CodecResult<u64> {
        match self.expect()? {
            Value::Uint(n) => Ok(n),
            other => Err(mismatch("uint", &other)),
        }
    }

    /// Decodes the next element and requires it to be a signed integer.
    ///
    /// # Errors
    ///
    /// Returns an error at end of input, on a malformed element, or on a type mismatch.
    pub fn read_int(&mut self) -> CodecResult<i64> {
        match self.expect()? {
            Value::Int(n) => Ok(n),
            other => Err(mismatch("int", &other)),
        }
    }

    fn expect(&mut self) -> CodecResult<Value> {
        self.next_value()?.ok_or(CodecError::UnexpectedEof)
    }

    fn take_byte(&mut self) -> CodecResult<u8> {
        let b = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    fn fixed(&mut self) -> CodecResult<u64> {
        let end = self.pos + 8;
        if end > self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(u64::from_be_bytes(buf))
    }

    fn unescape(&mut self) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let offset = self.pos;
            let b = self.take_byte()?;
            if b != ESCAPE {
                out.push(b);
                continue;
            }
            match self.take_byte()? {
                ESCAPED_ZERO => out.push(ESCAPE),
                TERMINATOR => return Ok(out),
                _ => return Err(CodecError::InvalidEscape { offset }),
            }
        }
    }
}

fn mismatch(expected: &'static str, found: &Value) -> CodecError {
    CodecError::UnexpectedType {
        expected,
        found: found.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{encode, KeyEncoder};

    #[test]
    fn decode_tuple() {
        let values = vec![
            Value::from("a\0b"),
            Value::Bytes(vec![0, 0, 0xFF]),
            Value::Int(-42),
            Value::Uint(u64::MAX),
            Value::Bool(true),
            Value::Inf,
        ];
        assert_eq!(decode(&encode(&values)).unwrap(), values);
    }

    #[test]
    fn decode_empty_key() {
        assert_eq!(decode(&[]).unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn remaining_exposes_suffix() {
        let key = KeyEncoder::new().str("kind").raw(b"opaque").into_bytes();
        let mut decoder = KeyDecoder::new(&key);
        assert_eq!(decoder.read_str().unwrap(), "kind");
        assert_eq!(decoder.remaining(), b"opaque");
    }

    #[test]
    fn typed_reads() {
        let key = KeyEncoder::new().uint(5).int(-5).bytes(b"x").into_bytes();
        let mut decoder = KeyDecoder::new(&key);
        assert_eq!(decoder.read_uint().unwrap(), 5);
        assert_eq!(decoder.read_int().unwrap(), -5);
        assert_eq!(decoder.read_bytes().unwrap(), b"x".to_vec());
        assert!(decoder.is_empty());
        assert_eq!(decoder.read_str(), Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn type_mismatch() {
        let key = KeyEncoder::new().uint(5).into_bytes();
        let err = KeyDecoder::new(&key).read_str().unwrap_err();
        assert_eq!(
            err,
            CodecError::UnexpectedType {
                expected: "string",
                found: "uint"
            }
        );
    }

    #[test]
    fn malformed_keys() {
        assert!(matches!(
            decode(&[0x42]),
            Err(CodecError::InvalidTag { tag: 0x42, offset: 0 })
        ));
        assert_eq!(decode(&[TAG_STR, b'a']), Err(CodecError::UnexpectedEof));
        assert_eq!(
            decode(&[TAG_STR, b'a', 0x00, 0x07]),
            Err(CodecError::InvalidEscape { offset: 2 })
        );
        assert_eq!(decode(&[TAG_UINT, 1, 2]), Err(CodecError::UnexpectedEof));
        assert_eq!(
            decode(&[TAG_STR, 0xC3, 0x28, 0x00, 0x01]),
            Err(CodecError::InvalidUtf8)
        );
    }

    #[test]
    fn describe_falls_back_to_hex() {
        assert_eq!(describe(&encode(&["a".into(), Value::Uint(1)])), "(\"a\", 1)");
        assert_eq!(describe(&[0x42, 0x43]), "0x4243");
    }
}
