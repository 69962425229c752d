//! # actlog codec
//!
//! Key and record encodings for the action log.
//!
//! Two encodings live here:
//!
//! - **Ordered keys.** A tuple of [`Value`]s encodes to bytes whose
//!   lexicographic order equals the tuple order, so range scans over the
//!   store follow the logical order of the keys.
//! - **Records.** Stored values are CBOR documents produced from `serde`
//!   types.
//!
//! ## Ordered Key Rules
//!
//! - Every element starts with a tag byte; tags sort in type order
//! - Strings and byte strings escape `0x00` as `00 FF` and end with `00 01`
//! - Integers are fixed-width big-endian; signed integers flip the sign bit
//! - `Inf` is the single byte `0xFF` and sorts after everything
//! - `encode(a ++ b) == encode(a) ++ encode(b)`
//!
//! ## Usage
//!
//! ```
//! use actlog_codec::{decode, encode, Value};
//!
//! let low = encode(&[Value::from("num"), Value::Uint(2)]);
//! let high = encode(&[Value::from("num"), Value::Uint(10)]);
//! assert!(low < high);
//! assert_eq!(decode(&low).unwrap(), vec![Value::from("num"), Value::Uint(2)]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod record;
mod value;

pub use decoder::{decode, describe, KeyDecoder};
pub use encoder::{encode, prefix_end, KeyEncoder};
pub use error::{CodecError, CodecResult};
pub use record::{from_record, to_record};
pub use value::Value;
