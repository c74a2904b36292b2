//! Fixed-format encoding of typed values.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encodes a value into its fixed-format plaintext body.
///
/// - Strings are a `u32` little-endian byte-length prefix followed by the
///   UTF-8 bytes.
/// - Integers are 8-byte two's-complement little-endian.
/// - Doubles are the 8-byte little-endian IEEE-754 bit pattern, so any
///   NaN payload survives the round trip bit-identically.
///
/// # Errors
///
/// Returns an error if a string is longer than `u32::MAX` bytes.
pub fn encode_value(value: &Value) -> CodecResult<Vec<u8>> {
    match value {
        Value::String(s) => {
            let len = u32::try_from(s.len())
                .map_err(|_| CodecError::StringTooLong { len: s.len() })?;
            let mut buf = Vec::with_capacity(4 + s.len());
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
            Ok(buf)
        }
        Value::Integer(n) => Ok(n.to_le_bytes().to_vec()),
        Value::Double(d) => Ok(d.to_bits().to_le_bytes().to_vec()),
    }
}
