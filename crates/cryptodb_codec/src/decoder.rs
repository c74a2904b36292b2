//! Fixed-format decoding of typed values.

use crate::error::{CodecError, CodecResult};
use crate::value::{Value, ValueType};

/// Decodes a plaintext body into a value of the given type.
///
/// The type tag is carried outside the body (in the record metadata), so
/// the caller tells the decoder what to expect. Mismatches between an
/// accessor and the stored tag are the store's responsibility; this
/// function only validates the body against the tag it is given.
///
/// # Errors
///
/// Returns an error if the body is truncated, has trailing bytes, or the
/// string payload is not valid UTF-8.
pub fn decode_value(value_type: ValueType, body: &[u8]) -> CodecResult<Value> {
    match value_type {
        ValueType::String => {
            if body.len() < 4 {
                return Err(CodecError::UnexpectedEof);
            }
            let declared =
                u32::from_le_bytes([body[0], body[1], body[2], body[3]]) as usize;
            let payload = &body[4..];
            if declared > payload.len() {
                return Err(CodecError::LengthMismatch {
                    declared,
                    available: payload.len(),
                });
            }
            if declared < payload.len() {
                return Err(CodecError::TrailingBytes);
            }
            let s = std::str::from_utf8(payload).map_err(|_| CodecError::InvalidUtf8)?;
            Ok(Value::String(s.to_string()))
        }
        ValueType::Integer => {
            let bytes: [u8; 8] = body.try_into().map_err(|_| {
                if body.len() < 8 {
                    CodecError::UnexpectedEof
                } else {
                    CodecError::TrailingBytes
                }
            })?;
            Ok(Value::Integer(i64::from_le_bytes(bytes)))
        }
        ValueType::Double => {
            let bytes: [u8; 8] = body.try_into().map_err(|_| {
                if body.len() < 8 {
                    CodecError::UnexpectedEof
                } else {
                    CodecError::TrailingBytes
                }
            })?;
            Ok(Value::Double(f64::from_bits(u64::from_le_bytes(bytes))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_value;

    #[test]
    fn truncated_string_fails() {
        assert_eq!(
            decode_value(ValueType::String, &[3, 0]),
            Err(CodecError::UnexpectedEof)
        );
        assert_eq!(
            decode_value(ValueType::String, &[3, 0, 0, 0, b'a']),
            Err(CodecError::LengthMismatch {
                declared: 3,
                available: 1
            })
        );
    }

    #[test]
    fn string_trailing_bytes_fail() {
        assert_eq!(
            decode_value(ValueType::String, &[1, 0, 0, 0, b'a', b'b']),
            Err(CodecError::TrailingBytes)
        );
    }

    #[test]
    fn invalid_utf8_fails() {
        assert_eq!(
            decode_value(ValueType::String, &[2, 0, 0, 0, 0xFF, 0xFE]),
            Err(CodecError::InvalidUtf8)
        );
    }

    #[test]
    fn integer_wrong_width_fails() {
        assert_eq!(
            decode_value(ValueType::Integer, &[0; 4]),
            Err(CodecError::UnexpectedEof)
        );
        assert_eq!(
            decode_value(ValueType::Integer, &[0; 9]),
            Err(CodecError::TrailingBytes)
        );
    }

    #[test]
    fn integer_extremes_roundtrip() {
        for n in [i64::MIN, -1, 0, 1, i64::MAX] {
            let body = encode_value(&Value::Integer(n)).unwrap();
            assert_eq!(
                decode_value(ValueType::Integer, &body).unwrap(),
                Value::Integer(n)
            );
        }
    }

    #[test]
    fn double_bit_exact_roundtrip() {
        for d in [0.0, -0.0, 1.5, f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let body = encode_value(&Value::Double(d)).unwrap();
            let decoded = decode_value(ValueType::Double, &body).unwrap();
            assert_eq!(decoded, Value::Double(d));
        }
    }

    #[test]
    fn unicode_string_roundtrip() {
        let s = "ключ → 値 🗝";
        let body = encode_value(&Value::String(s.to_string())).unwrap();
        assert_eq!(
            decode_value(ValueType::String, &body).unwrap(),
            Value::String(s.to_string())
        );
    }
}
