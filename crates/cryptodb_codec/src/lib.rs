//! # CryptoDB Codec
//!
//! Typed value encoding/decoding for CryptoDB.
//!
//! This crate defines the value model a store can hold (UTF-8 string,
//! 64-bit signed integer, 64-bit double) and the fixed-format plaintext
//! body each value serializes to before it is sealed:
//!
//! - STRING: `u32` little-endian length prefix + UTF-8 bytes
//! - INTEGER: 8-byte two's-complement little-endian
//! - DOUBLE: 8-byte little-endian IEEE-754 bit pattern
//!
//! Decoding reproduces the original value exactly; doubles round-trip
//! bit-identically, NaN payloads included.
//!
//! ## Usage
//!
//! ```
//! use cryptodb_codec::{decode_value, encode_value, Value, ValueType};
//!
//! let value = Value::Integer(42);
//! let body = encode_value(&value).unwrap();
//! let decoded = decode_value(ValueType::Integer, &body).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::decode_value;
pub use encoder::encode_value;
pub use error::{CodecError, CodecResult};
pub use value::{Value, ValueType};
