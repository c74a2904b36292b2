//! Typed value model.

use std::fmt;

/// A typed value stored in a CryptoDB store.
///
/// Doubles compare by bit pattern so that round-trip tests can assert
/// exact equality, including for NaN payloads.
#[derive(Debug, Clone)]
pub enum Value {
    /// UTF-8 string.
    String(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit IEEE-754 floating point.
    Double(f64),
}

impl Value {
    /// Returns the type tag of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::Integer(_) => ValueType::Integer,
            Self::Double(_) => ValueType::Double,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Value {}

/// Type tag for a stored value.
///
/// The discriminants are the on-disk wire encoding and are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    /// UTF-8 string.
    String = 1,
    /// 64-bit signed integer.
    Integer = 2,
    /// 64-bit IEEE-754 floating point.
    Double = 3,
}

impl ValueType {
    /// Converts a tag byte to a value type.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::String),
            2 => Some(Self::Integer),
            3 => Some(Self::Double),
            _ => None,
        }
    }

    /// Converts the value type to its tag byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns a human-readable name for the type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Double => "double",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
