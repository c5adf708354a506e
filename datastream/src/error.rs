//! Error types for datastream operations.

use std::fmt;

/// Result type for datastream operations.
pub type DataResult<T> = Result<T, DataError>;

/// Errors that can occur while reading or writing binary data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// Attempted to read past the end of the buffer.
    Truncated {
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes available.
        available: usize,
    },

    /// Value does not fit the range of the encoded type.
    RangeError {
        /// The value that was out of range.
        value: i64,
        /// Smallest encodable value.
        min: i64,
        /// Largest encodable value.
        max: i64,
    },

    /// A length prefix was negative.
    NegativeLength {
        /// The decoded length.
        length: i32,
    },

    /// A length does not fit in the 32-bit signed length prefix.
    LengthOverflow {
        /// The length that was too large.
        length: usize,
    },

    /// String bytes were not valid UTF-8.
    InvalidUtf8,
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated {
                requested,
                available,
            } => {
                write!(
                    f,
                    "truncated data: attempted to read {requested} bytes but only {available} bytes available"
                )
            }
            Self::RangeError { value, min, max } => {
                write!(f, "value {value} out of range {min}..={max}")
            }
            Self::NegativeLength { length } => {
                write!(f, "negative length prefix: {length}")
            }
            Self::LengthOverflow { length } => {
                write!(f, "length {length} does not fit in a 32-bit length prefix")
            }
            Self::InvalidUtf8 => write!(f, "string is not valid UTF-8"),
        }
    }
}

impl std::error::Error for DataError {}
