//! Error types for wire format operations.

use std::fmt;

use datastream::DataError;

/// Result type for wire format operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors raised while framing or decoding management packets.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WireError {
    /// The frame's type tag does not name a known packet.
    UnknownPacketType { tag: u32 },

    /// A length prefix is too small to hold the type tag.
    FrameTooShort { length: u32 },

    /// Buffer does not hold the bytes its length prefix announces.
    FrameLengthMismatch { declared: usize, actual: usize },

    /// Limits exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },

    /// Packet body had bytes left after all fields were decoded.
    TrailingBytes { tag: u32, remaining: usize },

    /// Field-level encoding or decoding error.
    Data(DataError),
}

/// Specific wire limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    FrameBytes,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPacketType { tag } => write!(f, "unknown packet type: {tag}"),
            Self::FrameTooShort { length } => {
                write!(f, "frame length {length} is shorter than the 4-byte type tag")
            }
            Self::FrameLengthMismatch { declared, actual } => {
                write!(
                    f,
                    "frame length mismatch: prefix declares {declared} bytes but {actual} available"
                )
            }
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => {
                write!(f, "{kind} limit exceeded: {actual} > {limit}")
            }
            Self::TrailingBytes { tag, remaining } => {
                write!(f, "packet type {tag} has {remaining} trailing bytes")
            }
            Self::Data(err) => write!(f, "field error: {err}"),
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FrameBytes => "frame bytes",
        };
        write!(f, "{name}")
    }
}

impl std::error::Error for WireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Data(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DataError> for WireError {
    fn from(err: DataError) -> Self {
        Self::Data(err)
    }
}
