//! Length-prefixed framing.
//!
//! ```text
//! [u32 length][u32 type tag][body ...]
//! ```
//!
//! Both integers are big-endian. `length` counts the tag and the body but not
//! itself, so it is always at least [`TAG_LEN`].

use datastream::DataWriter;

use crate::error::{LimitKind, WireError, WireResult};
use crate::limits::Limits;
use crate::packet::Packet;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Size of the type tag in bytes.
pub const TAG_LEN: usize = 4;

/// A frame split into its tag and undecoded body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame<'a> {
    pub tag: u32,
    pub body: &'a [u8],
}

impl RawFrame<'_> {
    /// Decodes the body according to the tag.
    pub fn decode(&self) -> WireResult<Packet> {
        Packet::decode(self.tag, self.body)
    }
}

/// Encodes a packet as a complete frame.
pub fn encode_frame(packet: &Packet) -> WireResult<Vec<u8>> {
    let mut out = Vec::new();
    encode_frame_into(packet, &mut out)?;
    Ok(out)
}

/// Appends a complete frame for `packet` to `out`.
///
/// `out` is left untouched if the packet cannot be encoded.
pub fn encode_frame_into(packet: &Packet, out: &mut Vec<u8>) -> WireResult<()> {
    let mut body = DataWriter::new();
    packet.encode_body(&mut body)?;
    let body = body.finish();

    let length = body.len() + TAG_LEN;
    let length = u32::try_from(length).map_err(|_| WireError::LimitsExceeded {
        kind: LimitKind::FrameBytes,
        limit: u32::MAX as usize,
        actual: length,
    })?;

    out.reserve(LENGTH_PREFIX_LEN + length as usize);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(&packet.kind().tag().to_be_bytes());
    out.extend_from_slice(&body);
    Ok(())
}

/// Validates a received length prefix and returns the number of bytes that
/// follow it.
///
/// Called before allocating, so an oversized prefix never reserves memory.
pub fn frame_length(prefix: [u8; LENGTH_PREFIX_LEN], limits: &Limits) -> WireResult<usize> {
    let length = u32::from_be_bytes(prefix);
    if (length as usize) < TAG_LEN {
        return Err(WireError::FrameTooShort { length });
    }
    let actual = length as usize;
    if actual > limits.max_frame_bytes {
        return Err(WireError::LimitsExceeded {
            kind: LimitKind::FrameBytes,
            limit: limits.max_frame_bytes,
            actual,
        });
    }
    Ok(actual)
}

/// Splits the bytes following a length prefix into tag and body.
pub fn split_frame(chunk: &[u8]) -> WireResult<RawFrame<'_>> {
    if chunk.len() < TAG_LEN {
        return Err(WireError::FrameLengthMismatch {
            declared: TAG_LEN,
            actual: chunk.len(),
        });
    }
    let (tag, body) = chunk.split_at(TAG_LEN);
    let tag = u32::from_be_bytes([tag[0], tag[1], tag[2], tag[3]]);
    Ok(RawFrame { tag, body })
}

/// Reads one frame from the front of `buf`, returning it and the number of
/// bytes consumed.
pub fn read_frame<'a>(buf: &'a [u8], limits: &Limits) -> WireResult<(RawFrame<'a>, usize)> {
    if buf.len() < LENGTH_PREFIX_LEN {
        return Err(WireError::FrameLengthMismatch {
            declared: LENGTH_PREFIX_LEN,
            actual: buf.len(),
        });
    }
    let prefix = [buf[0], buf[1], buf[2], buf[3]];
    let length = frame_length(prefix, limits)?;
    let rest = &buf[LENGTH_PREFIX_LEN..];
    if rest.len() < length {
        return Err(WireError::FrameLengthMismatch {
            declared: length,
            actual: rest.len(),
        });
    }
    let frame = split_frame(&rest[..length])?;
    Ok((frame, LENGTH_PREFIX_LEN + length))
}

/// Decodes exactly one frame occupying all of `buf`.
pub fn decode_frame(buf: &[u8], limits: &Limits) -> WireResult<Packet> {
    let (frame, consumed) = read_frame(buf, limits)?;
    if consumed != buf.len() {
        return Err(WireError::FrameLengthMismatch {
            declared: consumed - LENGTH_PREFIX_LEN,
            actual: buf.len() - LENGTH_PREFIX_LEN,
        });
    }
    frame.decode()
}

/// Iterates over back-to-back frames in a buffer.
///
/// Stops after the first error.
pub fn frames<'a>(
    buf: &'a [u8],
    limits: &'a Limits,
) -> impl Iterator<Item = WireResult<RawFrame<'a>>> + 'a {
    let mut rest = buf;
    let mut failed = false;
    std::iter::from_fn(move || {
        if failed || rest.is_empty() {
            return None;
        }
        match read_frame(rest, limits) {
            Ok((frame, consumed)) => {
                rest = &rest[consumed..];
                Some(Ok(frame))
            }
            Err(err) => {
                failed = true;
                Some(Err(err))
            }
        }
    })
}
