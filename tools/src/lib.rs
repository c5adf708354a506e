//! Inspection and debugging tools for the management channel.
//!
//! This crate works on captured byte streams (for example a dump of one TCP
//! direction) and turns them into something a person can read:
//!
//! - Walk frame boundaries and report tags and sizes
//! - Decode every frame into JSON
//!
//! # Design Principles
//!
//! - **Report, don't stop** - A bad frame is described in the output; only a
//!   broken length prefix ends the walk.
//! - **Human-readable output** - Make it easy to see what a game sent.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use wire::{Limits, PacketKind, RawFrame, WireError};

/// One frame found in a captured stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSummary {
    /// Byte offset of the length prefix.
    pub offset: usize,
    /// Bytes on the wire including the prefix.
    pub wire_len: usize,
    pub tag: u32,
    /// `None` for tags this build does not know.
    pub kind: Option<&'static str>,
    pub body_len: usize,
    /// Why the body failed to decode, if it did.
    pub error: Option<String>,
}

/// Result of walking a captured stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub total_bytes: usize,
    pub frames: Vec<FrameSummary>,
    /// Set when framing failed; `unread_bytes` starts at that point.
    pub framing_error: Option<String>,
    pub unread_bytes: usize,
}

impl InspectReport {
    pub fn is_clean(&self) -> bool {
        self.framing_error.is_none() && self.frames.iter().all(|frame| frame.error.is_none())
    }
}

/// Walks back-to-back frames in `bytes`.
pub fn inspect_frames(bytes: &[u8], limits: &Limits) -> InspectReport {
    let mut offset = 0;
    let mut frames = Vec::new();
    let mut framing_error = None;
    while offset < bytes.len() {
        match wire::read_frame(&bytes[offset..], limits) {
            Ok((frame, consumed)) => {
                frames.push(summarize(&frame, offset, consumed));
                offset += consumed;
            }
            Err(err) => {
                framing_error = Some(err.to_string());
                break;
            }
        }
    }
    InspectReport {
        total_bytes: bytes.len(),
        frames,
        framing_error,
        unread_bytes: bytes.len() - offset,
    }
}

fn summarize(frame: &RawFrame<'_>, offset: usize, wire_len: usize) -> FrameSummary {
    let error = match frame.decode() {
        Ok(_) | Err(WireError::UnknownPacketType { .. }) => None,
        Err(err) => Some(err.to_string()),
    };
    FrameSummary {
        offset,
        wire_len,
        tag: frame.tag,
        kind: PacketKind::parse(frame.tag).ok().map(PacketKind::name),
        body_len: frame.body.len(),
        error,
    }
}

/// Decodes every frame in `bytes` into a JSON array.
///
/// Unknown tags become `{"type": "unknown", ...}` entries so the rest of the
/// stream is still shown. Any other error aborts.
pub fn decode_frames_json(bytes: &[u8], limits: &Limits) -> Result<Value> {
    let mut packets = Vec::new();
    for (index, frame) in wire::frames(bytes, limits).enumerate() {
        let frame = frame.with_context(|| format!("frame {index}"))?;
        let value = match frame.decode() {
            Ok(packet) => serde_json::to_value(&packet).context("serialize packet")?,
            Err(WireError::UnknownPacketType { tag }) => json!({
                "type": "unknown",
                "tag": tag,
                "body_len": frame.body.len(),
            }),
            Err(err) => return Err(err).with_context(|| format!("decode frame {index}")),
        };
        packets.push(value);
    }
    Ok(Value::Array(packets))
}

/// Renders a report as indented text.
pub fn format_inspect_pretty(report: &InspectReport) -> String {
    let mut out = format!(
        "{} bytes, {} frames\n",
        report.total_bytes,
        report.frames.len()
    );
    for frame in &report.frames {
        let kind = frame.kind.unwrap_or("unknown");
        out.push_str(&format!(
            "  @{:<6} {kind} (tag {}) body {} bytes",
            frame.offset, frame.tag, frame.body_len
        ));
        if let Some(error) = &frame.error {
            out.push_str(&format!(" [error: {error}]"));
        }
        out.push('\n');
    }
    if let Some(error) = &report.framing_error {
        out.push_str(&format!(
            "framing stopped: {error} ({} bytes unread)\n",
            report.unread_bytes
        ));
    }
    out
}
