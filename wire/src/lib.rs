//! Management channel wire format for the Serble launcher.
//!
//! Games talk to the launcher over a loopback TCP stream carrying
//! length-prefixed frames. This crate owns the packet catalogue and the
//! framing; it does not know about sockets, sessions or installs.
//!
//! # Design Principles
//!
//! - **Stable tags** - Packet type tags are never reused or renumbered.
//! - **Bounded decoding** - Length prefixes are validated against [`Limits`]
//!   before any allocation.
//! - **Strict bodies** - A body must be consumed exactly by its packet.
//!
//! See `WIRE_FORMAT.md` for the byte-level layout.
//!
//! ```
//! use wire::{decode_frame, encode_frame, Handshake, Limits, Packet};
//!
//! let packet = Packet::from(Handshake { game_id: "demo".into() });
//! let bytes = encode_frame(&packet).unwrap();
//! assert_eq!(decode_frame(&bytes, &Limits::default()).unwrap(), packet);
//! ```

mod error;
mod frame;
mod limits;
mod packet;

pub use error::{LimitKind, WireError, WireResult};
pub use frame::{
    decode_frame, encode_frame, encode_frame_into, frame_length, frames, read_frame, split_frame,
    RawFrame, LENGTH_PREFIX_LEN, TAG_LEN,
};
pub use limits::Limits;
pub use packet::{
    Ack, GrantAchievement, Handshake, HandshakeResponse, ManagementPacket, Packet, PacketKind,
};
