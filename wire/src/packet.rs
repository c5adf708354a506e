//! Management packet definitions and tag dispatch.

use datastream::{DataReader, DataResult, DataWriter};

use crate::error::{WireError, WireResult};

/// Packet type tags.
///
/// Tags are part of the wire format: once assigned they never change, and new
/// packets only ever take fresh values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
#[repr(u32)]
pub enum PacketKind {
    Handshake = 0,
    HandshakeResponse = 1,
    Ack = 2,
    GrantAchievement = 3,
}

impl PacketKind {
    /// Parses a packet kind from a raw type tag.
    pub const fn parse(tag: u32) -> Result<Self, WireError> {
        match tag {
            0 => Ok(Self::Handshake),
            1 => Ok(Self::HandshakeResponse),
            2 => Ok(Self::Ack),
            3 => Ok(Self::GrantAchievement),
            _ => Err(WireError::UnknownPacketType { tag }),
        }
    }

    /// Returns the raw type tag.
    #[must_use]
    pub const fn tag(self) -> u32 {
        self as u32
    }

    /// Returns a stable human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Handshake => "handshake",
            Self::HandshakeResponse => "handshake_response",
            Self::Ack => "ack",
            Self::GrantAchievement => "grant_achievement",
        }
    }
}

/// A typed management packet body.
pub trait ManagementPacket: Sized {
    /// The stable tag this packet is framed with.
    const KIND: PacketKind;

    /// Writes the packet's fields (no length prefix or tag).
    fn serialize(&self, writer: &mut DataWriter) -> DataResult<()>;

    /// Reads the packet's fields (no length prefix or tag).
    fn deserialize(reader: &mut DataReader<'_>) -> DataResult<Self>;
}

/// First packet on every connection, sent by the game.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Handshake {
    /// Informational only; it is not a credential.
    pub game_id: String,
}

/// Launcher reply to a [`Handshake`] describing the login session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HandshakeResponse {
    pub is_logged_in: bool,
    /// Present only when `is_logged_in` is set.
    pub username: Option<String>,
}

/// Empty acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ack;

/// Request to grant an achievement to the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GrantAchievement {
    pub achievement_id: String,
}

impl HandshakeResponse {
    /// Response for a launcher with nobody logged in.
    #[must_use]
    pub const fn logged_out() -> Self {
        Self {
            is_logged_in: false,
            username: None,
        }
    }

    /// Response for a launcher with `username` logged in.
    #[must_use]
    pub fn logged_in(username: impl Into<String>) -> Self {
        Self {
            is_logged_in: true,
            username: Some(username.into()),
        }
    }
}

impl ManagementPacket for Handshake {
    const KIND: PacketKind = PacketKind::Handshake;

    fn serialize(&self, writer: &mut DataWriter) -> DataResult<()> {
        writer.write_string(&self.game_id)
    }

    fn deserialize(reader: &mut DataReader<'_>) -> DataResult<Self> {
        Ok(Self {
            game_id: reader.read_string()?,
        })
    }
}

impl ManagementPacket for HandshakeResponse {
    const KIND: PacketKind = PacketKind::HandshakeResponse;

    fn serialize(&self, writer: &mut DataWriter) -> DataResult<()> {
        writer.write_bool(self.is_logged_in);
        writer.write_prefixed_optional(self.username.as_deref(), DataWriter::write_string)
    }

    fn deserialize(reader: &mut DataReader<'_>) -> DataResult<Self> {
        let is_logged_in = reader.read_bool()?;
        let username = reader.read_prefixed_optional(DataReader::read_string)?;
        Ok(Self {
            is_logged_in,
            username,
        })
    }
}

impl ManagementPacket for Ack {
    const KIND: PacketKind = PacketKind::Ack;

    fn serialize(&self, _writer: &mut DataWriter) -> DataResult<()> {
        Ok(())
    }

    fn deserialize(_reader: &mut DataReader<'_>) -> DataResult<Self> {
        Ok(Self)
    }
}

impl ManagementPacket for GrantAchievement {
    const KIND: PacketKind = PacketKind::GrantAchievement;

    fn serialize(&self, writer: &mut DataWriter) -> DataResult<()> {
        writer.write_string(&self.achievement_id)
    }

    fn deserialize(reader: &mut DataReader<'_>) -> DataResult<Self> {
        Ok(Self {
            achievement_id: reader.read_string()?,
        })
    }
}

/// Any decoded management packet.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Packet {
    Handshake(Handshake),
    HandshakeResponse(HandshakeResponse),
    Ack(Ack),
    GrantAchievement(GrantAchievement),
}

impl Packet {
    /// Returns the packet's kind.
    #[must_use]
    pub const fn kind(&self) -> PacketKind {
        match self {
            Self::Handshake(_) => PacketKind::Handshake,
            Self::HandshakeResponse(_) => PacketKind::HandshakeResponse,
            Self::Ack(_) => PacketKind::Ack,
            Self::GrantAchievement(_) => PacketKind::GrantAchievement,
        }
    }

    /// Serializes the packet body (no length prefix or tag).
    pub fn encode_body(&self, writer: &mut DataWriter) -> WireResult<()> {
        match self {
            Self::Handshake(p) => p.serialize(writer),
            Self::HandshakeResponse(p) => p.serialize(writer),
            Self::Ack(p) => p.serialize(writer),
            Self::GrantAchievement(p) => p.serialize(writer),
        }
        .map_err(WireError::from)
    }

    /// Decodes a packet body for the given type tag.
    ///
    /// Unknown tags fail with [`WireError::UnknownPacketType`] without
    /// touching the body, so callers can skip the frame.
    pub fn decode(tag: u32, body: &[u8]) -> WireResult<Self> {
        let kind = PacketKind::parse(tag)?;
        let mut reader = DataReader::new(body);
        let packet = match kind {
            PacketKind::Handshake => Self::Handshake(Handshake::deserialize(&mut reader)?),
            PacketKind::HandshakeResponse => {
                Self::HandshakeResponse(HandshakeResponse::deserialize(&mut reader)?)
            }
            PacketKind::Ack => Self::Ack(Ack::deserialize(&mut reader)?),
            PacketKind::GrantAchievement => {
                Self::GrantAchievement(GrantAchievement::deserialize(&mut reader)?)
            }
        };
        if !reader.is_empty() {
            return Err(WireError::TrailingBytes {
                tag,
                remaining: reader.remaining(),
            });
        }
        Ok(packet)
    }
}

impl From<Handshake> for Packet {
    fn from(packet: Handshake) -> Self {
        Self::Handshake(packet)
    }
}

impl From<HandshakeResponse> for Packet {
    fn from(packet: HandshakeResponse) -> Self {
        Self::HandshakeResponse(packet)
    }
}

impl From<Ack> for Packet {
    fn from(packet: Ack) -> Self {
        Self::Ack(packet)
    }
}

impl From<GrantAchievement> for Packet {
    fn from(packet: GrantAchievement) -> Self {
        Self::GrantAchievement(packet)
    }
}
