//! Game-side client for the management channel.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;
use wire::{GrantAchievement, Handshake, HandshakeResponse, Limits, Packet, PacketKind};

use crate::config::DEFAULT_MANAGEMENT_PORT;
use crate::transport::{read_frame, write_packet, TransportError};

/// Client-side failures.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("launcher closed the connection")]
    Closed,

    #[error("expected {expected:?} but launcher sent {actual:?}")]
    UnexpectedPacket {
        expected: PacketKind,
        actual: PacketKind,
    },
}

/// Address of a launcher on this machine.
pub fn local_launcher() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], DEFAULT_MANAGEMENT_PORT))
}

/// A game's connection to the launcher.
#[derive(Debug)]
pub struct ManagementClient<S = TcpStream> {
    stream: S,
    limits: Limits,
}

impl ManagementClient<TcpStream> {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await.map_err(ClientError::Connect)?;
        stream.set_nodelay(true).map_err(ClientError::Connect)?;
        Ok(Self::from_stream(stream))
    }
}

impl<S> ManagementClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn from_stream(stream: S) -> Self {
        Self {
            stream,
            limits: Limits::default(),
        }
    }

    /// Sends a handshake and returns the launcher's view of the session.
    pub async fn handshake(&mut self, game_id: &str) -> Result<HandshakeResponse, ClientError> {
        let request = Packet::from(Handshake {
            game_id: game_id.to_owned(),
        });
        write_packet(&mut self.stream, &request).await?;
        match self.next_packet().await? {
            Packet::HandshakeResponse(response) => Ok(response),
            other => Err(ClientError::UnexpectedPacket {
                expected: PacketKind::HandshakeResponse,
                actual: other.kind(),
            }),
        }
    }

    /// Requests an achievement and waits for the launcher's `Ack`.
    ///
    /// The launcher sends nothing back when the grant fails, so callers
    /// should bound this with a timeout.
    pub async fn grant_achievement(&mut self, achievement_id: &str) -> Result<(), ClientError> {
        let request = Packet::from(GrantAchievement {
            achievement_id: achievement_id.to_owned(),
        });
        write_packet(&mut self.stream, &request).await?;
        match self.next_packet().await? {
            Packet::Ack(_) => Ok(()),
            other => Err(ClientError::UnexpectedPacket {
                expected: PacketKind::Ack,
                actual: other.kind(),
            }),
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    async fn next_packet(&mut self) -> Result<Packet, ClientError> {
        loop {
            let frame = read_frame(&mut self.stream, &self.limits)
                .await?
                .ok_or(ClientError::Closed)?;
            match frame.decode() {
                Ok(packet) => return Ok(packet),
                Err(wire::WireError::UnknownPacketType { tag }) => {
                    debug!(tag, "skipping unknown packet");
                }
                Err(err) => return Err(TransportError::Wire(err).into()),
            }
        }
    }
}
