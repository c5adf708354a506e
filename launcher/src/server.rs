//! Management channel server.
//!
//! Games connect over loopback TCP. Every connection starts in
//! `AwaitingHandshake`; only a [`Handshake`] moves it to `Authenticated`, after
//! which achievement grants are served until the peer disconnects.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, info_span, warn, Instrument};
use wire::{Ack, Handshake, HandshakeResponse, Limits, Packet, PacketKind, WireError};

use crate::remote::RemoteCatalog;
use crate::session::Session;
use crate::transport::{read_frame, write_packet, TransportError};

/// Why a connection was closed.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A frame could not be framed or decoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl From<TransportError> for ConnectionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(err) => Self::Io(err),
            TransportError::Wire(err) => Self::Wire(err),
            TransportError::UnexpectedEof => Self::Io(io::ErrorKind::UnexpectedEof.into()),
        }
    }
}

#[derive(Debug)]
enum ConnectionState {
    AwaitingHandshake,
    Authenticated { game_id: String },
}

/// Serves management connections from running games.
#[derive(Clone)]
pub struct ManagementServer {
    session: Arc<Session>,
    remote: Arc<dyn RemoteCatalog>,
    limits: Limits,
}

impl std::fmt::Debug for ManagementServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementServer")
            .field("session", &self.session)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl ManagementServer {
    pub fn new(session: Arc<Session>, remote: Arc<dyn RemoteCatalog>, limits: Limits) -> Self {
        Self {
            session,
            remote,
            limits,
        }
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Each connection runs in its own task; accept errors are logged and the
    /// loop keeps going.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let local = listener.local_addr()?;
        info!(addr = %local, "management server listening");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!(addr = %local, "management server stopping");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer),
                    Err(err) => warn!(error = %err, "accept failed"),
                },
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let server = self.clone();
        let span = info_span!("connection", %peer);
        tokio::spawn(
            async move {
                debug!("accepted");
                match server.serve_connection(stream).await {
                    Ok(()) => debug!("closed"),
                    Err(err) => warn!(error = %err, "connection failed"),
                }
            }
            .instrument(span),
        );
    }

    /// Runs the per-connection state machine until the peer closes.
    pub async fn serve_connection<S>(&self, mut stream: S) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut state = ConnectionState::AwaitingHandshake;
        while let Some(frame) = read_frame(&mut stream, &self.limits).await? {
            if matches!(state, ConnectionState::AwaitingHandshake)
                && frame.tag != PacketKind::Handshake.tag()
            {
                return Err(ConnectionError::ProtocolViolation(format!(
                    "expected handshake, got packet type {}",
                    frame.tag
                )));
            }

            let packet = match frame.decode() {
                Ok(packet) => packet,
                Err(WireError::UnknownPacketType { tag }) => {
                    warn!(tag, "skipping unknown packet");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            match packet {
                Packet::Handshake(Handshake { game_id }) => {
                    let response = self.handshake_response();
                    info!(%game_id, logged_in = response.is_logged_in, "handshake");
                    write_packet(&mut stream, &response.into()).await?;
                    state = ConnectionState::Authenticated { game_id };
                }
                Packet::GrantAchievement(request) => match &state {
                    ConnectionState::Authenticated { game_id } => {
                        if self.grant(game_id, &request.achievement_id).await {
                            write_packet(&mut stream, &Packet::Ack(Ack)).await?;
                        }
                    }
                    ConnectionState::AwaitingHandshake => {
                        return Err(ConnectionError::ProtocolViolation(
                            "achievement grant before handshake".into(),
                        ));
                    }
                },
                Packet::HandshakeResponse(_) | Packet::Ack(_) => {
                    debug!(tag = frame.tag, "ignoring launcher-bound packet");
                }
            }
        }
        Ok(())
    }

    fn handshake_response(&self) -> HandshakeResponse {
        self.session
            .current_user()
            .map_or_else(HandshakeResponse::logged_out, |account| {
                HandshakeResponse::logged_in(account.username)
            })
    }

    /// Grants an achievement to the logged-in user. Failures are logged and
    /// reported as `false`; the game gets no acknowledgement.
    async fn grant(&self, game_id: &str, achievement_id: &str) -> bool {
        let Some(account) = self.session.current_user() else {
            warn!(game_id, achievement_id, "achievement grant without a logged-in user");
            return false;
        };
        match self
            .remote
            .grant_achievement(achievement_id, &account.id)
            .await
        {
            Ok(()) => {
                info!(game_id, achievement_id, user_id = %account.id, "achievement granted");
                true
            }
            Err(err) => {
                warn!(game_id, achievement_id, error = %err, "achievement grant failed");
                false
            }
        }
    }
}
