//! Async frame I/O over a byte stream.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use wire::{
    encode_frame, frame_length, split_frame, Limits, Packet, WireError, LENGTH_PREFIX_LEN,
};

/// Frame transport failures.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// The stream ended inside a frame.
    #[error("connection closed mid-frame")]
    UnexpectedEof,
}

/// A frame read off the stream, body not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    pub tag: u32,
    pub body: Vec<u8>,
}

impl OwnedFrame {
    pub fn decode(&self) -> Result<Packet, WireError> {
        Packet::decode(self.tag, &self.body)
    }
}

/// Reads one frame.
///
/// Returns `Ok(None)` when the peer closes cleanly at a frame boundary. The
/// length prefix is validated against `limits` before the frame is
/// allocated.
pub async fn read_frame<R>(
    reader: &mut R,
    limits: &Limits,
) -> Result<Option<OwnedFrame>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(TransportError::UnexpectedEof)
            };
        }
        filled += n;
    }

    let length = frame_length(prefix, limits)?;
    let mut chunk = vec![0u8; length];
    reader.read_exact(&mut chunk).await.map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            TransportError::UnexpectedEof
        } else {
            TransportError::Io(err)
        }
    })?;

    let frame = split_frame(&chunk)?;
    Ok(Some(OwnedFrame {
        tag: frame.tag,
        body: frame.body.to_vec(),
    }))
}

/// Encodes and writes one packet, then flushes.
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_frame(packet)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
