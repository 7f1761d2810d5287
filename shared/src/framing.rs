//! Length-prefixed bincode framing over TCP.
//!
//! Each frame is a u16 big-endian length followed by a bincode payload.
//! Parse failures are surfaced to the caller, which closes the connection;
//! a partial or malformed frame is never partially acted upon.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Upper bound on a single frame payload. Anything larger is hostile.
pub const MAX_FRAME_LENGTH: usize = 4096;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds limit")]
    Oversized(usize),
    #[error("malformed payload: {0}")]
    Malformed(#[from] bincode::Error),
    #[error("peer closed the connection")]
    Closed,
}

/// Reads one frame and decodes its payload.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, FrameError>
where
    R: AsyncReadExt + Unpin,
    T: DeserializeOwned,
{
    let mut len_bytes = [0u8; 2];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::Closed)
        }
        Err(e) => return Err(FrameError::Io(e)),
    }

    let len = u16::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LENGTH {
        return Err(FrameError::Oversized(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(bincode::deserialize(&payload)?)
}

/// Encodes a packet and writes it as a single frame.
pub async fn write_frame<W, T>(writer: &mut W, packet: &T) -> Result<(), FrameError>
where
    W: AsyncWriteExt + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(packet)?;
    if payload.len() > MAX_FRAME_LENGTH {
        return Err(FrameError::Oversized(payload.len()));
    }

    let len = (payload.len() as u16).to_be_bytes();
    writer.write_all(&len).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ClientPacket;
    use std::io::Cursor;

    #[tokio::test]
    async fn frame_roundtrip() {
        let packet = ClientPacket::Ping {
            sequence: 9,
            latency: 45,
        };

        let mut buffer = Vec::new();
        write_frame(&mut buffer, &packet).await.unwrap();

        let mut cursor = Cursor::new(buffer);
        let back: ClientPacket = read_frame(&mut cursor).await.unwrap();

        match back {
            ClientPacket::Ping { sequence, latency } => {
                assert_eq!(sequence, 9);
                assert_eq!(latency, 45);
            }
            _ => panic!("wrong packet variant"),
        }
    }

    #[tokio::test]
    async fn oversized_length_rejected() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&(u16::MAX).to_be_bytes());
        buffer.extend_from_slice(&[0u8; 16]);

        let mut cursor = Cursor::new(buffer);
        let result: Result<ClientPacket, _> = read_frame(&mut cursor).await;
        assert!(matches!(result, Err(FrameError::Oversized(_))));
    }

    #[tokio::test]
    async fn truncated_stream_reports_closed() {
        let mut cursor = Cursor::new(Vec::new());
        let result: Result<ClientPacket, _> = read_frame(&mut cursor).await;
        assert!(matches!(result, Err(FrameError::Closed)));
    }

    #[tokio::test]
    async fn garbage_payload_is_malformed() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&4u16.to_be_bytes());
        buffer.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);

        let mut cursor = Cursor::new(buffer);
        let result: Result<ClientPacket, _> = read_frame(&mut cursor).await;
        assert!(matches!(result, Err(FrameError::Malformed(_))));
    }
}
