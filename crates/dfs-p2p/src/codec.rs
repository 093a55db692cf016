//! Frame decoders.
//!
//! A [`Decoder`] pulls exactly one logical message off a connection. The
//! default [`LengthPrefixedDecoder`] reads a 4-byte big-endian length header
//! followed by the body; [`encode_frame`] produces the same layout for
//! senders. [`RawDecoder`] hands back whatever the next read returns.

use crate::error::{P2pError, P2pResult};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Maximum single frame size (16 MB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Largest up-front allocation for a frame body.
const INITIAL_BODY_CAPACITY: usize = 64 * 1024;

/// Read buffer size used by [`RawDecoder`].
pub const DEFAULT_READ_BUFFER: usize = 1028;

/// Reads one message from a byte stream.
///
/// Implementations must leave the stream positioned at the start of the next
/// message. Errors for which [`P2pError::is_fatal`] is false are treated as
/// local to the current message.
#[async_trait]
pub trait Decoder: Send + Sync + 'static {
    async fn decode(&self, reader: &mut (dyn AsyncRead + Unpin + Send)) -> P2pResult<Bytes>;
}

/// 4-byte big-endian length prefix followed by the body.
#[derive(Debug, Clone)]
pub struct LengthPrefixedDecoder {
    max_frame_size: u32,
}

impl LengthPrefixedDecoder {
    pub fn new(max_frame_size: u32) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }
}

impl Default for LengthPrefixedDecoder {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

#[async_trait]
impl Decoder for LengthPrefixedDecoder {
    async fn decode(&self, reader: &mut (dyn AsyncRead + Unpin + Send)) -> P2pResult<Bytes> {
        let mut header = [0u8; 4];
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(P2pError::ConnectionClosed);
            }
            Err(e) => return Err(P2pError::Io(e)),
        }

        let len = decode_length(&header);
        if len > self.max_frame_size {
            // Skip the oversized body so the next call starts on a frame boundary.
            let mut body = (&mut *reader).take(len as u64);
            let skipped = tokio::io::copy(&mut body, &mut tokio::io::sink()).await?;
            if skipped < len as u64 {
                return Err(P2pError::ConnectionClosed);
            }
            return Err(P2pError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        // Allocate as the body arrives, not from the header.
        let mut body = Vec::with_capacity((len as usize).min(INITIAL_BODY_CAPACITY));
        let read = (&mut *reader).take(len as u64).read_to_end(&mut body).await?;
        if read < len as usize {
            return Err(P2pError::ConnectionClosed);
        }
        Ok(Bytes::from(body))
    }
}

/// Pass-through decoder: the payload is whatever a single read returns.
#[derive(Debug, Clone)]
pub struct RawDecoder {
    buffer_size: usize,
}

impl RawDecoder {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }
}

impl Default for RawDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_READ_BUFFER)
    }
}

#[async_trait]
impl Decoder for RawDecoder {
    async fn decode(&self, reader: &mut (dyn AsyncRead + Unpin + Send)) -> P2pResult<Bytes> {
        let mut buf = BytesMut::zeroed(self.buffer_size);
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(P2pError::ConnectionClosed);
        }
        buf.truncate(n);
        Ok(buf.freeze())
    }
}

/// Encode a payload as a length-prefixed frame.
pub fn encode_frame(payload: &[u8]) -> P2pResult<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| P2pError::FrameTooLarge {
        size: u32::MAX,
        max: MAX_FRAME_SIZE,
    })?;
    let mut bytes = Vec::with_capacity(4 + payload.len());
    bytes.extend_from_slice(&len.to_be_bytes());
    bytes.extend_from_slice(payload);
    Ok(bytes)
}

/// Decode the length prefix from a 4-byte header.
pub fn decode_length(header: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*header)
}
