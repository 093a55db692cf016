//! Error types for the transport layer.

use std::net::SocketAddr;
use thiserror::Error;

/// Errors from the transport layer.
#[derive(Debug, Error)]
pub enum P2pError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("Handshake timed out")]
    HandshakeTimeout,
    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Peer {addr} rejected: {reason}")]
    PeerRejected { addr: SocketAddr, reason: String },
    #[error("Invalid transport state: {0}")]
    InvalidState(String),
    #[error("Too many consecutive decode failures ({0})")]
    TooManyDecodeFailures(u32),
    #[error("Delivery channel closed")]
    ChannelClosed,
    #[error("Connection limit reached ({0} live connections)")]
    ConnectionLimitReached(usize),
}

impl P2pError {
    /// Whether this error ends the connection it occurred on.
    ///
    /// Anything else is local to a single message and the read loop keeps
    /// going on the same connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            P2pError::Io(_)
                | P2pError::ConnectionClosed
                | P2pError::ChannelClosed
                | P2pError::TooManyDecodeFailures(_)
        )
    }
}

/// Alias for transport results.
pub type P2pResult<T> = Result<T, P2pError>;
