//! Connection set-up hooks: the handshake and the peer-notification callback.
//!
//! Both run once per connection, in that order, before the read loop starts.
//! A failing [`Handshake`] drops the connection without ever notifying the
//! node; a failing [`OnPeer`] skips the read loop.

use crate::error::{P2pError, P2pResult};
use crate::peer::{Peer, TcpPeer};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Validates a freshly established connection.
#[async_trait]
pub trait Handshake: Send + Sync + 'static {
    async fn shake(&self, peer: &mut TcpPeer) -> P2pResult<()>;
}

/// Accepts every connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopHandshake;

#[async_trait]
impl Handshake for NopHandshake {
    async fn shake(&self, _peer: &mut TcpPeer) -> P2pResult<()> {
        Ok(())
    }
}

/// Exchanges a 4-byte protocol magic.
///
/// The dialing side writes the magic and waits for it to be echoed; the
/// accepting side reads it, rejects a mismatch, and echoes it back. This
/// identifies the protocol, it does not authenticate anybody.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreambleHandshake {
    magic: [u8; 4],
}

impl PreambleHandshake {
    pub fn new(magic: [u8; 4]) -> Self {
        Self { magic }
    }

    /// Build from a 4-character ASCII string such as `"DFS1"`.
    pub fn from_str_magic(magic: &str) -> P2pResult<Self> {
        let bytes: [u8; 4] = magic.as_bytes().try_into().map_err(|_| {
            P2pError::HandshakeFailed(format!("preamble must be exactly 4 bytes, got {magic:?}"))
        })?;
        Ok(Self::new(bytes))
    }

    pub fn magic(&self) -> [u8; 4] {
        self.magic
    }

    async fn read_magic(&self, peer: &mut TcpPeer) -> P2pResult<()> {
        let mut received = [0u8; 4];
        match peer.stream_mut()?.read_exact(&mut received).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(P2pError::ConnectionClosed);
            }
            Err(e) => return Err(P2pError::Io(e)),
        }
        if received != self.magic {
            return Err(P2pError::HandshakeFailed(format!(
                "preamble mismatch: expected {:?}, got {:?}",
                self.magic, received
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Handshake for PreambleHandshake {
    async fn shake(&self, peer: &mut TcpPeer) -> P2pResult<()> {
        if peer.is_outbound() {
            peer.send(&self.magic).await?;
            self.read_magic(peer).await?;
        } else {
            self.read_magic(peer).await?;
            peer.send(&self.magic).await?;
        }
        debug!(peer = %peer.remote_addr(), "preamble accepted");
        Ok(())
    }
}

/// Called once per peer that completed the handshake, before its read loop.
pub trait OnPeer: Send + Sync + 'static {
    fn on_peer(&self, peer: &dyn Peer) -> P2pResult<()>;
}

/// Ignores new peers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopOnPeer;

impl OnPeer for NopOnPeer {
    fn on_peer(&self, _peer: &dyn Peer) -> P2pResult<()> {
        Ok(())
    }
}

impl<F> OnPeer for F
where
    F: Fn(&dyn Peer) -> P2pResult<()> + Send + Sync + 'static,
{
    fn on_peer(&self, peer: &dyn Peer) -> P2pResult<()> {
        self(peer)
    }
}
