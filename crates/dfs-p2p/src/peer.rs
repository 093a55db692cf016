//! Peers: live connections to remote nodes.
//!
//! A [`TcpPeer`] owns its [`TcpStream`] exclusively. Once [`Peer::close`] has
//! run the stream is gone, and every later access fails with
//! [`P2pError::ConnectionClosed`] instead of touching a dead socket.

use crate::error::{P2pError, P2pResult};

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::trace;

/// A remote node on the other end of a connection.
#[async_trait]
pub trait Peer: Send + Sync {
    /// Address of the remote endpoint.
    fn remote_addr(&self) -> SocketAddr;

    /// `true` if we dialed the connection, `false` if we accepted it.
    fn is_outbound(&self) -> bool;

    /// Write raw bytes to the peer.
    async fn send(&mut self, bytes: &[u8]) -> P2pResult<()>;

    /// Release the underlying connection. Calling it again is a no-op.
    async fn close(&mut self) -> P2pResult<()>;
}

/// A peer over an established TCP connection.
#[derive(Debug)]
pub struct TcpPeer {
    stream: Option<TcpStream>,
    remote_addr: SocketAddr,
    outbound: bool,
}

impl TcpPeer {
    pub fn new(stream: TcpStream, remote_addr: SocketAddr, outbound: bool) -> Self {
        Self {
            stream: Some(stream),
            remote_addr,
            outbound,
        }
    }

    /// Borrow the live stream, e.g. to run a handshake or decode a frame.
    pub fn stream_mut(&mut self) -> P2pResult<&mut TcpStream> {
        self.stream.as_mut().ok_or(P2pError::ConnectionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

#[async_trait]
impl Peer for TcpPeer {
    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    fn is_outbound(&self) -> bool {
        self.outbound
    }

    async fn send(&mut self, bytes: &[u8]) -> P2pResult<()> {
        let stream = self.stream_mut()?;
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> P2pResult<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        trace!(peer = %self.remote_addr, "closing connection");
        // The socket is released when `stream` drops, even if shutdown fails.
        stream.shutdown().await?;
        Ok(())
    }
}
