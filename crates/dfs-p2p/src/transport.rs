//! TCP transport that accepts connections and funnels decoded messages to the node.
//!
//! [`TcpTransport::listen_and_accept`] binds the configured address and spawns
//! the accept loop. Every connection, accepted or dialed, gets its own task
//! which runs the handshake, notifies the node through [`OnPeer`], then
//! decodes messages until the connection ends. All tasks push [`Rpc`]s into
//! one bounded channel whose receiving half is handed out by
//! [`Transport::consume`].
//!
//! [`OnPeer`]: crate::handshake::OnPeer

use crate::config::TransportConfig;
use crate::error::{P2pError, P2pResult};
use crate::message::Rpc;
use crate::peer::{Peer, TcpPeer};

use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Anything that moves messages between nodes (TCP, UDP, websockets, ...).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Bind and start accepting connections in the background.
    async fn listen_and_accept(&self) -> P2pResult<()>;

    /// Take the receiving side of the delivery channel.
    ///
    /// Returns `None` once the receiver has already been taken.
    fn consume(&self) -> Option<mpsc::Receiver<Rpc>>;

    /// Open an outbound connection and serve it like an accepted one.
    async fn dial(&self, addr: &str) -> P2pResult<SocketAddr>;

    /// Stop accepting and tear down live connections.
    async fn close(&self) -> P2pResult<()>;
}

/// Lifecycle of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Constructed, not bound yet.
    Created,
    /// Bound, accept loop running.
    Listening,
    /// Shut down.
    Closed,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Listening => write!(f, "listening"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// State shared by the accept loop and every connection task.
struct Shared {
    config: TransportConfig,
    rpc_tx: mpsc::Sender<Rpc>,
    shutdown: watch::Receiver<bool>,
    connection_limit: Option<Arc<Semaphore>>,
}

struct Lifecycle {
    state: TransportState,
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
}

/// TCP implementation of [`Transport`].
pub struct TcpTransport {
    shared: Arc<Shared>,
    rpc_rx: Mutex<Option<mpsc::Receiver<Rpc>>>,
    shutdown_tx: watch::Sender<bool>,
    lifecycle: Mutex<Lifecycle>,
}

impl TcpTransport {
    /// Create a transport. The delivery channel exists from this point on.
    pub fn new(config: TransportConfig) -> Self {
        let (rpc_tx, rpc_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connection_limit = config
            .max_connections
            .map(|max| Arc::new(Semaphore::new(max)));

        Self {
            shared: Arc::new(Shared {
                config,
                rpc_tx,
                shutdown: shutdown_rx,
                connection_limit,
            }),
            rpc_rx: Mutex::new(Some(rpc_rx)),
            shutdown_tx,
            lifecycle: Mutex::new(Lifecycle {
                state: TransportState::Created,
                local_addr: None,
                accept_task: None,
            }),
        }
    }

    /// The configured listen address.
    pub fn listen_addr(&self) -> &str {
        &self.shared.config.listen_addr
    }

    /// The actual bound address (useful when binding to port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle().local_addr
    }

    pub fn state(&self) -> TransportState {
        self.lifecycle().state
    }

    /// Reserve a slot for a dialed connection without waiting.
    fn try_reserve_connection(&self) -> P2pResult<Option<OwnedSemaphorePermit>> {
        let Some(limit) = &self.shared.connection_limit else {
            return Ok(None);
        };
        Arc::clone(limit).try_acquire_owned().map(Some).map_err(|_| {
            P2pError::ConnectionLimitReached(self.shared.config.max_connections.unwrap_or(0))
        })
    }

    fn lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn listen_and_accept(&self) -> P2pResult<()> {
        let state = self.state();
        if state != TransportState::Created {
            return Err(P2pError::InvalidState(format!(
                "cannot listen while {state}"
            )));
        }
        if self.shared.config.max_connections == Some(0) {
            return Err(P2pError::InvalidState(
                "max_connections must be at least 1".into(),
            ));
        }

        let addr = self.shared.config.listen_addr.as_str();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| P2pError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let mut lifecycle = self.lifecycle();
        if lifecycle.state != TransportState::Created {
            // Lost a race with another listen or close; `listener` drops here.
            return Err(P2pError::InvalidState(format!(
                "cannot listen while {}",
                lifecycle.state
            )));
        }

        info!(address = %local_addr, "transport listening");
        let shared = Arc::clone(&self.shared);
        lifecycle.accept_task = Some(tokio::spawn(accept_loop(listener, shared)));
        lifecycle.local_addr = Some(local_addr);
        lifecycle.state = TransportState::Listening;
        Ok(())
    }

    fn consume(&self) -> Option<mpsc::Receiver<Rpc>> {
        self.rpc_rx.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    async fn dial(&self, addr: &str) -> P2pResult<SocketAddr> {
        if self.state() == TransportState::Closed {
            return Err(P2pError::InvalidState("cannot dial while closed".into()));
        }

        let permit = self.try_reserve_connection()?;
        let stream = TcpStream::connect(addr).await?;
        let remote = stream.peer_addr()?;
        info!(peer = %remote, "dialed peer");

        let shared = Arc::clone(&self.shared);
        tokio::spawn(handle_conn(shared, stream, remote, true, permit));
        Ok(remote)
    }

    async fn close(&self) -> P2pResult<()> {
        let accept_task = {
            let mut lifecycle = self.lifecycle();
            if lifecycle.state == TransportState::Closed {
                return Ok(());
            }
            lifecycle.state = TransportState::Closed;
            lifecycle.accept_task.take()
        };

        info!("transport shutting down");
        let _ = self.shutdown_tx.send(true);

        if let Some(task) = accept_task {
            if let Err(e) = task.await {
                error!(error = %e, "accept loop panicked");
            }
        }
        Ok(())
    }
}

/// Resolves once shutdown is requested or the transport is dropped.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Accept connections until shutdown, spawning one task per connection.
async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    let mut shutdown = shared.shutdown.clone();

    loop {
        let permit = match &shared.connection_limit {
            Some(limit) => {
                let limit = Arc::clone(limit);
                tokio::select! {
                    _ = wait_for_shutdown(&mut shutdown) => break,
                    permit = limit.acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => break,
                    },
                }
            }
            None => None,
        };

        let accepted = tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, addr)) => {
                debug!(peer = %addr, "accepted connection");
                let shared = Arc::clone(&shared);
                tokio::spawn(handle_conn(shared, stream, addr, false, permit));
            }
            Err(e) => {
                error!(error = %e, "accept error");
                tokio::select! {
                    _ = wait_for_shutdown(&mut shutdown) => break,
                    _ = tokio::time::sleep(shared.config.accept_error_backoff) => {}
                }
            }
        }
    }

    info!("accept loop stopped");
}

/// Serve one connection from handshake to close.
///
/// `_permit` holds the connection's slot under `max_connections` until the
/// task ends.
async fn handle_conn(
    shared: Arc<Shared>,
    stream: TcpStream,
    addr: SocketAddr,
    outbound: bool,
    _permit: Option<OwnedSemaphorePermit>,
) {
    let mut peer = TcpPeer::new(stream, addr, outbound);
    let mut shutdown = shared.shutdown.clone();

    let result = tokio::select! {
        _ = wait_for_shutdown(&mut shutdown) => Ok(()),
        result = serve_peer(&shared, &mut peer) => result,
    };

    match result {
        Ok(()) => debug!(peer = %addr, "dropping peer connection"),
        Err(e) => debug!(peer = %addr, error = %e, "dropping peer connection"),
    }
    if let Err(e) = peer.close().await {
        debug!(peer = %addr, error = %e, "error while closing connection");
    }
}

async fn serve_peer(shared: &Shared, peer: &mut TcpPeer) -> P2pResult<()> {
    let addr = peer.remote_addr();

    if let Err(e) = shake_hands(shared, peer).await {
        warn!(peer = %addr, error = %e, "handshake failed");
        return Err(e);
    }

    if let Err(e) = shared.config.on_peer.on_peer(&*peer) {
        warn!(peer = %addr, error = %e, "peer rejected by node");
        return Err(e);
    }

    info!(peer = %addr, outbound = peer.is_outbound(), "peer connected");
    read_loop(shared, peer).await
}

async fn shake_hands(shared: &Shared, peer: &mut TcpPeer) -> P2pResult<()> {
    let handshake = shared.config.handshake.shake(peer);
    match shared.config.handshake_timeout {
        Some(limit) => tokio::time::timeout(limit, handshake)
            .await
            .map_err(|_| P2pError::HandshakeTimeout)?,
        None => handshake.await,
    }
}

/// Decode messages until the connection ends.
///
/// A clean remote close returns `Ok`. Non-fatal decode errors are skipped
/// until `max_decode_failures` of them arrive back to back.
async fn read_loop(shared: &Shared, peer: &mut TcpPeer) -> P2pResult<()> {
    let from = peer.remote_addr();
    let max_failures = shared.config.max_decode_failures;
    let mut failures = 0u32;

    loop {
        let decoded = shared.config.decoder.decode(peer.stream_mut()?).await;
        match decoded {
            Ok(payload) => {
                failures = 0;
                shared
                    .rpc_tx
                    .send(Rpc { from, payload })
                    .await
                    .map_err(|_| P2pError::ChannelClosed)?;
            }
            Err(P2pError::ConnectionClosed) => return Ok(()),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                failures += 1;
                warn!(peer = %from, error = %e, failures, "failed to decode message");
                if max_failures > 0 && failures >= max_failures {
                    return Err(P2pError::TooManyDecodeFailures(failures));
                }
                tokio::task::yield_now().await;
            }
        }
    }
}
