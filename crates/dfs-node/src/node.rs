//! The node itself: wires the transport, drains its messages, and a small
//! client for pushing frames at another node.

use crate::config::NodeConfig;

use dfs_p2p::{
    encode_frame, Handshake, P2pError, P2pResult, Peer, PreambleHandshake, Rpc, TcpPeer,
    TcpTransport, Transport,
};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Called for every peer that passed the handshake.
fn on_peer(peer: &dyn Peer) -> P2pResult<()> {
    info!(
        peer = %peer.remote_addr(),
        outbound = peer.is_outbound(),
        "new peer"
    );
    Ok(())
}

/// A node that is listening and draining its transport.
pub struct RunningNode {
    pub transport: TcpTransport,
    /// Resolves to the total number of messages once the channel closes.
    pub consumer: JoinHandle<usize>,
    /// Messages consumed so far.
    pub delivered: watch::Receiver<usize>,
}

/// Start listening and dial the bootstrap peers.
pub async fn start(config: &NodeConfig) -> P2pResult<RunningNode> {
    let transport = TcpTransport::new(config.transport_config()?.with_on_peer(on_peer));
    let rx = transport
        .consume()
        .ok_or_else(|| P2pError::InvalidState("delivery channel already taken".into()))?;
    let (delivered_tx, delivered) = watch::channel(0);
    let consumer = tokio::spawn(consume_loop(rx, delivered_tx));

    transport.listen_and_accept().await?;
    info!(address = ?transport.local_addr(), "node running");

    for addr in &config.bootstrap {
        match transport.dial(addr).await {
            Ok(remote) => info!(peer = %remote, "connected to bootstrap peer"),
            Err(e) => warn!(peer = %addr, error = %e, "failed to dial bootstrap peer"),
        }
    }

    Ok(RunningNode {
        transport,
        consumer,
        delivered,
    })
}

/// Run until Ctrl+C, then shut the transport down.
pub async fn run(config: NodeConfig) -> P2pResult<()> {
    let RunningNode {
        transport,
        consumer,
        delivered,
    } = start(&config).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
    }
    info!("shutting down");
    transport.close().await?;
    drop(transport);

    match consumer.await {
        Ok(count) => info!(messages = count, "node stopped"),
        Err(e) => warn!(error = %e, messages = *delivered.borrow(), "consumer task failed"),
    }
    Ok(())
}

/// Drain the delivery channel until every sender is gone.
async fn consume_loop(mut rx: mpsc::Receiver<Rpc>, delivered: watch::Sender<usize>) -> usize {
    let mut count = 0;
    while let Some(rpc) = rx.recv().await {
        count += 1;
        info!(from = %rpc.from, bytes = rpc.payload.len(), "{rpc}");
        delivered.send_replace(count);
    }
    count
}

/// Dial `to`, run the preamble if one is given, and send each message as a frame.
pub async fn send(to: &str, preamble: Option<&str>, messages: &[String]) -> P2pResult<()> {
    let stream = TcpStream::connect(to).await?;
    let remote = stream.peer_addr()?;
    let mut peer = TcpPeer::new(stream, remote, true);

    if let Some(magic) = preamble {
        PreambleHandshake::from_str_magic(magic)?
            .shake(&mut peer)
            .await?;
    }

    for message in messages {
        peer.send(&encode_frame(message.as_bytes())?).await?;
    }
    info!(peer = %remote, count = messages.len(), "messages sent");
    peer.close().await
}
