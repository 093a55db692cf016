//! Transport configuration.

use crate::codec::{Decoder, LengthPrefixedDecoder};
use crate::handshake::{Handshake, NopHandshake, NopOnPeer, OnPeer};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default depth of the delivery channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default number of back-to-back decode failures tolerated on one connection.
pub const DEFAULT_MAX_DECODE_FAILURES: u32 = 8;

/// Default time allowed for the handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a [`TcpTransport`](crate::transport::TcpTransport).
///
/// The transport takes ownership of the configuration, so it cannot change
/// once the transport exists.
#[derive(Clone)]
pub struct TransportConfig {
    /// Address to bind the listener on, as `host:port`.
    pub listen_addr: String,
    pub handshake: Arc<dyn Handshake>,
    pub decoder: Arc<dyn Decoder>,
    pub on_peer: Arc<dyn OnPeer>,
    /// Depth of the delivery channel. Handlers wait when it is full.
    pub channel_capacity: usize,
    /// Upper bound on live connections, accepted and dialed together; `None`
    /// means unbounded. `Some(0)` is rejected by `listen_and_accept`.
    pub max_connections: Option<usize>,
    /// Consecutive decode failures before a connection is dropped; `0` never drops.
    pub max_decode_failures: u32,
    /// Time allowed for the handshake; `None` waits forever.
    pub handshake_timeout: Option<Duration>,
    /// Pause after a failed `accept` before trying again.
    pub accept_error_backoff: Duration,
}

impl TransportConfig {
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            ..Self::default()
        }
    }

    pub fn with_handshake(mut self, handshake: impl Handshake) -> Self {
        self.handshake = Arc::new(handshake);
        self
    }

    pub fn with_decoder(mut self, decoder: impl Decoder) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    pub fn with_on_peer(mut self, on_peer: impl OnPeer) -> Self {
        self.on_peer = Arc::new(on_peer);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_max_connections(mut self, max: Option<usize>) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_max_decode_failures(mut self, max: u32) -> Self {
        self.max_decode_failures = max;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_accept_error_backoff(mut self, backoff: Duration) -> Self {
        self.accept_error_backoff = backoff;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:0".to_string(),
            handshake: Arc::new(NopHandshake),
            decoder: Arc::new(LengthPrefixedDecoder::default()),
            on_peer: Arc::new(NopOnPeer),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_connections: None,
            max_decode_failures: DEFAULT_MAX_DECODE_FAILURES,
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
            accept_error_backoff: Duration::from_secs(1),
        }
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("listen_addr", &self.listen_addr)
            .field("channel_capacity", &self.channel_capacity)
            .field("max_connections", &self.max_connections)
            .field("max_decode_failures", &self.max_decode_failures)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("accept_error_backoff", &self.accept_error_backoff)
            .finish_non_exhaustive()
    }
}
