//! Peer-to-peer transport for the distributed file storage node.
//!
//! Accepts TCP connections, runs a pluggable handshake on each one, decodes
//! framed messages and delivers them to the node through a single channel.
//!
//! ## Architecture
//!
//! - **TcpTransport**: Listener, accept loop and one task per connection
//! - **TcpPeer**: A live connection, inbound or outbound
//! - **Handshake / Decoder / OnPeer**: Capabilities injected by the node
//! - **Rpc**: A decoded message tagged with its origin address

pub mod codec;
pub mod config;
pub mod error;
pub mod handshake;
pub mod message;
pub mod peer;
pub mod transport;

pub use codec::{encode_frame, Decoder, LengthPrefixedDecoder, RawDecoder};
pub use config::TransportConfig;
pub use error::{P2pError, P2pResult};
pub use handshake::{Handshake, NopHandshake, NopOnPeer, OnPeer, PreambleHandshake};
pub use message::Rpc;
pub use peer::{Peer, TcpPeer};
pub use transport::{TcpTransport, Transport, TransportState};
