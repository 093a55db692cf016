//! The record delivered from the transport to the rest of the node.

use bytes::Bytes;
use std::fmt;
use std::net::SocketAddr;

/// One decoded message, tagged with the address it arrived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rpc {
    /// Remote endpoint of the connection the message was read from.
    pub from: SocketAddr,
    /// Decoded message body.
    pub payload: Bytes,
}

impl Rpc {
    pub fn new(from: SocketAddr, payload: impl Into<Bytes>) -> Self {
        Self {
            from,
            payload: payload.into(),
        }
    }
}

impl fmt::Display for Rpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.payload) {
            Ok(text) => write!(f, "{} -> {:?}", self.from, text),
            Err(_) => write!(f, "{} -> <{} bytes>", self.from, self.payload.len()),
        }
    }
}
