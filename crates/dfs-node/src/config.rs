//! Configuration loading from `~/.dfs/config.toml` with defaults.
//!
//! Every key is optional. A missing file means defaults; a file that cannot be
//! read or parsed is logged and also falls back to defaults.

use dfs_p2p::codec::MAX_FRAME_SIZE;
use dfs_p2p::config::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_DECODE_FAILURES};
use dfs_p2p::{
    LengthPrefixedDecoder, P2pResult, PreambleHandshake, RawDecoder, TransportConfig,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Which frame decoder the node uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderKind {
    #[default]
    LengthPrefixed,
    Raw,
}

/// Node configuration as read from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub listen_addr: String,
    pub channel_capacity: usize,
    pub max_connections: Option<usize>,
    /// `0` tolerates decode failures forever.
    pub max_decode_failures: u32,
    /// `0` disables the handshake timeout.
    pub handshake_timeout_secs: u64,
    /// 4-character protocol preamble; absent means no handshake.
    pub preamble: Option<String>,
    pub decoder: DecoderKind,
    pub max_frame_size: u32,
    /// Peers dialed once the node is listening.
    pub bootstrap: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_connections: None,
            max_decode_failures: DEFAULT_MAX_DECODE_FAILURES,
            handshake_timeout_secs: 10,
            preamble: None,
            decoder: DecoderKind::LengthPrefixed,
            max_frame_size: MAX_FRAME_SIZE,
            bootstrap: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Build the transport configuration. The peer hook is left as a no-op.
    pub fn transport_config(&self) -> P2pResult<TransportConfig> {
        let timeout = match self.handshake_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let mut config = TransportConfig::new(self.listen_addr.clone())
            .with_channel_capacity(self.channel_capacity)
            .with_max_connections(self.max_connections)
            .with_max_decode_failures(self.max_decode_failures)
            .with_handshake_timeout(timeout);

        config = match self.decoder {
            DecoderKind::LengthPrefixed => {
                config.with_decoder(LengthPrefixedDecoder::new(self.max_frame_size))
            }
            DecoderKind::Raw => config.with_decoder(RawDecoder::default()),
        };

        if let Some(preamble) = &self.preamble {
            config = config.with_handshake(PreambleHandshake::from_str_magic(preamble)?);
        }
        Ok(config)
    }
}

/// Load node configuration from a TOML file, with defaults.
pub fn load_config(path: Option<&Path>) -> NodeConfig {
    let config_path = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path);

    if !config_path.exists() {
        info!(
            path = %config_path.display(),
            "Config file not found, using defaults"
        );
        return NodeConfig::default();
    }

    let contents = match std::fs::read_to_string(&config_path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(
                error = %e,
                path = %config_path.display(),
                "Failed to read config file, using defaults"
            );
            return NodeConfig::default();
        }
    };

    match toml::from_str::<NodeConfig>(&contents) {
        Ok(config) => {
            info!(path = %config_path.display(), "Loaded configuration");
            config
        }
        Err(e) => {
            warn!(
                error = %e,
                path = %config_path.display(),
                "Failed to parse config, using defaults"
            );
            NodeConfig::default()
        }
    }
}

/// Default config location: `~/.dfs/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".dfs")
        .join("config.toml")
}
