//! Clap CLI definitions for the storage node.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const AFTER_HELP: &str = "\
\x1b[1;36mExamples:\x1b[0m
  dfs-node run                              Listen with ~/.dfs/config.toml
  dfs-node run --listen 0.0.0.0:4000        Override the listen address
  dfs-node run --bootstrap 10.0.0.2:3000    Dial a peer after start-up
  dfs-node send --to 127.0.0.1:3000 hello   Send one framed message";

/// Distributed file storage node.
#[derive(Parser, Debug)]
#[command(
    name = "dfs-node",
    version,
    about = "Distributed file storage node",
    after_help = AFTER_HELP,
)]
pub struct Cli {
    /// Path to config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the node: listen for peers and log every message received.
    Run {
        /// Address to listen on (overrides the config file).
        #[arg(long)]
        listen: Option<String>,
        /// Peers to dial once listening (added to the config file's list).
        #[arg(long)]
        bootstrap: Vec<String>,
    },
    /// Connect to a node and send messages as length-prefixed frames.
    Send {
        /// Address of the receiving node.
        #[arg(long)]
        to: String,
        /// 4-byte preamble expected by the receiver (overrides the config file).
        #[arg(long)]
        preamble: Option<String>,
        /// Messages to send, one frame each.
        #[arg(required = true)]
        messages: Vec<String>,
    },
}
