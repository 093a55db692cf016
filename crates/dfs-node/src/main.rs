//! dfs-node: a distributed file storage node.
//!
//! `run` listens for peers and logs every message the transport delivers;
//! `send` pushes framed messages at a running node.

mod cli;
mod config;
mod node;

use crate::cli::{Cli, Commands};
use clap::Parser;

fn init_tracing_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing_stderr();

    let mut node_config = config::load_config(cli.config.as_deref());

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create Tokio runtime");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run { listen, bootstrap } => {
            if let Some(listen) = listen {
                node_config.listen_addr = listen;
            }
            node_config.bootstrap.extend(bootstrap);
            rt.block_on(node::run(node_config))
        }
        Commands::Send {
            to,
            preamble,
            messages,
        } => {
            let preamble = preamble.or(node_config.preamble);
            rt.block_on(node::send(&to, preamble.as_deref(), &messages))
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "dfs-node failed");
        std::process::exit(1);
    }
}
