//! Shardgate - unified CLI entrypoint.
//!
//! Usage:
//!   shardgate gate --config config/shardgate.toml
//!   shardgate node --config config/shardgate.toml
//!   shardgate init [path]

use anyhow::Result;
use clap::Parser;
use shardgate::cli::commands::{run_gate, run_init, run_node};
use shardgate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Gate(args) => run_gate(args).await,
        Commands::Node(args) => run_node(args).await,
        Commands::Init(args) => run_init(args),
    }
}
