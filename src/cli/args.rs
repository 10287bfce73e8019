//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Shardgate - sharded multiplayer-game gateway and backend node.
#[derive(Parser)]
#[command(name = "shardgate")]
#[command(version)]
#[command(about = "Shardgate gateway and backend node")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a client-facing gateway
    Gate(StartArgs),

    /// Start a backend node
    Node(StartArgs),

    /// Write a sample configuration file
    Init(InitArgs),
}

#[derive(Args)]
pub struct StartArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/shardgate.toml")]
    pub config: PathBuf,

    /// Log filter directive, overrides the default `info`
    #[arg(long)]
    pub log: Option<String>,
}

#[derive(Args)]
pub struct InitArgs {
    /// Where to write the sample configuration
    #[arg(default_value = "config/shardgate.toml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}
