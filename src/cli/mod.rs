//! Shardgate CLI - unified command-line interface.
//!
//! Provides a single binary entry point for:
//! - `shardgate gate` - Start a client-facing gateway
//! - `shardgate node` - Start a backend node
//! - `shardgate init` - Write a sample configuration

mod args;
pub mod commands;

pub use args::{Cli, Commands, InitArgs, StartArgs};
