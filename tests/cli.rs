//! CLI surface: argument parsing and the init command.

use clap::Parser;
use std::path::PathBuf;

use shardgate::cli::commands::run_init;
use shardgate::cli::{Cli, Commands, InitArgs};
use shardgate::config::Config;

#[test]
fn gate_and_node_share_start_arguments() {
    let cli = Cli::parse_from(["shardgate", "gate", "--config", "custom.toml", "--log", "debug"]);
    match cli.command {
        Commands::Gate(args) => {
            assert_eq!(args.config, PathBuf::from("custom.toml"));
            assert_eq!(args.log.as_deref(), Some("debug"));
        }
        _ => panic!("expected gate command"),
    }

    let cli = Cli::parse_from(["shardgate", "node"]);
    match cli.command {
        Commands::Node(args) => {
            assert_eq!(args.config, PathBuf::from("config/shardgate.toml"));
            assert!(args.log.is_none());
        }
        _ => panic!("expected node command"),
    }
}

#[test]
fn init_writes_a_loadable_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf/shardgate.toml");

    run_init(InitArgs {
        path: path.clone(),
        force: false,
    })
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.node.id, 1);
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shardgate.toml");

    run_init(InitArgs {
        path: path.clone(),
        force: false,
    })
    .unwrap();
    assert!(run_init(InitArgs {
        path: path.clone(),
        force: false,
    })
    .is_err());
    assert!(run_init(InitArgs { path, force: true }).is_ok());
}
