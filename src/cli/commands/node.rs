//! Node command - launches a backend node.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::cli::args::StartArgs;
use crate::config::Config;
use crate::node::handlers::{EchoHandler, PROTOCOL_ECHO};
use crate::node::{CallContext, DispatchRegistry, NodeServer};
use crate::telemetry;

pub async fn run_node(args: StartArgs) -> Result<()> {
    let _log_handle = telemetry::init_tracing(args.log.as_deref())?;
    let config = Config::load(&args.config)?;

    let registry = DispatchRegistry::builder(CallContext {
        node_id: config.node.id,
        node_version: config.node.version,
    })
    .register(PROTOCOL_ECHO, "Echo", EchoHandler)
    .map_err(|e| anyhow::anyhow!("handler registration failed: {e}"))?
    .build();

    let node = NodeServer::new(
        config.node.id,
        config.node.name.clone(),
        config.node.version,
        Arc::new(registry),
    );

    let listener = TcpListener::bind(&config.node.rpc_listen)
        .await
        .with_context(|| format!("failed to bind rpc listener {}", config.node.rpc_listen))?;
    node.serve(listener).await
}
