//! Gate command - launches a client-facing gateway.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::error;

use crate::cli::args::StartArgs;
use crate::codec::Codec;
use crate::config::Config;
use crate::gate::{Gate, GateService};
use crate::pool::BufferPool;
use crate::rpc::selector::{topology_map, Selector};
use crate::rpc::{server, NodeClient};
use crate::telemetry;

pub async fn run_gate(args: StartArgs) -> Result<()> {
    let _log_handle = telemetry::init_tracing(args.log.as_deref())?;
    let config = Config::load(&args.config)?;

    let buffers = BufferPool::new();
    let codec = Codec::from_config(&config.codec, buffers);

    let selector = Arc::new(Selector::new());
    selector.update_servers(&topology_map(&config.topology));
    let caller = Arc::new(NodeClient::new(selector, &config.rpc));

    let gate = Arc::new(Gate::new(&config, codec.clone(), caller));

    // Push surface for backend nodes
    let rpc_listener = TcpListener::bind(&config.node.rpc_listen)
        .await
        .with_context(|| format!("failed to bind rpc listener {}", config.node.rpc_listen))?;
    let service = Arc::new(GateService::new(codec, gate.sessions().clone()));
    tokio::spawn(async move {
        if let Err(err) = server::serve(rpc_listener, service).await {
            error!(%err, "rpc listener failed");
        }
    });

    let listener = TcpListener::bind(&config.gate.listen)
        .await
        .with_context(|| format!("failed to bind gate listener {}", config.gate.listen))?;
    gate.run(listener).await
}
