//! Backend node: dispatch registry, RPC surface, and the push path back
//! through the owning gateway.

pub mod dispatch;
pub mod handlers;

pub use dispatch::{
    CallContext, DispatchRegistry, DispatchRegistryBuilder, HandlerError, ProtocolHandler,
    RegistryError,
};

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::codec::Message;
use crate::rpc::selector::metadata_string;
use crate::rpc::server::{serve, RpcService};
use crate::rpc::{
    group_for_server, server_in_group, ErrorCode, Player, Resp, RouteHint, RpcCaller, RpcError,
    RpcMessage, RpcMethod, GATE_GROUP_ID,
};

pub struct NodeServer {
    id: u32,
    name: String,
    version: u32,
    registry: Arc<DispatchRegistry>,
}

impl NodeServer {
    pub fn new(id: u32, name: String, version: u32, registry: Arc<DispatchRegistry>) -> Self {
        Self {
            id,
            name,
            version,
            registry,
        }
    }

    /// Metadata this node announces about itself.
    pub fn metadata(&self) -> String {
        metadata_string(self.id, group_for_server(self.id), self.version)
    }

    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        info!(
            addr = %listener.local_addr()?,
            node = %self.name,
            metadata = %self.metadata(),
            handlers = self.registry.len(),
            "node listening"
        );
        serve(listener, Arc::new(NodeService::new(self.registry))).await
    }
}

/// RPC surface of a node: `Dispatch` goes to the registry, `Receive` only
/// exists on gateways.
pub struct NodeService {
    registry: Arc<DispatchRegistry>,
}

impl NodeService {
    pub fn new(registry: Arc<DispatchRegistry>) -> Self {
        Self { registry }
    }
}

impl RpcService for NodeService {
    fn handle(
        &self,
        method: RpcMethod,
        message: RpcMessage,
    ) -> Pin<Box<dyn Future<Output = Resp> + Send + '_>> {
        Box::pin(async move {
            match method {
                RpcMethod::Dispatch => self.registry.dispatch(&message),
                RpcMethod::Receive => {
                    warn!("Receive called on a node");
                    Resp::error(ErrorCode::ProtocolNotFound)
                }
            }
        })
    }
}

/// Push a server-initiated message to a client through its owning gateway.
/// The gateway id is recorded in the identity's sticky server list at
/// login; without it there is nowhere to push to.
pub async fn push_to_gate(
    caller: &dyn RpcCaller,
    player: &Player,
    protocol: u16,
    body: Vec<u8>,
) -> Result<(), RpcError> {
    let gate_id = server_in_group(GATE_GROUP_ID, &player.server_ids);
    if gate_id == 0 {
        return Err(RpcError::NoReplica {
            group: GATE_GROUP_ID,
        });
    }

    let message = RpcMessage {
        // sn 0 marks a push
        data: Message::new(0, 0, 0, protocol, body),
        player: player.clone(),
    };
    let hint = RouteHint {
        id: gate_id,
        group_id: GATE_GROUP_ID,
    };
    let reply = caller.call(hint, RpcMethod::Receive, message).await?;
    if reply.resp.code != 0 {
        return Err(RpcError::PushRejected(reply.resp.code));
    }
    Ok(())
}
