//! RPC client used by gateways (Dispatch) and nodes (Receive).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::server::MAX_RPC_FRAME;
use super::{CallReply, Resp, RouteHint, RpcCaller, RpcError, RpcMessage, RpcMethod, WireRequest};
use crate::core::config::{FailMode, RpcClientConfig};
use crate::rpc::selector::Selector;

/// Connect-per-call RPC client. Selection happens on every attempt, so a
/// failover retry can land on a different replica when the hint is fresh.
pub struct NodeClient {
    selector: Arc<Selector>,
    connect_timeout: Duration,
    fail_mode: FailMode,
    retries: u32,
    backup_latency: Duration,
}

impl NodeClient {
    pub fn new(selector: Arc<Selector>, config: &RpcClientConfig) -> Self {
        Self {
            selector,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            fail_mode: config.fail_mode,
            retries: config.retries,
            backup_latency: Duration::from_millis(config.backup_latency_ms),
        }
    }

    async fn call_once(
        &self,
        hint: RouteHint,
        method: RpcMethod,
        message: &RpcMessage,
    ) -> Result<CallReply, RpcError> {
        let selection = self
            .selector
            .select(&hint)
            .ok_or(RpcError::NoReplica { group: hint.group_id })?;

        let connect = TcpStream::connect(&selection.address);
        let mut stream = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| RpcError::ConnectTimeout(selection.address.clone()))??;

        let request = WireRequest {
            method,
            message: message.clone(),
        };
        let payload = bincode::serialize(&request).map_err(|e| RpcError::Encode(e.to_string()))?;
        stream.write_all(&(payload.len() as u32).to_be_bytes()).await?;
        stream.write_all(&payload).await?;

        let mut len_bytes = [0u8; 4];
        stream.read_exact(&mut len_bytes).await?;
        let len = u32::from_be_bytes(len_bytes) as usize;
        if len > MAX_RPC_FRAME {
            return Err(RpcError::Decode(format!(
                "response frame {len} exceeds {MAX_RPC_FRAME} bytes"
            )));
        }
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await?;
        let resp: Resp =
            bincode::deserialize(&body).map_err(|e| RpcError::Decode(e.to_string()))?;

        Ok(CallReply {
            resp,
            chosen_id: selection.id,
        })
    }
}

impl RpcCaller for NodeClient {
    fn call(
        &self,
        hint: RouteHint,
        method: RpcMethod,
        message: RpcMessage,
    ) -> Pin<Box<dyn Future<Output = Result<CallReply, RpcError>> + Send + '_>> {
        Box::pin(async move {
            let attempts = match self.fail_mode {
                FailMode::Failfast => 1,
                FailMode::Failover => self.retries.max(1),
            };

            let mut last_err = None;
            for attempt in 0..attempts {
                if attempt > 0 {
                    tokio::time::sleep(self.backup_latency).await;
                }
                match self.call_once(hint, method, &message).await {
                    Ok(reply) => return Ok(reply),
                    Err(err) => {
                        debug!(
                            method = method.name(),
                            group = hint.group_id,
                            attempt,
                            %err,
                            "rpc attempt failed"
                        );
                        last_err = Some(err);
                    }
                }
            }
            Err(last_err.unwrap_or(RpcError::NoReplica { group: hint.group_id }))
        })
    }
}
