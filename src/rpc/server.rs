//! RPC listener shared by gateways and nodes.

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use super::{Resp, RpcMessage, RpcMethod, WireRequest};

/// Upper bound on a single RPC frame, request or response.
pub const MAX_RPC_FRAME: usize = 16 * 1024 * 1024;

/// Method-level handler behind the RPC listener. The gateway implements
/// `Receive`, nodes implement `Dispatch`; the other method answers with an
/// error response.
pub trait RpcService: Send + Sync + 'static {
    fn handle(
        &self,
        method: RpcMethod,
        message: RpcMessage,
    ) -> Pin<Box<dyn Future<Output = Resp> + Send + '_>>;
}

/// Accept loop. Each connection serves sequential calls until the peer
/// closes or sends a malformed frame.
pub async fn serve<S: RpcService>(listener: TcpListener, service: Arc<S>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "rpc connection accepted");
        let service = service.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_conn(stream, service).await {
                warn!(%peer, %err, "rpc connection ended with error");
            }
        });
    }
}

async fn handle_conn<S: RpcService>(mut stream: TcpStream, service: Arc<S>) -> Result<()> {
    loop {
        let mut len_bytes = [0u8; 4];
        match stream.read_exact(&mut len_bytes).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_be_bytes(len_bytes) as usize;
        anyhow::ensure!(len <= MAX_RPC_FRAME, "rpc frame {len} exceeds {MAX_RPC_FRAME}");

        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await?;
        let request: WireRequest = match bincode::deserialize(&payload) {
            Ok(request) => request,
            Err(err) => {
                warn!(%err, "dropping rpc connection on undecodable request");
                return Ok(());
            }
        };

        let resp = service.handle(request.method, request.message).await;
        let encoded = bincode::serialize(&resp)?;
        stream.write_all(&(encoded.len() as u32).to_be_bytes()).await?;
        stream.write_all(&encoded).await?;
    }
}
