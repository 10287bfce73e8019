//! Gateway accept loop, per-connection plumbing, and the push service.

use anyhow::Result;
use bytes::BytesMut;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::session::{run_heartbeat, HeartbeatMonitor, Session};
use super::{Gate, SessionRegistry};
use crate::codec::crypto::Cipher;
use crate::codec::{Codec, Message};
use crate::core::pool::PooledBuf;
use crate::core::time::Clock;
use crate::rpc::server::RpcService;
use crate::rpc::{ErrorCode, Resp, RpcMessage, RpcMethod};

const OUTBOUND_QUEUE_DEPTH: usize = 64;
const READ_CHUNK: usize = 4096;

impl Gate {
    /// Accept client connections until the listener fails.
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        info!(addr = %listener.local_addr()?, "gate listening");
        loop {
            let (stream, peer) = listener.accept().await?;
            let gate = self.clone();
            tokio::spawn(async move {
                gate.handle_connection(stream, peer).await;
            });
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let (mut reader, mut writer) = stream.into_split();
        let (outbound, mut outbound_rx) = mpsc::channel::<PooledBuf>(OUTBOUND_QUEUE_DEPTH);
        let session = Arc::new(Session::new(peer, outbound, self.clock.now()));

        if !self.sessions.insert(session.clone()) {
            warn!(remote = %peer, "connection rejected, address already registered");
            return;
        }
        debug!(remote = %peer, "session opened");

        // Writer task: owns the write half. Frames return to the buffer
        // pool when dropped after the write completes. The task holds a
        // session handle, so it must exit on the close signal rather than
        // on sender drop.
        let writer_session = session.clone();
        tokio::spawn(async move {
            let mut close_rx = writer_session.close_rx();
            loop {
                tokio::select! {
                    frame = outbound_rx.recv() => {
                        let Some(frame) = frame else { break };
                        if let Err(err) = writer.write_all(&frame).await {
                            debug!(remote = %writer_session.remote_addr(), %err, "write failed");
                            writer_session.request_close();
                            break;
                        }
                    }
                    _ = close_rx.changed() => break,
                }
            }
        });

        tokio::spawn(run_heartbeat(
            session.clone(),
            self.clock.clone(),
            HeartbeatMonitor::new(self.heartbeat_interval, self.heartbeat_max_retries),
        ));

        let mut inbound = BytesMut::with_capacity(READ_CHUNK);
        let mut close_rx = session.close_rx();
        loop {
            tokio::select! {
                read = reader.read_buf(&mut inbound) => match read {
                    Ok(0) => break,
                    Ok(_) => {
                        if !Self::drain_inbound(&self, &session, &mut inbound).await {
                            break;
                        }
                    }
                    Err(err) => {
                        debug!(remote = %peer, %err, "read failed");
                        break;
                    }
                },
                _ = close_rx.changed() => break,
            }
        }

        self.close_session(&session);
    }

    /// Decode and hand off every complete frame. Returns `false` when the
    /// connection must close because of a payload error; messages decoded
    /// before the error are still handled.
    async fn drain_inbound(gate: &Arc<Self>, session: &Arc<Session>, inbound: &mut BytesMut) -> bool {
        let cipher = session.cipher();
        let unpacked = gate
            .codec
            .unpack(inbound, cipher.as_deref().map(|c| c as &dyn Cipher));

        for message in unpacked.messages {
            let gate_task = gate.clone();
            let session = session.clone();
            gate.workers
                .spawn(async move {
                    gate_task.handle_message(&session, &message).await;
                })
                .await;
        }

        if let Some(err) = unpacked.error {
            error!(remote = %session.remote_addr(), %err, "closing session on payload error");
            return false;
        }
        true
    }

    async fn handle_message(&self, session: &Arc<Session>, message: &Message) {
        let resp = self.forward(session, message).await;
        // pooled reply; recycled once packed and dropped
        let mut reply = self.messages.take();
        reply.head.len = resp.body.len() as u16;
        reply.head.flag = resp.flag;
        reply.head.sn = message.head.sn;
        reply.head.code = resp.code;
        reply.head.protocol = message.head.protocol;
        reply.body.extend_from_slice(&resp.body);

        let cipher = session.cipher();
        let frame = match self
            .codec
            .pack(&reply, cipher.as_deref().map(|c| c as &dyn Cipher))
        {
            Ok(frame) => frame,
            Err(err) => {
                error!(
                    remote = %session.remote_addr(),
                    protocol = message.head.protocol,
                    %err,
                    "reply pack failed"
                );
                return;
            }
        };
        if session.send(frame).await.is_err() {
            debug!(remote = %session.remote_addr(), "reply dropped, session closing");
        }
    }

    /// Idempotent teardown: the first caller unregisters the session and
    /// releases its identity.
    fn close_session(&self, session: &Arc<Session>) {
        if !session.begin_close() {
            return;
        }
        session.request_close();
        self.sessions.remove(session);
        session.unbind_player();
        info!(remote = %session.remote_addr(), "session closed");
    }
}

/// RPC surface of a gateway: answers `Receive` by packing the pushed
/// message for the target client's session. `Dispatch` does not exist on a
/// gateway.
pub struct GateService {
    codec: Codec,
    sessions: Arc<SessionRegistry>,
}

impl GateService {
    pub fn new(codec: Codec, sessions: Arc<SessionRegistry>) -> Self {
        Self { codec, sessions }
    }

    async fn receive(&self, message: RpcMessage) -> Resp {
        let role_id = message.player.role_id;
        let Some(session) = self.sessions.find_role(role_id) else {
            warn!(role_id, "push target not connected");
            return Resp::error(ErrorCode::SessionNotFound);
        };

        let cipher = session.cipher();
        let frame = match self
            .codec
            .pack(&message.data, cipher.as_deref().map(|c| c as &dyn Cipher))
        {
            Ok(frame) => frame,
            Err(err) => {
                warn!(role_id, %err, "push pack failed");
                return Resp::error(ErrorCode::PushFailed);
            }
        };
        if session.send(frame).await.is_err() {
            warn!(role_id, "push dropped, session closing");
            return Resp::error(ErrorCode::PushFailed);
        }
        Resp::ok()
    }
}

impl RpcService for GateService {
    fn handle(
        &self,
        method: RpcMethod,
        message: RpcMessage,
    ) -> Pin<Box<dyn Future<Output = Resp> + Send + '_>> {
        Box::pin(async move {
            match method {
                RpcMethod::Receive => self.receive(message).await,
                RpcMethod::Dispatch => Resp::error(ErrorCode::ProtocolNotFound),
            }
        })
    }
}
