//! Client-facing gateway.
//!
//! The gateway terminates client TCP connections, unpacks wire frames, and
//! handles each message either locally (heartbeat, login) or by routing it
//! to a backend node. It also answers the `Receive` RPC method so nodes can
//! push messages back out through it.

mod forward;
pub mod handlers;
pub mod registry;
pub mod server;
pub mod session;
pub mod worker;

pub use registry::SessionRegistry;
pub use server::GateService;
pub use session::{run_heartbeat, HeartbeatMonitor, HeartbeatVerdict, Session};
pub use worker::WorkerPool;

use std::sync::Arc;
use std::time::Duration;

use crate::codec::{Codec, Message};
use crate::core::config::Config;
use crate::core::pool::TypedPool;
use crate::core::time::SystemClock;
use crate::rpc::{Player, RpcCaller};

const PLAYER_POOL_CAPACITY: usize = 1024;
const MESSAGE_POOL_CAPACITY: usize = 1024;

pub struct Gate {
    node_id: u32,
    encrypt: bool,
    codec: Codec,
    sessions: Arc<SessionRegistry>,
    caller: Arc<dyn RpcCaller>,
    workers: WorkerPool,
    players: TypedPool<Player>,
    messages: TypedPool<Message>,
    heartbeat_interval: Duration,
    heartbeat_max_retries: u32,
    clock: SystemClock,
}

impl Gate {
    pub fn new(config: &Config, codec: Codec, caller: Arc<dyn RpcCaller>) -> Self {
        Self {
            node_id: config.node.id,
            encrypt: config.codec.encrypt,
            codec,
            sessions: Arc::new(SessionRegistry::new()),
            caller,
            workers: WorkerPool::new(config.gate.worker_pool_size),
            players: TypedPool::new(PLAYER_POOL_CAPACITY),
            messages: TypedPool::new(MESSAGE_POOL_CAPACITY),
            heartbeat_interval: config.heartbeat.interval(),
            heartbeat_max_retries: config.heartbeat.effective_max_retries(config.develop),
            clock: SystemClock,
        }
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }
}
