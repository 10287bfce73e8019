//! Inter-node RPC: routing math, wire types, client, and server.
//!
//! Every process exposes one RPC listener. Backend nodes answer `Dispatch`
//! (client traffic routed through a gateway); gateways answer `Receive`
//! (server pushes traveling back out to a connected client). The transport
//! is a length-prefixed bincode frame over TCP.

pub mod client;
pub mod selector;
pub mod server;

pub use client::NodeClient;
pub use selector::{Selection, Selector, ServerInfo};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io;
use std::pin::Pin;
use thiserror::Error;

use crate::codec::Message;
use crate::core::pool::Recycle;

/// Protocols below this are handled on the gateway itself; everything at or
/// above it is routed to a backend node.
pub const LOCAL_PROTOCOL_LIMIT: u16 = 100;

/// Client liveness ping, answered locally by the gateway.
pub const PROTOCOL_HEARTBEAT: u16 = 1;

/// Identity binding, answered locally by the gateway.
pub const PROTOCOL_LOGIN: u16 = 2;

/// Gateways occupy server ids 1..=999, which all derive to this group.
pub const GATE_GROUP_ID: u32 = 1;

/// Group a protocol id routes to. Protocols 1000..=1999 belong to group 2,
/// 2000..=2999 to group 3, and so on.
pub fn group_for_protocol(protocol: u16) -> u32 {
    protocol as u32 / 1000 + 1
}

/// Group a server id belongs to, by the same derivation.
pub fn group_for_server(server_id: u32) -> u32 {
    server_id / 1000 + 1
}

/// Find the server id in `server_ids` that belongs to `group_id`, or 0 if
/// the identity has never been routed to that group. Group `g` owns ids in
/// `[g*1000 - 1000, g*1000 - 1]`.
pub fn server_in_group(group_id: u32, server_ids: &[u32]) -> u32 {
    let max = group_id * 1000 - 1;
    let min = (group_id - 1) * 1000;
    server_ids
        .iter()
        .copied()
        .find(|id| (min..=max).contains(id))
        .unwrap_or(0)
}

/// Response error codes carried in the message header `Code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    Success = 0,
    ProtocolNotFound = 1,
    IdentityNotBound = 2,
    RemoteCallFailed = 3,
    DecodeFailed = 4,
    EncodeFailed = 5,
    SessionNotFound = 6,
    PushFailed = 7,
}

impl ErrorCode {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// RPC response envelope. `code` and `flag` flow back into the message
/// header of the reply the gateway packs for the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resp {
    pub code: u16,
    pub flag: u16,
    pub body: Vec<u8>,
}

impl Resp {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            ..Self::default()
        }
    }

    pub fn with_body(body: Vec<u8>) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }
}

/// Identity bound to a client session at login and carried on every routed
/// call. `server_ids` records the sticky replica per group, including the
/// owning gateway's own id (group 1), which is how a node finds its way
/// back for pushes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub account_id: String,
    pub role_id: u64,
    pub server_id: u32,
    pub real_server_id: u32,
    pub server_ids: Vec<u32>,
}

impl Recycle for Player {
    fn recycle(&mut self) {
        self.account_id.clear();
        self.role_id = 0;
        self.server_id = 0;
        self.real_server_id = 0;
        self.server_ids.clear();
    }
}

/// Payload of every inter-node call: the client message plus the identity
/// it belongs to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcMessage {
    pub data: Message,
    pub player: Player,
}

/// Where a call should land. A nonzero `id` pins the call to that exact
/// replica; `id == 0` asks the selector for a fresh pick within the group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteHint {
    pub id: u32,
    pub group_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcMethod {
    /// Gateway-to-node: handle a routed client message.
    Dispatch,
    /// Node-to-gateway: push a message out to a connected client.
    Receive,
}

impl RpcMethod {
    pub fn name(self) -> &'static str {
        match self {
            RpcMethod::Dispatch => "Dispatch",
            RpcMethod::Receive => "Receive",
        }
    }
}

/// On-wire request frame, bincode inside a u32 length prefix.
#[derive(Debug, Serialize, Deserialize)]
pub struct WireRequest {
    pub method: RpcMethod,
    pub message: RpcMessage,
}

/// Response of a completed call. `chosen_id` is the replica that served it,
/// so fresh picks can be recorded for stickiness.
#[derive(Debug)]
pub struct CallReply {
    pub resp: Resp,
    pub chosen_id: u32,
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("no replica available in group {group}")]
    NoReplica { group: u32 },
    #[error("connect to {0} timed out")]
    ConnectTimeout(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("request encode failed: {0}")]
    Encode(String),
    #[error("response decode failed: {0}")]
    Decode(String),
    #[error("push rejected with code {0}")]
    PushRejected(u16),
}

/// Outbound call seam. The gateway holds this as a trait object so tests
/// can observe routing without a live backend.
pub trait RpcCaller: Send + Sync + 'static {
    fn call(
        &self,
        hint: RouteHint,
        method: RpcMethod,
        message: RpcMessage,
    ) -> Pin<Box<dyn Future<Output = Result<CallReply, RpcError>> + Send + '_>>;
}
