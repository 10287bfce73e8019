//! Common test harness utilities for integration tests.
//!
//! Provides a test configuration builder, raw wire-frame helpers for
//! speaking the client protocol over a plain TcpStream, and a scriptable
//! RPC caller for driving the gateway without live backends.

// Not all test files use all helpers; silence dead_code warnings for unused exports.
#![allow(dead_code)]

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use shardgate::config::Config;
use shardgate::rpc::{CallReply, Resp, RouteHint, RpcCaller, RpcError, RpcMessage, RpcMethod};

/// Test configuration with ephemeral listeners and fast heartbeats.
pub fn test_config() -> Config {
    test_config_with(false)
}

/// Same configuration with per-session encryption switched on.
pub fn encrypted_test_config() -> Config {
    test_config_with(true)
}

fn test_config_with(encrypt: bool) -> Config {
    let doc = r#"
develop = false

[node]
id = 1
name = "gate-test"
version = 1
rpc_listen = "127.0.0.1:0"

[gate]
listen = "127.0.0.1:0"
worker_pool_size = 16

[codec]
compress = true
compress_threshold = 256
encrypt = false

[heartbeat]
interval_secs = 3
max_retries = 2
develop_max_retries = 1000
"#;
    let mut config: Config = toml::from_str(doc).expect("test config parses");
    config.codec.encrypt = encrypt;
    config
}

/// Write one uncompressed, unencrypted client frame.
pub async fn write_frame(stream: &mut TcpStream, sn: u32, protocol: u16, body: &[u8]) {
    let mut frame = Vec::with_capacity(12 + body.len());
    frame.extend_from_slice(&(body.len() as u16).to_be_bytes());
    frame.extend_from_slice(&0u16.to_be_bytes());
    frame.extend_from_slice(&sn.to_be_bytes());
    frame.extend_from_slice(&0u16.to_be_bytes());
    frame.extend_from_slice(&protocol.to_be_bytes());
    frame.extend_from_slice(body);
    stream.write_all(&frame).await.expect("write frame");
}

/// A decoded response frame.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame {
    pub len: u16,
    pub flag: u16,
    pub sn: u32,
    pub code: u16,
    pub protocol: u16,
    pub body: Vec<u8>,
}

/// Read one frame off the stream.
pub async fn read_frame(stream: &mut TcpStream) -> Frame {
    let mut head = [0u8; 12];
    stream.read_exact(&mut head).await.expect("read head");
    let len = u16::from_be_bytes([head[0], head[1]]);
    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await.expect("read body");
    Frame {
        len,
        flag: u16::from_be_bytes([head[2], head[3]]),
        sn: u32::from_be_bytes([head[4], head[5], head[6], head[7]]),
        code: u16::from_be_bytes([head[8], head[9]]),
        protocol: u16::from_be_bytes([head[10], head[11]]),
        body,
    }
}

/// Scriptable RPC caller: records every call's hint and replays queued
/// outcomes, repeating the last one when the queue runs dry.
pub struct MockCaller {
    pub hints: Mutex<Vec<RouteHint>>,
    outcomes: Mutex<Vec<Result<CallReply, RpcError>>>,
}

impl MockCaller {
    pub fn new() -> Self {
        Self {
            hints: Mutex::new(Vec::new()),
            outcomes: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_ok(&self, resp: Resp, chosen_id: u32) {
        self.outcomes
            .lock()
            .push(Ok(CallReply { resp, chosen_id }));
    }

    pub fn queue_err(&self) {
        self.outcomes
            .lock()
            .push(Err(RpcError::NoReplica { group: 0 }));
    }

    pub fn recorded_hints(&self) -> Vec<RouteHint> {
        self.hints.lock().clone()
    }
}

impl RpcCaller for MockCaller {
    fn call(
        &self,
        hint: RouteHint,
        _method: RpcMethod,
        _message: RpcMessage,
    ) -> Pin<Box<dyn Future<Output = Result<CallReply, RpcError>> + Send + '_>> {
        Box::pin(async move {
            self.hints.lock().push(hint);
            let mut outcomes = self.outcomes.lock();
            let outcome = if outcomes.len() > 1 {
                outcomes.remove(0)
            } else {
                match outcomes.first() {
                    Some(Ok(reply)) => Ok(CallReply {
                        resp: reply.resp.clone(),
                        chosen_id: reply.chosen_id,
                    }),
                    Some(Err(_)) | None => Err(RpcError::NoReplica { group: hint.group_id }),
                }
            };
            outcome
        })
    }
}
