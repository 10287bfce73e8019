//! Gateway end-to-end over real TCP: local protocols, identity gating,
//! remote routing, and sticky replica recording.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

use common::{encrypted_test_config, read_frame, test_config, write_frame, MockCaller};
use shardgate::codec::crypto::{Cipher, Rc4};
use shardgate::codec::{Codec, FLAG_ENCRYPT};
use shardgate::gate::handlers::{share_key_for_account, LoginReq, LoginResp};
use shardgate::gate::{Gate, GateService};
use shardgate::node::push_to_gate;
use shardgate::pool::BufferPool;
use shardgate::rpc::selector::metadata_string;
use shardgate::rpc::{server, ErrorCode, NodeClient, Player, Resp, Selector};

const PROTOCOL_HEARTBEAT: u16 = 1;
const PROTOCOL_LOGIN: u16 = 2;
const PROTOCOL_REMOTE: u16 = 1001;

async fn start_gate(caller: Arc<MockCaller>) -> (Arc<Gate>, TcpStream) {
    start_gate_with(test_config(), caller).await
}

async fn start_gate_with(
    config: shardgate::config::Config,
    caller: Arc<MockCaller>,
) -> (Arc<Gate>, TcpStream) {
    let codec = Codec::from_config(&config.codec, BufferPool::new());
    let gate = Arc::new(Gate::new(&config, codec, caller));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(gate.clone().run(listener));

    let client = TcpStream::connect(addr).await.unwrap();
    (gate, client)
}

async fn login(client: &mut TcpStream, account_id: &str) -> u64 {
    let body = bincode::serialize(&LoginReq {
        account_id: account_id.to_string(),
        server_id: 0,
    })
    .unwrap();
    write_frame(client, 10, PROTOCOL_LOGIN, &body).await;
    let reply = read_frame(client).await;
    assert_eq!(reply.code, 0);
    let resp: LoginResp = bincode::deserialize(&reply.body).unwrap();
    resp.role_id
}

#[tokio::test]
async fn heartbeat_is_answered_locally() {
    let caller = Arc::new(MockCaller::new());
    let (_gate, mut client) = start_gate(caller.clone()).await;

    write_frame(&mut client, 1, PROTOCOL_HEARTBEAT, b"PING").await;
    let reply = read_frame(&mut client).await;

    assert_eq!(reply.len, 0);
    assert_eq!(reply.flag, 0);
    assert_eq!(reply.sn, 1);
    assert_eq!(reply.code, 0);
    assert_eq!(reply.protocol, PROTOCOL_HEARTBEAT);
    // nothing reached the rpc layer
    assert!(caller.recorded_hints().is_empty());
}

#[tokio::test]
async fn remote_protocol_requires_bound_identity() {
    let caller = Arc::new(MockCaller::new());
    let (_gate, mut client) = start_gate(caller.clone()).await;

    write_frame(&mut client, 5, PROTOCOL_REMOTE, b"payload").await;
    let reply = read_frame(&mut client).await;

    assert_eq!(reply.sn, 5);
    assert_eq!(reply.code, ErrorCode::IdentityNotBound.code());
    assert!(caller.recorded_hints().is_empty());
}

#[tokio::test]
async fn login_binds_identity_and_unblocks_routing() {
    let caller = Arc::new(MockCaller::new());
    caller.queue_ok(Resp::with_body(b"routed".to_vec()), 1001);
    let (_gate, mut client) = start_gate(caller.clone()).await;

    let role_id = login(&mut client, "acct-42").await;
    assert!(role_id >= 1);

    write_frame(&mut client, 11, PROTOCOL_REMOTE, b"payload").await;
    let reply = read_frame(&mut client).await;
    assert_eq!(reply.sn, 11);
    assert_eq!(reply.code, 0);
    assert_eq!(reply.body, b"routed");

    let hints = caller.recorded_hints();
    assert_eq!(hints.len(), 1);
    assert_eq!(hints[0].group_id, 2);
}

#[tokio::test]
async fn failed_remote_call_maps_to_remote_call_failed() {
    let caller = Arc::new(MockCaller::new());
    caller.queue_err();
    let (_gate, mut client) = start_gate(caller.clone()).await;

    login(&mut client, "acct-err").await;
    write_frame(&mut client, 12, PROTOCOL_REMOTE, b"payload").await;
    let reply = read_frame(&mut client).await;

    assert_eq!(reply.sn, 12);
    assert_eq!(reply.code, ErrorCode::RemoteCallFailed.code());
}

#[tokio::test]
async fn fresh_pick_becomes_sticky() {
    let caller = Arc::new(MockCaller::new());
    caller.queue_ok(Resp::ok(), 1002);
    let (_gate, mut client) = start_gate(caller.clone()).await;

    login(&mut client, "acct-sticky").await;
    write_frame(&mut client, 20, PROTOCOL_REMOTE, b"first").await;
    assert_eq!(read_frame(&mut client).await.code, 0);
    write_frame(&mut client, 21, PROTOCOL_REMOTE, b"second").await;
    assert_eq!(read_frame(&mut client).await.code, 0);

    let hints = caller.recorded_hints();
    assert_eq!(hints.len(), 2);
    // first call is a fresh pick, second pins the replica that answered
    assert_eq!(hints[0].id, 0);
    assert_eq!(hints[1].id, 1002);
}

#[tokio::test]
async fn login_arms_the_session_cipher_when_encryption_is_on() {
    let caller = Arc::new(MockCaller::new());
    caller.queue_ok(Resp::with_body(b"routed".to_vec()), 1001);
    let (_gate, mut client) = start_gate_with(encrypted_test_config(), caller).await;

    let body = bincode::serialize(&LoginReq {
        account_id: "acct-enc".to_string(),
        server_id: 0,
    })
    .unwrap();
    write_frame(&mut client, 30, PROTOCOL_LOGIN, &body).await;

    // the login reply itself already travels encrypted
    let reply = read_frame(&mut client).await;
    assert_ne!(reply.flag & FLAG_ENCRYPT, 0, "reply was not encrypted");
    let cipher = Rc4::new(&share_key_for_account("acct-enc"));
    let plain = cipher.decrypt(&reply.body).unwrap();
    let resp: LoginResp = bincode::deserialize(&plain).unwrap();
    assert!(resp.role_id >= 1);

    // and so does every routed reply that follows
    write_frame(&mut client, 31, PROTOCOL_REMOTE, b"payload").await;
    let reply = read_frame(&mut client).await;
    assert_ne!(reply.flag & FLAG_ENCRYPT, 0);
    assert_eq!(cipher.decrypt(&reply.body).unwrap(), b"routed");
}

#[tokio::test]
async fn node_push_reaches_the_connected_client() {
    let caller = Arc::new(MockCaller::new());
    let (gate, mut client) = start_gate(caller).await;
    let role_id = login(&mut client, "acct-push").await;

    // expose the gate's Receive surface the way `shardgate gate` does
    let config = test_config();
    let codec = Codec::from_config(&config.codec, BufferPool::new());
    let rpc_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gate_rpc_addr = rpc_listener.local_addr().unwrap().to_string();
    tokio::spawn(server::serve(
        rpc_listener,
        Arc::new(GateService::new(codec, gate.sessions().clone())),
    ));

    let selector = Arc::new(Selector::new());
    let mut servers = HashMap::new();
    servers.insert(gate_rpc_addr, metadata_string(gate.node_id(), 1, 1));
    selector.update_servers(&servers);
    let node_caller = NodeClient::new(selector, &config.rpc);

    let player = Player {
        role_id,
        server_ids: vec![gate.node_id()],
        ..Player::default()
    };
    push_to_gate(&node_caller, &player, 1102, b"server says hi".to_vec())
        .await
        .unwrap();

    let pushed = read_frame(&mut client).await;
    assert_eq!(pushed.sn, 0);
    assert_eq!(pushed.protocol, 1102);
    assert_eq!(pushed.body, b"server says hi");
}
