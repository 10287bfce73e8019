//! RPC layer over real TCP: node dispatch end to end, replica selection
//! feedback, and failfast/failover retry behavior.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use shardgate::codec::Message;
use shardgate::config::{FailMode, RpcClientConfig};
use shardgate::node::handlers::{EchoHandler, EchoReq, EchoResp, PROTOCOL_ECHO};
use shardgate::node::{CallContext, DispatchRegistry, NodeService};
use shardgate::rpc::selector::metadata_string;
use shardgate::rpc::{
    server, NodeClient, Player, RouteHint, RpcCaller, RpcError, RpcMessage, RpcMethod, Selector,
};

fn client_config(fail_mode: FailMode, retries: u32) -> RpcClientConfig {
    RpcClientConfig {
        connect_timeout_ms: 1000,
        fail_mode,
        retries,
        backup_latency_ms: 10,
    }
}

fn selector_for(address: &str, id: u32) -> Arc<Selector> {
    let selector = Arc::new(Selector::new());
    let mut servers = HashMap::new();
    servers.insert(address.to_string(), metadata_string(id, id / 1000 + 1, 1));
    selector.update_servers(&servers);
    selector
}

fn routed(role_id: u64, body: Vec<u8>) -> RpcMessage {
    RpcMessage {
        data: Message::new(0, 1, 0, PROTOCOL_ECHO, body),
        player: Player {
            role_id,
            ..Player::default()
        },
    }
}

async fn start_node(id: u32) -> String {
    let registry = DispatchRegistry::builder(CallContext {
        node_id: id,
        node_version: 1,
    })
    .register(PROTOCOL_ECHO, "Echo", EchoHandler)
    .unwrap()
    .build();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(server::serve(
        listener,
        Arc::new(NodeService::new(Arc::new(registry))),
    ));
    address
}

#[tokio::test]
async fn dispatch_reaches_a_registered_handler() {
    let address = start_node(1001).await;
    let client = NodeClient::new(
        selector_for(&address, 1001),
        &client_config(FailMode::Failfast, 0),
    );

    let body = bincode::serialize(&EchoReq {
        id: 5,
        name: "probe".to_string(),
    })
    .unwrap();
    let reply = client
        .call(
            RouteHint { id: 0, group_id: 2 },
            RpcMethod::Dispatch,
            routed(7, body),
        )
        .await
        .unwrap();

    assert_eq!(reply.resp.code, 0);
    assert_eq!(reply.chosen_id, 1001);
    let echoed: EchoResp = bincode::deserialize(&reply.resp.body).unwrap();
    assert_eq!(echoed.id, 5);
    assert_eq!(echoed.name, "probe@1001");
}

#[tokio::test]
async fn sequential_calls_reuse_the_service() {
    let address = start_node(1001).await;
    let client = NodeClient::new(
        selector_for(&address, 1001),
        &client_config(FailMode::Failfast, 0),
    );

    for sn in 0..3u64 {
        let body = bincode::serialize(&EchoReq {
            id: sn,
            name: format!("probe-{sn}"),
        })
        .unwrap();
        let reply = client
            .call(
                RouteHint {
                    id: 1001,
                    group_id: 2,
                },
                RpcMethod::Dispatch,
                routed(7, body),
            )
            .await
            .unwrap();
        let echoed: EchoResp = bincode::deserialize(&reply.resp.body).unwrap();
        assert_eq!(echoed.id, sn);
    }
}

#[tokio::test]
async fn no_replica_in_group_fails_without_io() {
    let address = start_node(1001).await;
    let client = NodeClient::new(
        selector_for(&address, 1001),
        &client_config(FailMode::Failfast, 0),
    );

    let err = client
        .call(
            RouteHint { id: 0, group_id: 9 },
            RpcMethod::Dispatch,
            routed(7, Vec::new()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::NoReplica { group: 9 }));
}

/// Accepts connections and drops them immediately, counting attempts.
async fn start_flaky_listener(accepts: Arc<AtomicUsize>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            accepts.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });
    address
}

#[tokio::test]
async fn failfast_gives_up_after_one_attempt() {
    let accepts = Arc::new(AtomicUsize::new(0));
    let address = start_flaky_listener(accepts.clone()).await;
    let client = NodeClient::new(
        selector_for(&address, 1001),
        &client_config(FailMode::Failfast, 3),
    );

    let result = client
        .call(
            RouteHint { id: 0, group_id: 2 },
            RpcMethod::Dispatch,
            routed(7, Vec::new()),
        )
        .await;
    assert!(result.is_err());
    assert_eq!(accepts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failover_retries_up_to_budget() {
    let accepts = Arc::new(AtomicUsize::new(0));
    let address = start_flaky_listener(accepts.clone()).await;
    let client = NodeClient::new(
        selector_for(&address, 1001),
        &client_config(FailMode::Failover, 3),
    );

    let result = client
        .call(
            RouteHint { id: 0, group_id: 2 },
            RpcMethod::Dispatch,
            routed(7, Vec::new()),
        )
        .await;
    assert!(result.is_err());
    assert_eq!(accepts.load(Ordering::SeqCst), 3);
}
