//! Protocol-id based routing of decoded client messages.

use std::sync::Arc;
use tracing::warn;

use super::session::Session;
use super::Gate;
use crate::codec::Message;
use crate::rpc::{
    group_for_protocol, server_in_group, ErrorCode, Resp, RouteHint, RpcMessage, RpcMethod,
    LOCAL_PROTOCOL_LIMIT, PROTOCOL_HEARTBEAT, PROTOCOL_LOGIN,
};

impl Gate {
    /// Handle one decoded message and produce the response envelope. Local
    /// protocols never touch the RPC layer; everything else requires a
    /// bound identity and goes through the selector.
    pub async fn forward(&self, session: &Arc<Session>, message: &Message) -> Resp {
        if message.head.protocol < LOCAL_PROTOCOL_LIMIT {
            return self.forward_local(session, message);
        }
        self.forward_remote(session, message).await
    }

    fn forward_local(&self, session: &Arc<Session>, message: &Message) -> Resp {
        match message.head.protocol {
            PROTOCOL_HEARTBEAT => self.handle_heartbeat(session),
            PROTOCOL_LOGIN => self.handle_login(session, message),
            protocol => {
                warn!(protocol, "no local handler for protocol");
                Resp::error(ErrorCode::ProtocolNotFound)
            }
        }
    }

    async fn forward_remote(&self, session: &Arc<Session>, message: &Message) -> Resp {
        let Some(player) = session.player_snapshot() else {
            return Resp::error(ErrorCode::IdentityNotBound);
        };

        let group_id = group_for_protocol(message.head.protocol);
        let hint = RouteHint {
            id: server_in_group(group_id, &player.server_ids),
            group_id,
        };
        let rpc_message = RpcMessage {
            data: message.clone(),
            player,
        };

        match self.caller.call(hint, RpcMethod::Dispatch, rpc_message).await {
            Ok(reply) => {
                // fresh pick: remember it for stickiness
                if hint.id == 0 && reply.chosen_id != 0 {
                    session.record_server(reply.chosen_id);
                }
                reply.resp
            }
            Err(err) => {
                warn!(
                    protocol = message.head.protocol,
                    group = group_id,
                    %err,
                    "remote dispatch failed"
                );
                Resp::error(ErrorCode::RemoteCallFailed)
            }
        }
    }
}
