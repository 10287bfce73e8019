//! Local protocol handlers: heartbeat and login.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{info, warn};

use super::session::Session;
use super::Gate;
use crate::codec::crypto::Rc4;
use crate::codec::Message;
use crate::core::time::Clock;
use crate::rpc::{ErrorCode, Resp};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LoginReq {
    pub account_id: String,
    pub server_id: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LoginResp {
    pub role_id: u64,
}

impl Gate {
    pub(super) fn handle_heartbeat(&self, session: &Arc<Session>) -> Resp {
        session.touch_ping(self.clock.now());
        Resp::ok()
    }

    /// Bind an identity to the session and index it by role. An empty body
    /// is tolerated and binds a default identity, which keeps the probe
    /// clients used during bring-up working.
    pub(super) fn handle_login(&self, session: &Arc<Session>, message: &Message) -> Resp {
        let req: LoginReq = if message.body.is_empty() {
            LoginReq::default()
        } else {
            match bincode::deserialize(&message.body) {
                Ok(req) => req,
                Err(err) => {
                    warn!(%err, "undecodable login request");
                    return Resp::error(ErrorCode::DecodeFailed);
                }
            }
        };

        let role_id = role_id_for_account(&req.account_id);
        // Arm the session cipher before the reply is packed: the login
        // response and everything after it travel encrypted. Both ends
        // derive the share key from the account id.
        if self.encrypt {
            session.set_cipher(Arc::new(Rc4::new(&share_key_for_account(&req.account_id))));
        }
        let mut player = self.players.take();
        player.account_id = req.account_id;
        player.role_id = role_id;
        player.server_id = req.server_id;
        player.real_server_id = req.server_id;
        // the owning gateway's id, so nodes can push back through it
        player.server_ids.push(self.node_id);
        session.bind_player(player);
        self.sessions.bind_role(role_id, session.clone());
        info!(remote = %session.remote_addr(), role_id, "identity bound");

        match bincode::serialize(&LoginResp { role_id }) {
            Ok(body) => Resp::with_body(body),
            Err(err) => {
                warn!(%err, "login response encode failed");
                Resp::error(ErrorCode::EncodeFailed)
            }
        }
    }
}

fn role_id_for_account(account_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    account_id.hash(&mut hasher);
    // role id 0 means "not bound" on the node side
    hasher.finish().max(1)
}

/// Session share key derivation, mirrored by clients.
pub fn share_key_for_account(account_id: &str) -> Vec<u8> {
    let mut hasher = DefaultHasher::new();
    (account_id, "share-key").hash(&mut hasher);
    let mut key = hasher.finish().to_be_bytes().to_vec();
    key.extend_from_slice(&role_id_for_account(account_id).to_be_bytes());
    key
}
