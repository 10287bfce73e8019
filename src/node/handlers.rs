//! Built-in node handlers.

use serde::{Deserialize, Serialize};

use super::dispatch::{CallContext, HandlerError, ProtocolHandler};
use crate::core::pool::Recycle;

/// Echo protocol id, the smoke-test handler every node registers.
pub const PROTOCOL_ECHO: u16 = 1001;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EchoReq {
    pub id: u64,
    pub name: String,
}

impl Recycle for EchoReq {
    fn recycle(&mut self) {
        self.id = 0;
        self.name.clear();
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EchoResp {
    pub id: u64,
    pub name: String,
}

impl Recycle for EchoResp {
    fn recycle(&mut self) {
        self.id = 0;
        self.name.clear();
    }
}

/// Echoes the request back, tagged with the serving node's id so routing
/// can be observed end to end.
pub struct EchoHandler;

impl ProtocolHandler for EchoHandler {
    type Req = EchoReq;
    type Resp = EchoResp;

    fn call(
        &self,
        ctx: &CallContext,
        _role_id: u64,
        req: &EchoReq,
        resp: &mut EchoResp,
    ) -> Result<(), HandlerError> {
        resp.id = req.id;
        resp.name = format!("{}@{}", req.name, ctx.node_id);
        Ok(())
    }
}
