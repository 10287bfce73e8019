//! Protocol-id to handler dispatch.
//!
//! Handlers declare their request/response types; the registry owns a
//! typed pool per handler so dispatch never allocates fresh request or
//! response instances on the hot path. Registration problems (duplicate
//! protocol id, reserved method name) surface at startup, before the node
//! accepts traffic, and a handler whose types do not line up simply does
//! not compile.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::core::pool::{Recycle, TypedPool};
use crate::rpc::{ErrorCode, Resp, RpcMessage};

const HANDLER_POOL_CAPACITY: usize = 256;

/// Method names owned by the RPC layer itself.
pub const RESERVED_HANDLER_NAMES: &[&str] = &["Dispatch", "Receive"];

/// Node identity handed to every handler call.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub node_id: u32,
    pub node_version: u32,
}

/// Business-level failure of a handler. The code flows back verbatim in
/// the response header.
#[derive(Debug, Error)]
#[error("handler failed with code {code}")]
pub struct HandlerError {
    pub code: u16,
}

impl HandlerError {
    pub fn new(code: u16) -> Self {
        Self { code }
    }
}

/// One protocol handler. Request and response instances are pooled; the
/// response arrives recycled and the handler fills it in.
pub trait ProtocolHandler: Send + Sync + 'static {
    type Req: Recycle + DeserializeOwned + Send + Sync + 'static;
    type Resp: Recycle + Serialize + Send + Sync + 'static;

    fn call(
        &self,
        ctx: &CallContext,
        role_id: u64,
        req: &Self::Req,
        resp: &mut Self::Resp,
    ) -> Result<(), HandlerError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("protocol {0} is already registered")]
    DuplicateProtocol(u16),
    #[error("handler name {0:?} is reserved")]
    ReservedName(String),
}

enum DispatchFailure {
    Decode(String),
    Encode(String),
    Handler(u16),
}

trait ErasedMethod: Send + Sync {
    fn name(&self) -> &str;
    fn invoke(
        &self,
        ctx: &CallContext,
        role_id: u64,
        body: &[u8],
    ) -> Result<Vec<u8>, DispatchFailure>;
}

struct Method<H: ProtocolHandler> {
    name: String,
    handler: H,
    requests: TypedPool<H::Req>,
    responses: TypedPool<H::Resp>,
}

impl<H: ProtocolHandler> ErasedMethod for Method<H> {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(
        &self,
        ctx: &CallContext,
        role_id: u64,
        body: &[u8],
    ) -> Result<Vec<u8>, DispatchFailure> {
        // pooled values return on drop, whatever path exits below
        let mut req = self.requests.take();
        if !body.is_empty() {
            *req = bincode::deserialize(body).map_err(|e| DispatchFailure::Decode(e.to_string()))?;
        }
        let mut resp = self.responses.take();

        self.handler
            .call(ctx, role_id, &req, &mut resp)
            .map_err(|e| DispatchFailure::Handler(e.code))?;

        bincode::serialize(&*resp).map_err(|e| DispatchFailure::Encode(e.to_string()))
    }
}

pub struct DispatchRegistryBuilder {
    context: CallContext,
    methods: HashMap<u16, Box<dyn ErasedMethod>>,
}

impl std::fmt::Debug for DispatchRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchRegistryBuilder")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl DispatchRegistryBuilder {
    pub fn new(context: CallContext) -> Self {
        Self {
            context,
            methods: HashMap::new(),
        }
    }

    /// Register a handler under a protocol id. Consuming so a broken
    /// registration chain cannot be ignored into a half-built registry.
    pub fn register<H: ProtocolHandler>(
        mut self,
        protocol: u16,
        name: &str,
        handler: H,
    ) -> Result<Self, RegistryError> {
        if RESERVED_HANDLER_NAMES.contains(&name) {
            return Err(RegistryError::ReservedName(name.to_string()));
        }
        if self.methods.contains_key(&protocol) {
            return Err(RegistryError::DuplicateProtocol(protocol));
        }
        self.methods.insert(
            protocol,
            Box::new(Method {
                name: name.to_string(),
                handler,
                requests: TypedPool::new(HANDLER_POOL_CAPACITY),
                responses: TypedPool::new(HANDLER_POOL_CAPACITY),
            }),
        );
        Ok(self)
    }

    pub fn build(self) -> DispatchRegistry {
        DispatchRegistry {
            context: self.context,
            methods: self.methods,
        }
    }
}

pub struct DispatchRegistry {
    context: CallContext,
    methods: HashMap<u16, Box<dyn ErasedMethod>>,
}

impl DispatchRegistry {
    pub fn builder(context: CallContext) -> DispatchRegistryBuilder {
        DispatchRegistryBuilder::new(context)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Handle one routed message. Requires a bound identity; the gateway
    /// enforces that too, but a node never trusts its callers.
    pub fn dispatch(&self, message: &RpcMessage) -> Resp {
        let role_id = message.player.role_id;
        if role_id == 0 {
            return Resp::error(ErrorCode::IdentityNotBound);
        }

        let protocol = message.data.head.protocol;
        let Some(method) = self.methods.get(&protocol) else {
            warn!(protocol, "no handler registered for protocol");
            return Resp::error(ErrorCode::ProtocolNotFound);
        };

        match method.invoke(&self.context, role_id, &message.data.body) {
            Ok(body) => Resp::with_body(body),
            Err(DispatchFailure::Decode(err)) => {
                warn!(protocol, method = method.name(), err = %err, "request decode failed");
                Resp::error(ErrorCode::DecodeFailed)
            }
            Err(DispatchFailure::Encode(err)) => {
                warn!(protocol, method = method.name(), err = %err, "response encode failed");
                Resp::error(ErrorCode::EncodeFailed)
            }
            Err(DispatchFailure::Handler(code)) => Resp {
                code,
                ..Resp::default()
            },
        }
    }
}
