// Module naming: common pattern in domain-driven code
#![allow(clippy::module_name_repetitions)]
// Numeric casts: intentional in protocol code
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]
// Documentation style: many terms don't need backticks
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
// API ergonomics: prefer simplicity over must_use annotations
#![allow(clippy::must_use_candidate)]
// Format strings: allow non-inlined for readability
#![allow(clippy::uninlined_format_args)]

//! Shardgate - sharded multiplayer-game backend.
//!
//! A front-facing gateway terminates client TCP connections, decodes the
//! binary wire framing, and routes each request either to a local handler
//! or to a backend node over the internal RPC layer, picking a replica via
//! version/group-aware selection.
//!
//! # Module Organization
//!
//! ## Core
//! - `core::config` - Configuration parsing and validation
//! - `core::time` - Deterministic time sourcing
//! - `core::pool` - Buffer and typed object pools
//! - `core::telemetry` - Structured logging setup
//!
//! ## Wire
//! - `codec` - Length-prefixed frame pack/unpack with compression and
//!   per-session encryption flags
//!
//! ## Gateway
//! - `gate::session` - Per-connection session lifecycle and heartbeat
//! - `gate::registry` - Concurrent address/role session lookup
//! - `gate::forward` - Protocol-id based local/remote routing
//! - `gate::server` - TCP accept loop and bounded worker pool
//!
//! ## RPC
//! - `rpc::selector` - Version/group-aware backend replica selection
//! - `rpc::client` - Node client with failfast/failover modes
//! - `rpc::server` - Frame-based RPC service loop
//!
//! ## Node
//! - `node::dispatch` - Protocol-id to typed handler registry
//!
//! ## CLI
//! - `cli` - `gate`, `node` and `init` subcommands

pub mod cli;
pub mod codec;
pub mod core;
pub mod gate;
pub mod node;
pub mod rpc;

// Re-exports for convenience
pub use crate::core::{config, pool, telemetry, time};
