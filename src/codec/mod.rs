//! Binary wire framing.
//!
//! Every frame is a fixed 12-byte big-endian header followed by an opaque
//! body:
//!
//! ```text
//! Len(u16) | Flag(u16) | SN(u32) | Code(u16) | Protocol(u16) | body
//! ```
//!
//! `Len` is the on-wire body length. `Flag` bit0 marks a compressed body,
//! bit4 an encrypted one; on decode the flags are reversed in the inverse
//! order of packing (decrypt first, decompress second). `SN` is the client
//! correlation id, echoed verbatim in responses and zero in server pushes.
//! `Code` is the response error code, zero on success.

pub mod crypto;
mod datapack;

pub use datapack::{Codec, Unpacked};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::pool::Recycle;

/// Fixed header size: 2 + 2 + 4 + 2 + 2.
pub const HEAD_LEN: usize = 12;

/// Body was compressed before (optional) encryption.
pub const FLAG_COMPRESS: u16 = 0x0001;

/// Body was encrypted with the per-session cipher.
pub const FLAG_ENCRYPT: u16 = 0x0010;

/// The body length field is a u16.
pub const MAX_BODY_LEN: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHead {
    /// Body length at pack time.
    pub len: u16,
    pub flag: u16,
    /// Client correlation id; 0 for server-initiated pushes.
    pub sn: u32,
    /// Error code; 0 means success.
    pub code: u16,
    /// Protocol (message) id.
    pub protocol: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub head: MessageHead,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(flag: u16, sn: u32, code: u16, protocol: u16, body: Vec<u8>) -> Self {
        Self {
            head: MessageHead {
                len: body.len() as u16,
                flag,
                sn,
                code,
                protocol,
            },
            body,
        }
    }
}

impl Recycle for Message {
    fn recycle(&mut self) {
        self.head = MessageHead::default();
        self.body.clear();
    }
}

/// Codec failures. Payload errors (`Decrypt`, `Decompress`) are fatal for
/// the connection; the caller closes it. An incomplete frame is a normal
/// stop condition and never surfaces here.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("message body {len} exceeds {max} bytes")]
    BodyTooLarge { len: usize, max: usize },
    #[error("payload encrypt failed: {0}")]
    Encrypt(String),
    #[error("payload decrypt failed: {0}")]
    Decrypt(String),
    #[error("payload decompress failed: {0}")]
    Decompress(String),
}
