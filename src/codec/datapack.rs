use bytes::{Buf, BufMut, BytesMut};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use super::crypto::Cipher;
use super::{CodecError, Message, MessageHead, FLAG_COMPRESS, FLAG_ENCRYPT, HEAD_LEN, MAX_BODY_LEN};
use crate::core::config::CodecConfig;
use crate::core::pool::{BufferPool, PooledBuf};

/// Frame packer/unpacker.
///
/// Compression and encryption are codec-wide switches; the cipher itself is
/// per session and passed at call time.
#[derive(Clone)]
pub struct Codec {
    compress: bool,
    compress_threshold: usize,
    encrypt: bool,
    buffers: BufferPool,
}

/// Result of draining an inbound buffer: every fully parsed message so far,
/// plus the payload error that stopped parsing, if any. Messages decoded
/// before the error are returned rather than discarded; the caller decides
/// whether to still process them before closing the connection.
#[derive(Debug, Default)]
pub struct Unpacked {
    pub messages: Vec<Message>,
    pub error: Option<CodecError>,
}

impl Codec {
    pub fn from_config(config: &CodecConfig, buffers: BufferPool) -> Self {
        Self {
            compress: config.compress,
            compress_threshold: config.compress_threshold,
            encrypt: config.encrypt,
            buffers,
        }
    }

    pub const fn head_len() -> usize {
        HEAD_LEN
    }

    /// Serialize a message into a pooled frame buffer.
    ///
    /// The buffer returns to the pool on drop; the caller keeps it alive
    /// until the async write has completed, since the bytes are retained
    /// past this call.
    pub fn pack(
        &self,
        message: &Message,
        cipher: Option<&dyn Cipher>,
    ) -> Result<PooledBuf, CodecError> {
        let (body, flag) = self.pack_body(message, cipher)?;
        if body.len() > MAX_BODY_LEN {
            return Err(CodecError::BodyTooLarge {
                len: body.len(),
                max: MAX_BODY_LEN,
            });
        }

        let mut buf = self.buffers.take();
        buf.reserve(HEAD_LEN + body.len());
        buf.put_u16(body.len() as u16);
        buf.put_u16(flag);
        buf.put_u32(message.head.sn);
        buf.put_u16(message.head.code);
        buf.put_u16(message.head.protocol);
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Drain `buf` of complete frames.
    ///
    /// Stops without error while fewer bytes than header + declared body
    /// are buffered; the partial tail stays in `buf` for the next read.
    pub fn unpack(&self, buf: &mut BytesMut, cipher: Option<&dyn Cipher>) -> Unpacked {
        let mut out = Unpacked::default();
        loop {
            if buf.len() < HEAD_LEN {
                return out;
            }
            let body_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
            if buf.len() < HEAD_LEN + body_len {
                return out;
            }

            let frame = buf.split_to(HEAD_LEN + body_len);
            let mut head_bytes = &frame[..HEAD_LEN];
            head_bytes.advance(2);
            let flag = head_bytes.get_u16();
            let sn = head_bytes.get_u32();
            let code = head_bytes.get_u16();
            let protocol = head_bytes.get_u16();

            match self.unpack_body(&frame[HEAD_LEN..], flag, cipher) {
                Ok(body) => {
                    out.messages.push(Message {
                        head: MessageHead {
                            len: body.len() as u16,
                            flag,
                            sn,
                            code,
                            protocol,
                        },
                        body,
                    });
                }
                Err(err) => {
                    out.error = Some(err);
                    return out;
                }
            }
        }
    }

    fn pack_body(
        &self,
        message: &Message,
        cipher: Option<&dyn Cipher>,
    ) -> Result<(Vec<u8>, u16), CodecError> {
        let mut flag = message.head.flag;
        if message.body.is_empty() {
            return Ok((Vec::new(), flag));
        }

        let mut body = message.body.clone();
        if self.compress && body.len() >= self.compress_threshold {
            body = compress_prepend_size(&body);
            flag |= FLAG_COMPRESS;
        }
        if self.encrypt {
            if let Some(cipher) = cipher {
                body = cipher
                    .encrypt(&body)
                    .map_err(|e| CodecError::Encrypt(e.to_string()))?;
                flag |= FLAG_ENCRYPT;
            }
        }
        Ok((body, flag))
    }

    fn unpack_body(
        &self,
        payload: &[u8],
        flag: u16,
        cipher: Option<&dyn Cipher>,
    ) -> Result<Vec<u8>, CodecError> {
        let mut body = payload.to_vec();
        if flag & FLAG_ENCRYPT != 0 {
            let cipher =
                cipher.ok_or_else(|| CodecError::Decrypt("no session cipher".to_string()))?;
            body = cipher
                .decrypt(&body)
                .map_err(|e| CodecError::Decrypt(e.to_string()))?;
        }
        if flag & FLAG_COMPRESS != 0 {
            body = decompress_size_prepended(&body)
                .map_err(|e| CodecError::Decompress(e.to_string()))?;
            if body.len() > MAX_BODY_LEN {
                return Err(CodecError::Decompress(format!(
                    "decompressed body {} exceeds {} bytes",
                    body.len(),
                    MAX_BODY_LEN
                )));
            }
        }
        Ok(body)
    }
}
