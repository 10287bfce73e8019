//! Per-session symmetric encryption.
//!
//! Sessions negotiate a share key at login time; the codec applies the
//! cipher after compression on the way out and before decompression on the
//! way in. The trait keeps the codec independent of the algorithm.

use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct CipherError(pub String);

pub trait Cipher: Send + Sync {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CipherError>;
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// RC4 keystream keyed with the session share key. Symmetric: encrypt and
/// decrypt are the same transform. The keystream restarts per message, so
/// each body stands alone on the wire.
pub struct Rc4 {
    key: Vec<u8>,
}

impl Rc4 {
    pub fn new(key: &[u8]) -> Self {
        debug_assert!(!key.is_empty(), "rc4 key must not be empty");
        Self { key: key.to_vec() }
    }

    fn apply(&self, data: &[u8]) -> Vec<u8> {
        let mut state: [u8; 256] = [0; 256];
        for (i, slot) in state.iter_mut().enumerate() {
            *slot = i as u8;
        }
        let mut j: u8 = 0;
        for i in 0..256 {
            j = j
                .wrapping_add(state[i])
                .wrapping_add(self.key[i % self.key.len()]);
            state.swap(i, j as usize);
        }

        let mut out = Vec::with_capacity(data.len());
        let mut i: u8 = 0;
        let mut j: u8 = 0;
        for &byte in data {
            i = i.wrapping_add(1);
            j = j.wrapping_add(state[i as usize]);
            state.swap(i as usize, j as usize);
            let k = state[(state[i as usize].wrapping_add(state[j as usize])) as usize];
            out.push(byte ^ k);
        }
        out
    }
}

impl Cipher for Rc4 {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        Ok(self.apply(data))
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        Ok(self.apply(data))
    }
}
