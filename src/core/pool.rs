//! Object pools for the hot send/dispatch paths.
//!
//! Packed frames, bound players and node-side request/response instances
//! are recycled instead of reallocated per message. Pooled values return to
//! their pool on drop, which doubles as the "release after the async write
//! completed" contract of the send path: the writer task holds the
//! [`PooledBuf`] until the write finishes, then drops it.

use object_pool::Pool;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Initial capacity of pooled frame buffers. Typical frames fit without
/// growing; larger ones reallocate up to header plus the `u16` body limit.
const DEFAULT_BUFFER_SIZE: usize = 1024;

const DEFAULT_POOL_CAPACITY: usize = 128;

/// Pool of byte buffers backing packed frames.
#[derive(Clone)]
pub struct BufferPool {
    pool: Arc<Pool<Vec<u8>>>,
    buffer_size: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize, buffer_size: usize) -> Self {
        let pool = Pool::new(capacity, move || Vec::with_capacity(buffer_size));
        Self {
            pool: Arc::new(pool),
            buffer_size,
        }
    }

    /// Take an empty buffer from the pool. The buffer is cleared here
    /// because the pool hands buffers back in whatever state they were
    /// dropped in.
    pub fn take(&self) -> PooledBuf {
        let mut buf = self
            .pool
            .pull_owned(|| Vec::with_capacity(self.buffer_size));
        buf.clear();
        PooledBuf { inner: buf }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A byte buffer that returns to its pool when dropped.
pub struct PooledBuf {
    inner: object_pool::ReusableOwned<Vec<u8>>,
}

impl Deref for PooledBuf {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl AsRef<[u8]> for PooledBuf {
    fn as_ref(&self) -> &[u8] {
        self.inner.as_slice()
    }
}

impl std::fmt::Debug for PooledBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuf")
            .field("len", &self.inner.len())
            .finish()
    }
}

/// Types that can be stored in a [`TypedPool`]. `recycle` must return the
/// value to its pristine state; it runs when the value is taken.
pub trait Recycle: Default + Send {
    fn recycle(&mut self);
}

/// A typed free-list. Each message/request/response kind gets its own pool
/// injected where it is used; there is no global type-keyed registry.
pub struct TypedPool<T: Recycle + 'static> {
    pool: Arc<Pool<T>>,
}

impl<T: Recycle + 'static> TypedPool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: Arc::new(Pool::new(capacity, T::default)),
        }
    }

    pub fn take(&self) -> Pooled<T> {
        let mut item = self.pool.pull_owned(T::default);
        item.recycle();
        item
    }
}

impl<T: Recycle + 'static> Clone for TypedPool<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

/// A pooled value; returns to the pool on drop.
pub type Pooled<T> = object_pool::ReusableOwned<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Scratch {
        data: Vec<u8>,
    }

    impl Recycle for Scratch {
        fn recycle(&mut self) {
            self.data.clear();
        }
    }

    #[test]
    fn buffer_pool_returns_empty_buffers() {
        let pool = BufferPool::with_capacity(2, 64);
        {
            let mut buf = pool.take();
            buf.extend_from_slice(b"leftover");
        }
        let buf = pool.take();
        assert!(buf.is_empty());
    }

    #[test]
    fn typed_pool_recycles_on_take() {
        let pool: TypedPool<Scratch> = TypedPool::new(2);
        {
            let mut item = pool.take();
            item.data.extend_from_slice(b"state");
        }
        let item = pool.take();
        assert!(item.data.is_empty());
    }
}
