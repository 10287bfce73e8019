//! Per-connection session state and heartbeat supervision.

use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::codec::crypto::Rc4;
use crate::core::pool::{Pooled, PooledBuf};
use crate::core::time::Clock;
use crate::rpc::Player;

/// One client connection. Shared between the read loop, the worker tasks
/// handling its messages, the heartbeat supervisor and the push path.
pub struct Session {
    remote_addr: SocketAddr,
    outbound: mpsc::Sender<PooledBuf>,
    ping_at: Mutex<Instant>,
    cipher: RwLock<Option<Arc<Rc4>>>,
    player: RwLock<Option<Pooled<Player>>>,
    closed: AtomicBool,
    close_tx: watch::Sender<bool>,
}

impl Session {
    pub fn new(remote_addr: SocketAddr, outbound: mpsc::Sender<PooledBuf>, now: Instant) -> Self {
        let (close_tx, _) = watch::channel(false);
        Self {
            remote_addr,
            outbound,
            ping_at: Mutex::new(now),
            cipher: RwLock::new(None),
            player: RwLock::new(None),
            closed: AtomicBool::new(false),
            close_tx,
        }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Record client liveness. Any inbound heartbeat resets the miss
    /// counter on the next supervisor check.
    pub fn touch_ping(&self, now: Instant) {
        *self.ping_at.lock() = now;
    }

    pub fn ping_at(&self) -> Instant {
        *self.ping_at.lock()
    }

    pub fn set_cipher(&self, cipher: Arc<Rc4>) {
        *self.cipher.write() = Some(cipher);
    }

    pub fn cipher(&self) -> Option<Arc<Rc4>> {
        self.cipher.read().clone()
    }

    /// Bind an identity to this session. Replaces any previous binding.
    pub fn bind_player(&self, player: Pooled<Player>) {
        *self.player.write() = Some(player);
    }

    /// Owned copy of the bound identity, if any. Routed calls carry this
    /// copy so the binding is never locked across an await.
    pub fn player_snapshot(&self) -> Option<Player> {
        self.player.read().as_deref().cloned()
    }

    pub fn role_id(&self) -> Option<u64> {
        self.player.read().as_ref().map(|p| p.role_id)
    }

    /// Remember that `server_id` served this identity, making later calls
    /// to its group sticky.
    pub fn record_server(&self, server_id: u32) {
        if let Some(player) = self.player.write().as_mut() {
            if !player.server_ids.contains(&server_id) {
                player.server_ids.push(server_id);
            }
        }
    }

    /// Queue a packed frame for the writer task. Fails once the writer has
    /// gone away, which only happens during teardown.
    pub async fn send(&self, frame: PooledBuf) -> Result<(), SendClosed> {
        self.outbound.send(frame).await.map_err(|_| SendClosed)
    }

    /// Ask the connection to shut down. Safe to call from any task.
    pub fn request_close(&self) {
        let _ = self.close_tx.send(true);
    }

    /// First caller wins; the winner runs teardown.
    pub fn begin_close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_rx(&self) -> watch::Receiver<bool> {
        self.close_tx.subscribe()
    }

    /// Drop the identity binding, returning the pooled value to its pool.
    pub fn unbind_player(&self) {
        *self.player.write() = None;
    }
}

#[derive(Debug, thiserror::Error)]
#[error("session writer closed")]
pub struct SendClosed;

/// Verdict of one heartbeat check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatVerdict {
    Alive,
    Missed(u32),
    Expired,
}

/// Miss-counting state machine, separated from the supervisor task so the
/// counting rules are testable without a runtime.
pub struct HeartbeatMonitor {
    interval: Duration,
    max_retries: u32,
    misses: u32,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
            misses: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Evaluate one check tick. A ping inside the last interval resets the
    /// counter; a stale ping increments it, and the session expires only
    /// once the counter exceeds `max_retries`.
    pub fn observe(&mut self, now: Instant, last_ping: Instant) -> HeartbeatVerdict {
        if now.duration_since(last_ping) < self.interval {
            self.misses = 0;
            return HeartbeatVerdict::Alive;
        }
        self.misses += 1;
        if self.misses > self.max_retries {
            HeartbeatVerdict::Expired
        } else {
            HeartbeatVerdict::Missed(self.misses)
        }
    }
}

/// Supervisor task: checks the session every interval and requests close
/// once the miss budget is spent. Ends as soon as the session closes for
/// any other reason.
pub async fn run_heartbeat<C: Clock>(session: Arc<Session>, clock: C, mut monitor: HeartbeatMonitor) {
    let mut close_rx = session.close_rx();
    loop {
        tokio::select! {
            _ = clock.sleep(monitor.interval()) => {}
            _ = close_rx.changed() => return,
        }

        match monitor.observe(clock.now(), session.ping_at()) {
            HeartbeatVerdict::Alive => {}
            HeartbeatVerdict::Missed(misses) => {
                debug!(remote = %session.remote_addr(), misses, "heartbeat missed");
            }
            HeartbeatVerdict::Expired => {
                info!(remote = %session.remote_addr(), "heartbeat expired, closing session");
                session.request_close();
                return;
            }
        }
    }
}
