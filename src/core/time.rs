use std::time::Duration;
use tokio::time::Instant;

/// Clock abstraction so heartbeat and lifecycle paths source time
/// deterministically. Uses `tokio::time::Instant` so paused test time is
/// observed by both `now` and `sleep`.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration) -> tokio::time::Sleep;
}

/// System-backed clock.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> tokio::time::Sleep {
        tokio::time::sleep(duration)
    }
}
