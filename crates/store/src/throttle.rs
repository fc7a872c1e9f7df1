use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum inter-request spacing for writes, independent of worker
/// parallelism. A zero interval disables the gate entirely.
pub struct Throttle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Wait until at least `interval` has passed since the previous caller
    /// was released, then claim the slot.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }
        let mut last = self.last.lock().await;
        let now = Instant::now();
        let ready_at = match *last {
            Some(prev) => prev + self.interval,
            None => now,
        };
        if ready_at > now {
            tokio::time::sleep_until(ready_at).await;
        }
        *last = Some(Instant::now());
    }
}
