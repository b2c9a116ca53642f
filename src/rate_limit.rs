use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Spaces outgoing provider calls evenly. A rate of 0 disables throttling.
pub struct SimpleRateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl SimpleRateLimiter {
    pub fn per_minute(calls: u32) -> Self {
        let per = if calls == 0 { 0 } else { 60_000 / calls as u64 };
        Self { min_interval: Duration::from_millis(per), last: Mutex::new(None) }
    }

    pub fn min_interval(&self) -> Duration { self.min_interval }

    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let next_ok = prev + self.min_interval;
            let now = Instant::now();
            if now < next_ok {
                tracing::debug!(wait_ms = (next_ok - now).as_millis() as u64, "throttling provider call");
                tokio::time::sleep(next_ok - now).await;
            }
        }
        *last = Some(Instant::now());
    }
}
