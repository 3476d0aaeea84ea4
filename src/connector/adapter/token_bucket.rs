use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Process-global token bucket governing outbound embedder requests.
///
/// The critical section is timestamp arithmetic only; callers sleep
/// outside the lock, so concurrent acquirers serialize their slots
/// without holding each other up.
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_second: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A bucket allowing `requests_per_minute` sustained throughput with
    /// bursts up to the same size.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let capacity = f64::from(requests_per_minute.max(1));
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_per_second: capacity / 60.0,
        }
    }

    /// Take one token, sleeping until one is available.
    pub async fn acquire(&self) {
        let wait = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let elapsed = now.duration_since(state.last_refill).as_secs_f64();
            state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
            state.last_refill = now;

            if state.tokens >= 1.0 {
                state.tokens -= 1.0;
                None
            } else {
                // Claim the next token now; the deficit tells us how long
                // to sleep before it exists.
                let deficit = 1.0 - state.tokens;
                state.tokens -= 1.0;
                Some(Duration::from_secs_f64(deficit / self.refill_per_second))
            }
        };

        if let Some(wait) = wait {
            debug!("Rate limiter sleeping {:.1}s", wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }
    }
}
