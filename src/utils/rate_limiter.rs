/// Token bucket rate limiter for outbound API calls
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

pub struct RateLimiter {
    capacity: u32,
    refill_every: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        let capacity = requests_per_second.max(1);
        RateLimiter {
            capacity,
            refill_every: Duration::from_secs(1) / capacity,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Try to acquire a token, returns true if successful
    pub async fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Wait until a token is available, then acquire it
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                self.refill(&mut bucket);
                if bucket.tokens > 0 {
                    bucket.tokens -= 1;
                    return;
                }
                self.refill_every
                    .saturating_sub(bucket.last_refill.elapsed())
                    .max(Duration::from_millis(1))
            };

            tokio::time::sleep(wait).await;
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let elapsed = bucket.last_refill.elapsed();
        if elapsed < self.refill_every {
            return;
        }

        let periods = (elapsed.as_nanos() / self.refill_every.as_nanos().max(1)) as u32;
        bucket.tokens = bucket.tokens.saturating_add(periods).min(self.capacity);
        bucket.last_refill += self.refill_every * periods;
    }
}
