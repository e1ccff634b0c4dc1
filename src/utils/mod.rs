pub mod idempotency;
pub mod rate_limiter;

pub use idempotency::{alert_key, generate_idempotency_key};
pub use rate_limiter::RateLimiter;
