use std::time::Duration;

use crate::client::RetryConfig;
use crate::error::ApiError;

/// Delay after failed attempt `attempt` (1-based):
/// `min(initial_delay * multiplier^(attempt - 1), max_delay)`.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(63) as i32;
    let base = config.initial_delay.as_secs_f64();
    let max = config.max_delay.as_secs_f64();
    let delay = (base * config.multiplier.powi(exponent)).min(max);

    if delay.is_finite() && delay >= 0.0 {
        Duration::from_secs_f64(delay)
    } else {
        config.max_delay
    }
}

/// A `Retry-After` hint from a 429 replaces the computed backoff.
pub fn retry_delay(config: &RetryConfig, attempt: u32, err: &ApiError) -> Duration {
    match err {
        ApiError::RateLimited {
            retry_after: Some(secs),
        } => Duration::from_secs(*secs),
        _ => backoff_delay(config, attempt),
    }
}
