use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

/// Sliding-window limiter: at most `max_requests` acquisitions in any
/// `window`. Per process; not shared through the state store.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    inner: Mutex<Window>,
}

#[derive(Debug, Default)]
struct Window {
    calls: VecDeque<Instant>,
    throttled: u64,
    waited: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitMetrics {
    pub max_requests: usize,
    pub window_secs: u64,
    pub in_window: usize,
    pub throttled: u64,
    pub total_wait_ms: u128,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_window(requests_per_minute, Duration::from_secs(60))
    }

    pub fn with_window(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1) as usize,
            window,
            inner: Mutex::new(Window::default()),
        }
    }

    /// Waits until a slot is free and claims it. Returns the time spent
    /// waiting.
    pub async fn acquire(&self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let wait = {
                let mut inner = self.inner.lock();
                let now = Instant::now();
                while let Some(oldest) = inner.calls.front()
                    && now.duration_since(*oldest) >= self.window
                {
                    inner.calls.pop_front();
                }

                if inner.calls.len() < self.max_requests {
                    inner.calls.push_back(now);
                    if !waited.is_zero() {
                        inner.throttled += 1;
                        inner.waited += waited;
                    }
                    return waited;
                }

                match inner.calls.front() {
                    Some(oldest) => (*oldest + self.window).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            };

            tracing::debug!(
                wait_ms = wait.as_millis() as u64,
                limit = self.max_requests,
                "rate limit reached, waiting for a slot"
            );
            tokio::time::sleep(wait).await;
            waited += wait;
        }
    }

    pub fn metrics(&self) -> RateLimitMetrics {
        let inner = self.inner.lock();
        let now = Instant::now();
        let in_window = inner
            .calls
            .iter()
            .filter(|at| now.duration_since(**at) < self.window)
            .count();

        RateLimitMetrics {
            max_requests: self.max_requests,
            window_secs: self.window.as_secs(),
            in_window,
            throttled: inner.throttled,
            total_wait_ms: inner.waited.as_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn calls_within_limit_do_not_wait() {
        let limiter = RateLimiter::with_window(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        assert_eq!(limiter.metrics().in_window, 3);
        assert_eq!(limiter.metrics().throttled, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn full_window_waits_for_oldest_to_leave() {
        let limiter = RateLimiter::with_window(2, Duration::from_secs(60));
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(20)).await;
        limiter.acquire().await;

        let start = Instant::now();
        let waited = limiter.acquire().await;

        assert_eq!(waited, Duration::from_secs(40));
        assert_eq!(start.elapsed(), Duration::from_secs(40));
        assert_eq!(limiter.metrics().throttled, 1);
    }
}
