//! Polite request pacing.
//!
//! EDGAR's fair-use policy allows roughly ten requests per second; the
//! limiter enforces a minimum delay between consecutive requests from this
//! client. The mutex is held across the sleep, so callers queue up and go
//! out strictly one at a time.

use std::time::Duration;

use tokio::{
  sync::Mutex,
  time::{Instant, sleep},
};

pub struct RateLimiter {
  min_delay: Duration,
  last:      Mutex<Option<Instant>>,
}

impl RateLimiter {
  pub fn new(min_delay: Duration) -> Self {
    Self { min_delay, last: Mutex::new(None) }
  }

  /// Wait until the minimum delay since the previous request has passed.
  pub async fn acquire(&self) {
    let mut last = self.last.lock().await;
    if let Some(prev) = *last {
      let elapsed = prev.elapsed();
      if elapsed < self.min_delay {
        sleep(self.min_delay - elapsed).await;
      }
    }
    *last = Some(Instant::now());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn spaces_out_consecutive_requests() {
    let limiter = RateLimiter::new(Duration::from_millis(150));

    let start = Instant::now();
    limiter.acquire().await;
    limiter.acquire().await;
    limiter.acquire().await;

    assert!(start.elapsed() >= Duration::from_millis(300));
  }

  #[tokio::test(start_paused = true)]
  async fn first_request_goes_immediately() {
    let limiter = RateLimiter::new(Duration::from_millis(150));

    let start = Instant::now();
    limiter.acquire().await;
    assert_eq!(start.elapsed(), Duration::ZERO);
  }
}
