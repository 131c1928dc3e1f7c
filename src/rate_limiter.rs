//! Pacing of recognition requests during a batch.
//!
//! Requests are spaced by a configured minimum gap. On top of that the
//! limiter backs off only when a backend says it is being throttled
//! ([`RecognizeError::RateLimited`]): songrec's undecodable Shazam replies,
//! HTTP 429 or ACRCloud's quota codes. Other failures leave the pace alone.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::RecognizeError;
use crate::recognizer::Recognition;

/// First backoff step when no minimum gap is configured.
const BACKOFF_FLOOR: Duration = Duration::from_secs(2);
const BACKOFF_CEILING: Duration = Duration::from_secs(120);

#[derive(Debug)]
pub struct RateLimiter {
    backend: String,
    min_gap: Duration,
    backoff: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    /// `min_gap` may be zero: requests then go out back to back until the
    /// service pushes back.
    pub fn new(backend: &str, min_gap: Duration) -> Self {
        RateLimiter {
            backend: backend.to_string(),
            min_gap,
            backoff: Duration::ZERO,
            last_request: None,
        }
    }

    /// Gap currently enforced between two requests.
    pub fn current_gap(&self) -> Duration {
        self.min_gap.max(self.backoff)
    }

    /// How long a request made `since_last` after the previous one must wait.
    fn wait_for(&self, since_last: Duration) -> Duration {
        self.current_gap().saturating_sub(since_last)
    }

    /// Block until the next request may go out, and record it.
    pub fn pace(&mut self) {
        if let Some(last) = self.last_request {
            let wait = self.wait_for(last.elapsed());
            if !wait.is_zero() {
                debug!("[{}] waiting {:.1}s before next request", self.backend, wait.as_secs_f64());
                thread::sleep(wait);
            }
        }
        self.last_request = Some(Instant::now());
    }

    /// Adjust the pace from the outcome of the request just made.
    pub fn observe(&mut self, result: &Result<Recognition, RecognizeError>) {
        match result {
            Err(RecognizeError::RateLimited(reason)) => self.throttled(reason),
            Ok(_) => self.relax(),
            // Broken files and network errors say nothing about the quota
            Err(_) => {}
        }
    }

    fn throttled(&mut self, reason: &str) {
        let step = self.min_gap.max(BACKOFF_FLOOR);
        self.backoff = (self.backoff * 2).max(step).min(BACKOFF_CEILING);
        warn!(
            "[{}] throttled ({}), spacing requests {:.0}s apart",
            self.backend,
            reason,
            self.backoff.as_secs_f64()
        );
    }

    fn relax(&mut self) {
        if self.backoff.is_zero() {
            return;
        }
        self.backoff /= 2;
        if self.backoff <= self.min_gap || self.backoff < BACKOFF_FLOOR {
            self.backoff = Duration::ZERO;
            info!("[{}] back to normal request pace", self.backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttled() -> Result<Recognition, RecognizeError> {
        Err(RecognizeError::RateLimited("quota".to_string()))
    }

    #[test]
    fn test_min_gap_spacing() {
        let limiter = RateLimiter::new("test", Duration::from_millis(500));
        assert_eq!(limiter.wait_for(Duration::from_millis(200)), Duration::from_millis(300));
        assert_eq!(limiter.wait_for(Duration::from_secs(1)), Duration::ZERO);

        let unpaced = RateLimiter::new("test", Duration::ZERO);
        assert_eq!(unpaced.wait_for(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_backs_off_only_when_throttled() {
        let mut limiter = RateLimiter::new("test", Duration::ZERO);

        limiter.observe(&Err(RecognizeError::Transport("refused".to_string())));
        limiter.observe(&Ok(Recognition::NotRecognized));
        assert_eq!(limiter.current_gap(), Duration::ZERO);

        limiter.observe(&throttled());
        assert_eq!(limiter.current_gap(), BACKOFF_FLOOR);
        limiter.observe(&throttled());
        assert_eq!(limiter.current_gap(), BACKOFF_FLOOR * 2);
    }

    #[test]
    fn test_backoff_is_capped_and_recovers() {
        let mut limiter = RateLimiter::new("test", Duration::from_secs(5));
        for _ in 0..10 {
            limiter.observe(&throttled());
        }
        assert_eq!(limiter.current_gap(), BACKOFF_CEILING);

        // ceiling 120 -> 60 -> 30 -> 15 -> 7.5 -> 3.75, below the gap
        for _ in 0..5 {
            limiter.observe(&Ok(Recognition::NotRecognized));
        }
        assert_eq!(limiter.current_gap(), Duration::from_secs(5));
    }

    #[test]
    fn test_pace_sleeps_between_requests() {
        let mut limiter = RateLimiter::new("test", Duration::from_millis(30));
        let start = Instant::now();
        limiter.pace();
        limiter.pace();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
