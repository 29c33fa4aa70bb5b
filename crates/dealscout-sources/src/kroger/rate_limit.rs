//! Rolling-window request governor for the Kroger API.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Admits at most `max_requests` calls per rolling `window`.
///
/// A caller over the budget is suspended until the oldest admission leaves
/// the window. Only the calling task waits.
#[derive(Debug)]
pub struct RateGovernor {
    max_requests: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateGovernor {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: usize::try_from(max_requests.max(1)).unwrap_or(usize::MAX),
            window,
            admitted: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    /// Waits until a slot is free, then records the admission.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut admitted = self.admitted.lock().await;
                let now = Instant::now();
                while admitted
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.window)
                {
                    admitted.pop_front();
                }
                if admitted.len() < self.max_requests {
                    admitted.push_back(now);
                    return;
                }
                match admitted.front() {
                    Some(oldest) => (*oldest + self.window).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            };
            tracing::debug!(wait_ms = wait.as_millis(), "kroger request budget exhausted, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Admissions currently counted against the window.
    pub async fn in_flight(&self) -> usize {
        let mut admitted = self.admitted.lock().await;
        let now = Instant::now();
        admitted.retain(|t| now.duration_since(*t) < self.window);
        admitted.len()
    }
}
