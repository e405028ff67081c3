use std::time::{Duration, SystemTime};

/// Tracks when the notification list was last fetched and whether a
/// background refresh is due.
pub struct RefreshScheduler {
    interval: Duration,
    // SystemTime (wall clock) intentionally. Instant uses CLOCK_MONOTONIC,
    // which freezes during laptop sleep, causing missed refreshes after wake.
    last_fetch: Option<SystemTime>,
}

impl RefreshScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fetch: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record a successful fetch that finished just now.
    pub fn mark_fetched(&mut self) {
        self.mark_fetched_at(SystemTime::now());
    }

    pub fn mark_fetched_at(&mut self, at: SystemTime) {
        self.last_fetch = Some(at);
    }

    /// Whether the interval has elapsed since the last fetch.
    ///
    /// Never due before the first successful load; that one is requested
    /// explicitly.
    pub fn is_due(&self) -> bool {
        self.is_due_at(SystemTime::now())
    }

    pub fn is_due_at(&self, now: SystemTime) -> bool {
        self.last_fetch
            .is_some_and(|t| now.duration_since(t).unwrap_or(Duration::ZERO) >= self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_due_before_first_fetch() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(60));
        assert!(!scheduler.is_due());
    }

    #[test]
    fn due_once_interval_elapsed() {
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(60));
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        scheduler.mark_fetched_at(t0);
        assert!(!scheduler.is_due_at(t0 + Duration::from_secs(59)));
        assert!(scheduler.is_due_at(t0 + Duration::from_secs(60)));
    }

    #[test]
    fn clock_going_backwards_is_not_due() {
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(60));
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        scheduler.mark_fetched_at(t0);
        assert!(!scheduler.is_due_at(t0 - Duration::from_secs(500)));
    }
}
