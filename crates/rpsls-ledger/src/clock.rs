//! Wall-clock abstraction shared by the ledger and its clients.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Source of "now"
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current time as unix seconds, the ledger's timestamp precision
    fn unix_secs(&self) -> u64 {
        self.now().timestamp().max(0) as u64
    }
}

/// Real time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that follows real time until frozen or advanced (for timeout testing)
#[derive(Clone, Debug, Default)]
pub struct SimClock {
    current: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock pinned at the given instant
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(Some(instant))),
        }
    }

    /// Advance simulated time by seconds
    pub fn advance_secs(&self, seconds: i64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        let base = current.unwrap_or_else(Utc::now);
        *current = Some(base + Duration::seconds(seconds));
    }
}

impl Clock for SimClock {
    fn now(&self) -> DateTime<Utc> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_clock_advances() {
        let start = Utc::now();
        let clock = SimClock::at(start);
        clock.advance_secs(301);

        assert_eq!(clock.now(), start + Duration::seconds(301));
        assert_eq!(clock.unix_secs(), (start.timestamp() + 301) as u64);
    }

    #[test]
    fn test_clones_share_time() {
        let clock = SimClock::at(Utc::now());
        let other = clock.clone();
        clock.advance_secs(10);

        assert_eq!(clock.now(), other.now());
    }
}
