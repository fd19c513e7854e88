use std::sync::{Arc, Mutex};

use chrono::{Duration, Local, NaiveDateTime};

/// Source of the local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Reads the system's local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually driven clock for tests and replays. Clones share the same time.
#[derive(Debug, Clone)]
pub struct FixedClock {
    inner: Arc<Mutex<NaiveDateTime>>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            inner: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NaiveDateTime> {
        // A poisoned clock still holds a valid instant.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn clones_observe_the_same_time() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 10)
            .and_then(|d| d.and_hms_opt(23, 30, 0))
            .expect("datetime");
        let clock = FixedClock::new(start);
        let shared = clock.clone();

        clock.advance(Duration::minutes(45));
        assert_eq!(shared.now(), start + Duration::minutes(45));

        shared.set(start);
        assert_eq!(clock.now(), start);
    }
}
