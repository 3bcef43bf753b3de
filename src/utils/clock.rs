//! Monotonic capture clock.
//!
//! Version ids embed the capture time in milliseconds, so two captures of the
//! same document within one millisecond would collide. The clock hands out
//! strictly increasing instants instead, nudging forward by a millisecond when
//! wall time has not advanced (or went backwards).

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

/// Process-wide source of unique capture instants.
#[derive(Debug, Default)]
pub struct VersionClock {
    last_millis: AtomicI64,
}

impl VersionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next capture instant, strictly after every previous one.
    pub fn next(&self) -> DateTime<Utc> {
        self.next_after(Utc::now().timestamp_millis())
    }

    fn next_after(&self, now_millis: i64) -> DateTime<Utc> {
        let mut last = self.last_millis.load(Ordering::Relaxed);
        loop {
            let candidate = now_millis.max(last + 1);
            match self.last_millis.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return millis_to_datetime(candidate),
                Err(actual) => last = actual,
            }
        }
    }
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}
