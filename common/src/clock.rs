use chrono::{DateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Source of wall-clock time and the device's current zone.
pub trait WallClock {
    fn now_ms(&self) -> i64;
    fn local_timezone(&self) -> Tz;
}

/// Reads the system clock; the zone is whatever the host last reported.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    pub timezone: Tz,
}

impl WallClock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn local_timezone(&self) -> Tz {
        self.timezone
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub now_ms: i64,
    pub timezone: Tz,
}

impl FixedClock {
    pub fn new(now_ms: i64, timezone: Tz) -> Self {
        Self { now_ms, timezone }
    }
}

impl WallClock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.now_ms
    }

    fn local_timezone(&self) -> Tz {
        self.timezone
    }
}

#[derive(Debug, Clone)]
pub struct ClockState {
    current_time_ms: i64,
    timezone: Tz,
}

impl ClockState {
    pub fn new(now_ms: i64, timezone: Tz) -> Self {
        Self {
            current_time_ms: now_ms,
            timezone,
        }
    }

    pub fn current_time_ms(&self) -> i64 {
        self.current_time_ms
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn sample(&mut self, now_ms: i64) {
        self.current_time_ms = now_ms;
    }

    /// Returns true when the zone actually changed.
    pub fn set_timezone(&mut self, timezone: Tz) -> bool {
        if self.timezone == timezone {
            return false;
        }
        self.timezone = timezone;
        true
    }

    pub fn local_time(&self) -> DateTime<Tz> {
        let utc = DateTime::<Utc>::from_timestamp_millis(self.current_time_ms)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        self.timezone.from_utc_datetime(&utc.naive_utc())
    }

    /// Hour of the half-day (0..=11) and zero-padded minutes, e.g. `0:05`.
    pub fn time_text(&self) -> String {
        let local = self.local_time();
        format!("{}:{:02}", local.hour() % 12, local.minute())
    }

    /// e.g. `Sun, Oct 18 2026`.
    pub fn date_text(&self) -> String {
        self.local_time().format("%a, %b %d %Y").to_string()
    }
}
