use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use pharos_core::config::RouteConfig;
use pharos_core::ConfigError;

/// Source of wall-clock time for the route window.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Daily UTC window in which accounts may start a new cycle.
///
/// `start > end` wraps past midnight; `start == end` is always open. The end
/// bound is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl RouteWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn always_open() -> Self {
        Self::new(NaiveTime::MIN, NaiveTime::MIN)
    }

    pub fn from_config(route: &RouteConfig) -> Result<Self, ConfigError> {
        let (start, end) = route.window_bounds()?;
        Ok(Self::new(start, end))
    }

    pub fn is_always_open(&self) -> bool {
        self.start == self.end
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let t = now.time();
        if self.start == self.end {
            true
        } else if self.start < self.end {
            t >= self.start && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }

    /// Time left until the window next opens; zero while it is open.
    pub fn until_open(&self, now: DateTime<Utc>) -> Duration {
        if self.is_open(now) {
            return Duration::ZERO;
        }
        // Closed means we are before today's start or past it with the
        // window already shut, in which case it reopens tomorrow.
        let today = now.date_naive().and_time(self.start).and_utc();
        let next = if today > now {
            today
        } else {
            today + chrono::Duration::days(1)
        };
        (next - now).to_std().unwrap_or(Duration::ZERO)
    }
}

impl Default for RouteWindow {
    fn default() -> Self {
        Self::always_open()
    }
}
