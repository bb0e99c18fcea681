//! Time source abstraction for quota accounting.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};

/// Source of wall-clock time for quota accounting.
///
/// Day markers use the LOCAL calendar day: limits reset at local
/// midnight. Tests supply a deterministic implementation instead of
/// the system clock.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Current local calendar day.
    fn today(&self) -> NaiveDate;

    /// Current local time of day.
    fn time_of_day(&self) -> NaiveTime;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn time_of_day(&self) -> NaiveTime {
        Local::now().time()
    }
}
