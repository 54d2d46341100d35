use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};

/// Source of "now" for allocation.
///
/// `today` drives the overdue/upcoming split; `now` stamps `paid_at`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn today(&self) -> NaiveDate;
}

/// Wall clock. The calendar date is taken in the local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedClock {
    now: DateTime<Utc>,
    today: NaiveDate,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            today: now.date_naive(),
        }
    }

    /// Frozen at midnight UTC of `today`.
    pub fn on(today: NaiveDate) -> Self {
        Self {
            now: today.and_time(NaiveTime::MIN).and_utc(),
            today,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}
