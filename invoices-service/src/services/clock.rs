//! Injected clock so date-dependent logic (statistics windows, credit note
//! terms) stays deterministic under test.

use chrono::NaiveDate;

pub trait Clock: Send + Sync {
    /// The current calendar date.
    fn today(&self) -> NaiveDate;
}

/// Wall clock, UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Utc::now().date_naive()
    }
}

/// Clock pinned to a single date. Use this in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
