//! crates/rc_practice_core/src/time.rs
//!
//! Clock and calendar helpers. All day arithmetic in the crate goes through here.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::System`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Maps instants to practice days using one UTC offset for the whole deployment,
/// so "today" does not drift with the server's local timezone.
#[derive(Debug, Clone, Copy)]
pub struct PracticeCalendar {
    offset: FixedOffset,
}

impl PracticeCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Returns `None` when the offset is outside +/- 24 hours.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::new)
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    pub fn today(&self, clock: &Clock) -> NaiveDate {
        self.day_of(clock.now())
    }
}

impl Default for PracticeCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

/// Renders elapsed seconds as `m:ss`.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
