//! Calendar-month buckets and report period resolution.
//!
//! All arithmetic is in UTC. A bucket covers `[start, end)` where `end` is the
//! first instant of the following month.

use arr_shared::{BreakdownError, BreakdownResult};
use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};

/// One calendar month of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthBucket {
    pub year: i32,
    pub month: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MonthBucket {
    /// The bucket of the month `at` falls in.
    pub fn containing(at: DateTime<Utc>) -> BreakdownResult<Self> {
        let start = Utc
            .with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
            .single()
            .ok_or(BreakdownError::DateOutOfRange(at))?;
        let end = start
            .checked_add_months(Months::new(1))
            .ok_or(BreakdownError::DateOutOfRange(at))?;

        Ok(Self {
            year: at.year(),
            month: at.month(),
            start,
            end,
        })
    }

    pub fn next(&self) -> BreakdownResult<Self> {
        Self::containing(self.end)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// Last instant of the previous month. Values "at month start" are read
    /// here so a version starting on the first instant counts for this month.
    pub fn opening(&self) -> DateTime<Utc> {
        self.start - Duration::nanoseconds(1)
    }

    /// Last instant of this month.
    pub fn closing(&self) -> DateTime<Utc> {
        self.end - Duration::nanoseconds(1)
    }

    pub fn index(&self) -> i64 {
        month_index(self.start)
    }
}

/// Months since year 0, used to compare months without building dates.
pub fn month_index(at: DateTime<Utc>) -> i64 {
    i64::from(at.year()) * 12 + i64::from(at.month0())
}

/// Expand an inclusive `[start, end]` range into the calendar months it touches.
pub fn month_buckets(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> BreakdownResult<Vec<MonthBucket>> {
    if end < start {
        return Err(BreakdownError::InvalidPeriod { start, end });
    }

    let last = month_index(end);
    let mut bucket = MonthBucket::containing(start)?;
    let mut buckets = Vec::with_capacity((last - bucket.index() + 1).max(1) as usize);
    loop {
        buckets.push(bucket);
        if bucket.index() >= last {
            break;
        }
        bucket = bucket.next()?;
    }

    Ok(buckets)
}

/// Caller-supplied period bounds, either of which may be missing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodRequest {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl PeriodRequest {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::new(Some(start), Some(end))
    }

    /// Fill in missing bounds.
    ///
    /// A missing `end` becomes `now` (or `start`, if `start` is in the future).
    /// A missing `start` becomes the first instant of the month
    /// `window_months - 1` months before `end`, so the report has
    /// `window_months` rows.
    pub fn resolve(
        &self,
        now: DateTime<Utc>,
        window_months: u32,
    ) -> BreakdownResult<(DateTime<Utc>, DateTime<Utc>)> {
        let end = match (self.start, self.end) {
            (_, Some(end)) => end,
            (Some(start), None) => start.max(now),
            (None, None) => now,
        };

        let start = match self.start {
            Some(start) => start,
            None => {
                let first = MonthBucket::containing(end)?.start;
                first
                    .checked_sub_months(Months::new(window_months.max(1) - 1))
                    .ok_or(BreakdownError::DateOutOfRange(first))?
            }
        };

        if end < start {
            return Err(BreakdownError::InvalidPeriod { start, end });
        }
        Ok((start, end))
    }
}
