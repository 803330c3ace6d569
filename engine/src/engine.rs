use arr_shared::{ArrBreakdown, ArrBreakdownMonth, BreakdownError, BreakdownResult, RevenueSnapshot};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::calendar::{month_buckets, MonthBucket, PeriodRequest};
use crate::config::EngineConfig;
use crate::lineage::LineageFault;
use crate::movement::classify_month;
use crate::report::format_report;
use crate::snapshot::RevenueBook;

/// A finished report plus the lineages that were left out of it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownOutcome {
    pub breakdown: ArrBreakdown,
    pub faults: Vec<LineageFault>,
}

/// Computes ARR breakdowns over in-memory snapshots.
///
/// Holds no state between calls; one instance can serve concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct ArrBreakdownEngine {
    config: EngineConfig,
}

impl ArrBreakdownEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the report for `period`, resolving missing bounds against `now`.
    ///
    /// An invalid period fails before any revenue is read.
    pub fn compute(
        &self,
        snapshot: &RevenueSnapshot,
        period: PeriodRequest,
        now: DateTime<Utc>,
    ) -> BreakdownResult<BreakdownOutcome> {
        let (start, end) = period.resolve(now, self.config.default_window_months)?;
        let buckets = month_buckets(start, end)?;
        let (Some(first), Some(last)) = (buckets.first(), buckets.last()) else {
            return Err(BreakdownError::InvalidPeriod { start, end });
        };

        let book = RevenueBook::build(snapshot);
        let per_month = self.classify(&book, &buckets);

        let previous = book.snapshot_arr(first.opening());
        let current = book.snapshot_arr(last.closing());
        let breakdown = format_report(previous, current, per_month);

        info!(
            start = %start,
            end = %end,
            months = buckets.len(),
            arr = %breakdown.arr_breakdown,
            increase = %breakdown.increase_percentage,
            faults = book.faults().len(),
            "ARR breakdown computed"
        );

        Ok(BreakdownOutcome {
            breakdown,
            faults: book.faults().to_vec(),
        })
    }

    fn classify(&self, book: &RevenueBook, buckets: &[MonthBucket]) -> Vec<ArrBreakdownMonth> {
        let valuation = self.config.renewal_valuation;
        if self.config.parallel_buckets {
            buckets
                .par_iter()
                .map(|bucket| classify_month(book, bucket, valuation))
                .collect()
        } else {
            buckets
                .iter()
                .map(|bucket| classify_month(book, bucket, valuation))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reversed_period_fails_without_computing() {
        let engine = ArrBreakdownEngine::default();
        let start = Utc.with_ymd_and_hms(2023, 8, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 7, 1, 0, 0, 0).unwrap();
        let err = engine
            .compute(&RevenueSnapshot::default(), PeriodRequest::between(start, end), end)
            .unwrap_err();
        assert_eq!(err, BreakdownError::InvalidPeriod { start, end });
    }

    #[test]
    fn empty_snapshot_yields_zero_rows() {
        let engine = ArrBreakdownEngine::default();
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let outcome = engine
            .compute(&RevenueSnapshot::default(), PeriodRequest::default(), now)
            .unwrap();
        assert_eq!(outcome.breakdown.per_month.len(), 12);
        assert_eq!(outcome.breakdown.increase_percentage, "0%");
        assert!(outcome
            .breakdown
            .per_month
            .iter()
            .all(|row| *row == ArrBreakdownMonth::empty(row.year, row.month)));
    }
}
