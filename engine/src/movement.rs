//! Per-month movement classification.
//!
//! Every figure is derived from lineage values read at fixed instants of the
//! bucket: `opening` (last instant of the previous month), `closing` (last
//! instant of this month), version start instants, and the instant a lineage
//! exits. Contracts are folded into one [`Movement`] per month without any
//! shared counters, so buckets can be classified independently.

use std::ops::Add;

use arr_shared::ArrBreakdownMonth;
use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;

use crate::calendar::{month_index, MonthBucket};
use crate::config::RenewalValuation;
use crate::lineage::Lineage;
use crate::snapshot::{ContractBook, RevenueBook};

/// Amounts moved within one month
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Movement {
    pub newly_contracted: Decimal,
    pub renewals: Decimal,
    pub upsells: Decimal,
    pub downgrades: Decimal,
    pub cancellations: Decimal,
    pub churned: Decimal,
}

impl Movement {
    pub fn into_month(self, year: i32, month: u32) -> ArrBreakdownMonth {
        ArrBreakdownMonth {
            year,
            month,
            newly_contracted: self.newly_contracted.normalize(),
            renewals: self.renewals.normalize(),
            upsells: self.upsells.normalize(),
            downgrades: self.downgrades.normalize(),
            cancellations: self.cancellations.normalize(),
            churned: self.churned.normalize(),
        }
    }

    fn record_delta(&mut self, delta: Decimal) {
        if delta > Decimal::ZERO {
            self.upsells += delta;
        } else if delta < Decimal::ZERO {
            self.downgrades += -delta;
        }
    }
}

impl Add for Movement {
    type Output = Movement;

    fn add(self, other: Movement) -> Movement {
        Movement {
            newly_contracted: self.newly_contracted + other.newly_contracted,
            renewals: self.renewals + other.renewals,
            upsells: self.upsells + other.upsells,
            downgrades: self.downgrades + other.downgrades,
            cancellations: self.cancellations + other.cancellations,
            churned: self.churned + other.churned,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitKind {
    Cancellation,
    Churn,
}

#[derive(Debug, Clone, Copy)]
struct Exit {
    kind: ExitKind,
    at: DateTime<Utc>,
}

/// Classify every eligible contract's movement in `bucket`.
pub fn classify_month(
    book: &RevenueBook,
    bucket: &MonthBucket,
    valuation: RenewalValuation,
) -> ArrBreakdownMonth {
    let movement = book
        .contracts()
        .iter()
        .map(|contract| contract_movement(contract, bucket, valuation))
        .fold(Movement::default(), |acc, next| acc + next);

    tracing::debug!(
        year = bucket.year,
        month = bucket.month,
        newly_contracted = %movement.newly_contracted,
        renewals = %movement.renewals,
        upsells = %movement.upsells,
        downgrades = %movement.downgrades,
        cancellations = %movement.cancellations,
        churned = %movement.churned,
        "bucket classified"
    );

    movement.into_month(bucket.year, bucket.month)
}

/// Movement of a single contract in `bucket`.
pub fn contract_movement(
    book: &ContractBook,
    bucket: &MonthBucket,
    valuation: RenewalValuation,
) -> Movement {
    let starts_in = book.service_start().map_or(false, |s| bucket.contains(s));
    let ends_in = book.contract.end_instant().map_or(false, |e| bucket.contains(e));
    let contract_new = starts_in && !ends_in;

    let mut movement = Movement {
        renewals: renewal_value(book, bucket, valuation),
        ..Movement::default()
    };

    for lineage in &book.lineages {
        let opening = book.lineage_value(lineage, bucket.opening());
        let first_start = lineage.first_started_at();
        let appears = bucket.contains(first_start);
        let entry = if opening > Decimal::ZERO {
            opening
        } else if appears {
            book.lineage_value(lineage, first_start)
        } else {
            Decimal::ZERO
        };

        let exit = lineage_exit(book, lineage, bucket, ends_in);
        let lost = exit.map(|exit| value_lost(book, lineage, bucket, exit));

        match (exit, lost) {
            (Some(exit), Some(lost)) if exit.kind == ExitKind::Churn => movement.churned += lost,
            (Some(_), Some(lost)) => movement.cancellations += lost,
            _ => {
                if contract_new {
                    movement.newly_contracted += entry;
                }
            }
        }

        // Appearing and exiting in the same month only reports the exit.
        if exit.is_some() && opening.is_zero() && appears {
            continue;
        }

        let amended = lineage
            .amendments()
            .iter()
            .any(|version| bucket.contains(version.started_at));
        // A line item added to a contract already in service. One that starts
        // ahead of the service start is newly contracted in the start month.
        let expanded = appears
            && book
                .service_start()
                .map_or(false, |start| start < bucket.start);
        if !(amended || expanded) {
            continue;
        }

        let baseline = if starts_in { entry } else { opening };
        let close = lost.unwrap_or_else(|| book.lineage_value(lineage, bucket.closing()));
        movement.record_delta(close - baseline);
    }

    movement
}

/// How the lineage leaves the book in `bucket`, if it does.
fn lineage_exit(
    book: &ContractBook,
    lineage: &Lineage,
    bucket: &MonthBucket,
    ends_in: bool,
) -> Option<Exit> {
    if ends_in {
        let end = book.contract.end_instant()?;
        let at = match lineage.exit_at() {
            Some(exit) if exit < end => exit,
            _ => end,
        };
        // Already gone before the month began; nothing left to churn.
        return (at >= bucket.start).then_some(Exit {
            kind: ExitKind::Churn,
            at,
        });
    }

    let at = lineage.exit_at().filter(|at| bucket.contains(*at))?;
    Some(Exit {
        kind: ExitKind::Cancellation,
        at,
    })
}

/// ARR that disappears with the exit. A cancellation that replaced a priced
/// version within the month takes the replaced figure, not its own.
fn value_lost(book: &ContractBook, lineage: &Lineage, bucket: &MonthBucket, exit: Exit) -> Decimal {
    let (last, previous) = lineage.final_pair();
    let valued_at = if exit.kind == ExitKind::Cancellation
        && last.canceled
        && previous.is_some()
        && last.started_at >= bucket.start
    {
        last.started_at
    } else {
        exit.at
    };
    book.lineage_value(lineage, valued_at - Duration::nanoseconds(1))
}

/// Renewal falling in `bucket`: at most one instant per month for a fixed
/// cadence, computed from the service start each time.
fn renewal_value(
    book: &ContractBook,
    bucket: &MonthBucket,
    valuation: RenewalValuation,
) -> Decimal {
    let cadence = book.contract.renewal_cadence_months;
    if cadence == 0 {
        return Decimal::ZERO;
    }
    let Some(start) = book.service_start() else {
        return Decimal::ZERO;
    };

    let elapsed = bucket.index() - month_index(start);
    if elapsed <= 0 || elapsed % i64::from(cadence) != 0 {
        return Decimal::ZERO;
    }
    let Some(renewal) = u32::try_from(elapsed)
        .ok()
        .and_then(|months| start.checked_add_months(Months::new(months)))
    else {
        return Decimal::ZERO;
    };
    if book.contract.has_ended_by(renewal) {
        return Decimal::ZERO;
    }

    let arr: Decimal = book
        .lineages
        .iter()
        .filter(|lineage| !lineage.canceled_by(renewal))
        .filter_map(|lineage| lineage.active_at(renewal))
        .map(|version| version.arr)
        .sum();

    match valuation {
        RenewalValuation::RenewalTerm => {
            let term = arr.saturating_mul(Decimal::from(cadence));
            (term / Decimal::from(12u32)).round_dp(2)
        }
        RenewalValuation::Annualized => arr,
    }
}
