//! Headline total and change indicator.

use std::fmt;
use std::str::FromStr;

use arr_shared::{ArrBreakdown, ArrBreakdownMonth};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

const MULTIPLE_SIGN: char = '×';

/// Change between the ARR before the period and the ARR at its end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncreaseIndicator {
    /// No visible change, `0%`
    Flat,
    /// Nothing to compare against; the new total itself, `+24`
    Absolute(Decimal),
    /// At least tripled; whole multiples of growth, `3×`
    Multiple(Decimal),
    /// Rounded whole percentage, never zero, `+25%` / `-10%`
    Percent(Decimal),
}

impl IncreaseIndicator {
    pub fn between(old: Decimal, new: Decimal) -> Self {
        if old.is_zero() {
            if new.is_zero() {
                return IncreaseIndicator::Flat;
            }
            return IncreaseIndicator::Absolute(new.normalize());
        }

        // Growth beyond what a Decimal can hold saturates the multiple.
        let Some(pct) = (new - old).checked_div(old) else {
            return IncreaseIndicator::Multiple(Decimal::MAX);
        };
        if pct >= Decimal::TWO {
            return IncreaseIndicator::Multiple(pct.floor().normalize());
        }

        let percent = (pct * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .normalize();
        if percent.is_zero() {
            IncreaseIndicator::Flat
        } else {
            IncreaseIndicator::Percent(percent)
        }
    }

    /// Whether this indicator is what `old` and `new` format to.
    pub fn agrees_with(&self, old: Decimal, new: Decimal) -> bool {
        *self == Self::between(old, new)
    }
}

impl fmt::Display for IncreaseIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncreaseIndicator::Flat => write!(f, "0%"),
            IncreaseIndicator::Absolute(new) if new.is_sign_negative() => write!(f, "{}", new),
            IncreaseIndicator::Absolute(new) => write!(f, "+{}", new),
            IncreaseIndicator::Multiple(n) => write!(f, "{}{}", n, MULTIPLE_SIGN),
            IncreaseIndicator::Percent(p) if p.is_sign_negative() => write!(f, "{}%", p),
            IncreaseIndicator::Percent(p) => write!(f, "+{}%", p),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unrecognised increase indicator: {0}")]
pub struct ParseIndicatorError(String);

impl FromStr for IncreaseIndicator {
    type Err = ParseIndicatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseIndicatorError(s.to_string());
        let number = |raw: &str| {
            Decimal::from_str(raw)
                .map(|d| d.normalize())
                .map_err(|_| invalid())
        };

        if let Some(multiple) = s.strip_suffix(MULTIPLE_SIGN) {
            return Ok(IncreaseIndicator::Multiple(number(multiple)?));
        }
        if let Some(percent) = s.strip_suffix('%') {
            let value = number(percent.trim_start_matches('+'))?;
            return Ok(if value.is_zero() {
                IncreaseIndicator::Flat
            } else {
                IncreaseIndicator::Percent(value)
            });
        }
        if let Some(amount) = s.strip_prefix('+') {
            return Ok(IncreaseIndicator::Absolute(number(amount)?));
        }
        if s.starts_with('-') {
            return Ok(IncreaseIndicator::Absolute(number(s)?));
        }
        Err(invalid())
    }
}

/// Assemble the report from the two boundary totals and the monthly rows.
pub fn format_report(
    previous: Decimal,
    current: Decimal,
    per_month: Vec<ArrBreakdownMonth>,
) -> ArrBreakdown {
    ArrBreakdown {
        arr_breakdown: current.normalize(),
        increase_percentage: IncreaseIndicator::between(previous, current).to_string(),
        per_month,
    }
}
