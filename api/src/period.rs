use arr_engine::PeriodRequest;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid {field}: {value} (expected RFC 3339 or YYYY-MM-DD)")]
pub struct InstantParseError {
    pub field: &'static str,
    pub value: String,
}

/// Parse an RFC 3339 instant, or a bare date taken as midnight UTC.
pub fn parse_instant(field: &'static str, raw: &str) -> Result<DateTime<Utc>, InstantParseError> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| InstantParseError {
            field,
            value: raw.to_string(),
        })
}

/// Build a period from optional raw bounds. Blank values count as absent.
pub fn period_from_params(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<PeriodRequest, InstantParseError> {
    let parse = |field, raw: Option<&str>| {
        raw.filter(|value| !value.trim().is_empty())
            .map(|value| parse_instant(field, value))
            .transpose()
    };
    Ok(PeriodRequest::new(parse("start", start)?, parse("end", end)?))
}
