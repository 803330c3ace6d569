use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures surfaced to callers of the breakdown engine
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BreakdownError {
    /// `end` lies before `start`. The message is user-facing.
    #[error("Failed to get the data for period")]
    InvalidPeriod {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("Date arithmetic out of range near {0}")]
    DateOutOfRange(DateTime<Utc>),
}

impl BreakdownError {
    pub fn is_user_error(&self) -> bool {
        matches!(self, BreakdownError::InvalidPeriod { .. })
    }
}

pub type BreakdownResult<T> = std::result::Result<T, BreakdownError>;
