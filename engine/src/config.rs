/// Engine configuration module
/// Tunables for period defaulting, bucket fan-out and renewal valuation

use std::env;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// How a renewal is valued in the Renewals column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenewalValuation {
    /// ARR scaled to one renewal term (`arr * cadence / 12`)
    #[default]
    RenewalTerm,
    /// Plain ARR at the renewal instant
    Annualized,
}

impl FromStr for RenewalValuation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "term" | "renewal_term" => Ok(RenewalValuation::RenewalTerm),
            "annualized" | "arr" => Ok(RenewalValuation::Annualized),
            other => Err(ConfigError::InvalidConfig(format!(
                "Invalid renewal valuation: {} (expected term or annualized)",
                other
            ))),
        }
    }
}

impl fmt::Display for RenewalValuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenewalValuation::RenewalTerm => write!(f, "term"),
            RenewalValuation::Annualized => write!(f, "annualized"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Rows produced when the caller gives no start.
    pub default_window_months: u32,
    pub parallel_buckets: bool,
    pub renewal_valuation: RenewalValuation,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_window_months: 12,
            parallel_buckets: true,
            renewal_valuation: RenewalValuation::RenewalTerm,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let default_window_months = match lookup("ARR_DEFAULT_WINDOW_MONTHS") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| {
                ConfigError::InvalidConfig(format!("Invalid default window: {} ({})", raw, e))
            })?,
            None => defaults.default_window_months,
        };

        // One month to ten years
        if !(1..=120).contains(&default_window_months) {
            return Err(ConfigError::InvalidConfig(
                "Default window must be between 1 and 120 months".to_string(),
            ));
        }

        let parallel_buckets = match lookup("ARR_PARALLEL_BUCKETS") {
            Some(raw) => raw.trim().parse::<bool>().map_err(|e| {
                ConfigError::InvalidConfig(format!(
                    "Invalid parallel buckets flag: {} ({})",
                    raw, e
                ))
            })?,
            None => defaults.parallel_buckets,
        };

        let renewal_valuation = match lookup("ARR_RENEWAL_VALUATION") {
            Some(raw) => raw.parse::<RenewalValuation>()?,
            None => defaults.renewal_valuation,
        };

        info!(
            "Engine configuration loaded: window={}m, parallel_buckets={}, renewal_valuation={}",
            default_window_months, parallel_buckets, renewal_valuation
        );

        Ok(Self {
            default_window_months,
            parallel_buckets,
            renewal_valuation,
        })
    }
}
