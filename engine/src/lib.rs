//! ARR breakdown engine.
//!
//! Pure computation over a [`RevenueSnapshot`](arr_shared::RevenueSnapshot):
//! lineages are rebuilt from version records, eligible contracts are valued
//! at month boundaries and every month's movements are classified into the
//! six report columns.

pub mod annualize;
pub mod calendar;
pub mod config;
pub mod eligibility;
pub mod engine;
pub mod lineage;
pub mod movement;
pub mod report;
pub mod snapshot;

pub use annualize::annualize;
pub use calendar::{month_buckets, MonthBucket, PeriodRequest};
pub use config::{ConfigError, EngineConfig, RenewalValuation};
pub use eligibility::EligibilityFilter;
pub use engine::{ArrBreakdownEngine, BreakdownOutcome};
pub use lineage::{resolve_lineages, FaultKind, Lineage, LineageFault, LineageSet, Version};
pub use movement::{classify_month, Movement};
pub use report::{format_report, IncreaseIndicator, ParseIndicatorError};
pub use snapshot::{ContractBook, RevenueBook};
