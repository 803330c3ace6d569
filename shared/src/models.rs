use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════════
// INPUT RECORDS
// ═══════════════════════════════════════════════════════════════════════════

/// Organization owning one or more contracts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub is_customer: bool,
    #[serde(default)]
    pub hidden: bool,
}

/// Contract lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Draft,
    Live,
    Ended,
}

impl std::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractStatus::Draft => write!(f, "draft"),
            ContractStatus::Live => write!(f, "live"),
            ContractStatus::Ended => write!(f, "ended"),
        }
    }
}

/// A customer contract. Service line items hang off it by `contract_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub status: ContractStatus,
    pub service_started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// 0 means the contract never renews periodically.
    #[serde(default)]
    pub renewal_cadence_months: u32,
}

impl Contract {
    /// True when the contract is `Ended` and its end instant is at or before `at`.
    pub fn has_ended_by(&self, at: DateTime<Utc>) -> bool {
        self.status == ContractStatus::Ended && self.ended_at.map_or(false, |end| end <= at)
    }

    /// End instant of an `Ended` contract.
    pub fn end_instant(&self) -> Option<DateTime<Utc>> {
        match self.status {
            ContractStatus::Ended => self.ended_at,
            _ => None,
        }
    }
}

/// How often a service line item is billed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    Annually,
    OneTime,
}

/// The recurring subset of [`BillingCycle`]. Only these take part in ARR math.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recurrence {
    Monthly,
    Quarterly,
    Annually,
}

impl BillingCycle {
    pub fn recurrence(self) -> Option<Recurrence> {
        match self {
            BillingCycle::Monthly => Some(Recurrence::Monthly),
            BillingCycle::Quarterly => Some(Recurrence::Quarterly),
            BillingCycle::Annually => Some(Recurrence::Annually),
            BillingCycle::OneTime => None,
        }
    }

    pub fn is_recurring(self) -> bool {
        self.recurrence().is_some()
    }
}

impl Recurrence {
    /// Billing periods per year.
    pub fn periods_per_year(self) -> u32 {
        match self {
            Recurrence::Monthly => 12,
            Recurrence::Quarterly => 4,
            Recurrence::Annually => 1,
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillingCycle::Monthly => write!(f, "MONTHLY"),
            BillingCycle::Quarterly => write!(f, "QUARTERLY"),
            BillingCycle::Annually => write!(f, "ANNUALLY"),
            BillingCycle::OneTime => write!(f, "ONE_TIME"),
        }
    }
}

/// One immutable version of a service line item.
///
/// Valid over `[started_at, ended_at)`; an open `ended_at` means the version
/// is current. `lineage_parent_id` points at the version this one amends.
/// Root versions leave it empty or point it at themselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLineItem {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub lineage_parent_id: Option<Uuid>,
    pub billing: BillingCycle,
    pub price: Decimal,
    pub quantity: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub canceled: bool,
}

impl ServiceLineItem {
    /// Parent id with the self-parented root convention folded away.
    pub fn parent_id(&self) -> Option<Uuid> {
        self.lineage_parent_id.filter(|parent| *parent != self.id)
    }
}

/// Everything the engine reads for one tenant, fetched up front and never
/// mutated during a computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSnapshot {
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub contracts: Vec<Contract>,
    #[serde(default)]
    pub service_line_items: Vec<ServiceLineItem>,
}

impl RevenueSnapshot {
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════

/// Revenue movements classified for one calendar month
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArrBreakdownMonth {
    pub year: i32,
    pub month: u32,
    pub newly_contracted: Decimal,
    pub renewals: Decimal,
    pub upsells: Decimal,
    pub downgrades: Decimal,
    pub cancellations: Decimal,
    pub churned: Decimal,
}

impl ArrBreakdownMonth {
    pub fn empty(year: i32, month: u32) -> Self {
        Self {
            year,
            month,
            newly_contracted: Decimal::ZERO,
            renewals: Decimal::ZERO,
            upsells: Decimal::ZERO,
            downgrades: Decimal::ZERO,
            cancellations: Decimal::ZERO,
            churned: Decimal::ZERO,
        }
    }

    /// Net ARR movement attributed to this month, renewals excluded
    /// (a renewal keeps revenue, it does not move it).
    pub fn net_movement(&self) -> Decimal {
        self.newly_contracted + self.upsells
            - self.downgrades
            - self.cancellations
            - self.churned
    }
}

/// ARR breakdown for a requested period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArrBreakdown {
    pub arr_breakdown: Decimal,
    pub increase_percentage: String,
    pub per_month: Vec<ArrBreakdownMonth>,
}
