//! Point-in-time ARR over the eligible part of a tenant's book.

use std::collections::HashMap;

use arr_shared::{Contract, RevenueSnapshot};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::eligibility::EligibilityFilter;
use crate::lineage::{resolve_lineages, Lineage, LineageFault};

/// An eligible contract together with its recurring lineages
#[derive(Debug, Clone)]
pub struct ContractBook {
    pub contract: Contract,
    pub lineages: Vec<Lineage>,
}

impl ContractBook {
    /// Lineage value at `at`, forced to zero once the contract has ended.
    pub fn lineage_value(&self, lineage: &Lineage, at: DateTime<Utc>) -> Decimal {
        if self.contract.has_ended_by(at) {
            return Decimal::ZERO;
        }
        lineage.value_at(at)
    }

    /// When service began: the contract's own start, or its earliest
    /// lineage when the contract does not carry one.
    pub fn service_start(&self) -> Option<DateTime<Utc>> {
        self.contract
            .service_started_at
            .or_else(|| self.lineages.iter().map(Lineage::first_started_at).min())
    }

    pub fn arr_at(&self, at: DateTime<Utc>) -> Decimal {
        self.lineages
            .iter()
            .map(|lineage| self.lineage_value(lineage, at))
            .sum()
    }
}

/// Eligible contracts with resolved lineages, built once per computation
/// and shared read-only by every bucket.
#[derive(Debug, Clone, Default)]
pub struct RevenueBook {
    contracts: Vec<ContractBook>,
    faults: Vec<LineageFault>,
}

impl RevenueBook {
    pub fn build(snapshot: &RevenueSnapshot) -> Self {
        let filter = EligibilityFilter::new(&snapshot.organizations);

        let mut index: HashMap<Uuid, usize> = HashMap::new();
        let mut contracts = Vec::new();
        for contract in snapshot.contracts.iter().filter(|c| filter.is_eligible(c)) {
            index.insert(contract.id, contracts.len());
            contracts.push(ContractBook {
                contract: contract.clone(),
                lineages: Vec::new(),
            });
        }

        let resolved = resolve_lineages(&snapshot.service_line_items);
        for lineage in resolved.lineages {
            if let Some(&slot) = index.get(&lineage.contract_id) {
                contracts[slot].lineages.push(lineage);
            }
        }

        tracing::debug!(
            eligible_contracts = contracts.len(),
            total_contracts = snapshot.contracts.len(),
            faults = resolved.faults.len(),
            "revenue book built"
        );

        Self {
            contracts,
            faults: resolved.faults,
        }
    }

    pub fn contracts(&self) -> &[ContractBook] {
        &self.contracts
    }

    pub fn faults(&self) -> &[LineageFault] {
        &self.faults
    }

    /// Total ARR across every eligible contract at `at`. Never negative for
    /// non-negative prices.
    pub fn snapshot_arr(&self, at: DateTime<Utc>) -> Decimal {
        self.contracts.iter().map(|book| book.arr_at(at)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arr_shared::{BillingCycle, ContractStatus, Organization, ServiceLineItem};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn snapshot(
        is_customer: bool,
        status: ContractStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> RevenueSnapshot {
        let org = Uuid::from_u128(1);
        let contract = Uuid::from_u128(2);
        RevenueSnapshot {
            organizations: vec![Organization {
                id: org,
                is_customer,
                hidden: false,
            }],
            contracts: vec![Contract {
                id: contract,
                organization_id: org,
                status,
                service_started_at: Some(at(2023, 7, 1)),
                ended_at,
                renewal_cadence_months: 0,
            }],
            service_line_items: vec![ServiceLineItem {
                id: Uuid::from_u128(3),
                contract_id: contract,
                lineage_parent_id: None,
                billing: BillingCycle::Monthly,
                price: dec!(5),
                quantity: 2,
                started_at: at(2023, 7, 1),
                ended_at: None,
                canceled: false,
            }],
        }
    }

    #[test]
    fn sums_active_versions() {
        let book = RevenueBook::build(&snapshot(true, ContractStatus::Live, None));
        assert_eq!(book.snapshot_arr(at(2023, 6, 30)), Decimal::ZERO);
        assert_eq!(book.snapshot_arr(at(2023, 7, 1)), dec!(120));
    }

    #[test]
    fn service_start_falls_back_to_first_lineage() {
        let mut input = snapshot(true, ContractStatus::Live, None);
        input.contracts[0].service_started_at = None;
        input.service_line_items[0].started_at = at(2023, 8, 15);
        let book = RevenueBook::build(&input);
        assert_eq!(book.contracts()[0].service_start(), Some(at(2023, 8, 15)));
    }

    #[test]
    fn ineligible_contracts_contribute_nothing() {
        let book = RevenueBook::build(&snapshot(false, ContractStatus::Live, None));
        assert!(book.contracts().is_empty());
        assert_eq!(book.snapshot_arr(at(2024, 1, 1)), Decimal::ZERO);
    }

    #[test]
    fn ended_contract_stops_at_its_end() {
        let book = RevenueBook::build(&snapshot(true, ContractStatus::Ended, Some(at(2023, 9, 1))));
        assert_eq!(book.snapshot_arr(at(2023, 8, 31)), dec!(120));
        assert_eq!(book.snapshot_arr(at(2023, 9, 1)), Decimal::ZERO);
    }
}
