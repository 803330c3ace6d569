use std::collections::HashMap;

use arr_shared::{Contract, ContractStatus, Organization};
use uuid::Uuid;

/// Decides which contracts take part in any metric at all.
///
/// Built once per computation from the snapshot's organizations.
#[derive(Debug, Clone)]
pub struct EligibilityFilter<'a> {
    organizations: HashMap<Uuid, &'a Organization>,
}

impl<'a> EligibilityFilter<'a> {
    pub fn new(organizations: &'a [Organization]) -> Self {
        Self {
            organizations: organizations.iter().map(|org| (org.id, org)).collect(),
        }
    }

    /// `status != Draft`, owner is a customer, owner is not hidden.
    pub fn is_eligible(&self, contract: &Contract) -> bool {
        if contract.status == ContractStatus::Draft {
            return false;
        }
        match self.organizations.get(&contract.organization_id) {
            Some(org) => org.is_customer && !org.hidden,
            None => {
                tracing::debug!(
                    contract_id = %contract.id,
                    organization_id = %contract.organization_id,
                    "contract owner missing from snapshot, treating as ineligible"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org(id: u128, is_customer: bool, hidden: bool) -> Organization {
        Organization {
            id: Uuid::from_u128(id),
            is_customer,
            hidden,
        }
    }

    fn contract(org: u128, status: ContractStatus) -> Contract {
        Contract {
            id: Uuid::from_u128(100 + org),
            organization_id: Uuid::from_u128(org),
            status,
            service_started_at: None,
            ended_at: None,
            renewal_cadence_months: 0,
        }
    }

    #[test]
    fn visible_customer_contracts_are_eligible() {
        let orgs = vec![org(1, true, false)];
        let filter = EligibilityFilter::new(&orgs);
        assert!(filter.is_eligible(&contract(1, ContractStatus::Live)));
        assert!(filter.is_eligible(&contract(1, ContractStatus::Ended)));
    }

    #[test]
    fn drafts_are_never_eligible() {
        let orgs = vec![org(1, true, false)];
        let filter = EligibilityFilter::new(&orgs);
        assert!(!filter.is_eligible(&contract(1, ContractStatus::Draft)));
    }

    #[test]
    fn prospects_and_hidden_orgs_are_excluded() {
        let orgs = vec![org(1, false, false), org(2, true, true)];
        let filter = EligibilityFilter::new(&orgs);
        assert!(!filter.is_eligible(&contract(1, ContractStatus::Live)));
        assert!(!filter.is_eligible(&contract(2, ContractStatus::Live)));
    }

    #[test]
    fn unknown_owner_is_excluded() {
        let filter = EligibilityFilter::new(&[]);
        assert!(!filter.is_eligible(&contract(9, ContractStatus::Live)));
    }
}
