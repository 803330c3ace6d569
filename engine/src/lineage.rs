//! Lineage reconstruction.
//!
//! Service line item versions only link backwards (`lineage_parent_id`). A
//! forward index is built once per computation, each chain is ordered from
//! its root, validated, and frozen into a [`Lineage`]. Chains that fail
//! validation are excluded and reported as [`LineageFault`]s.

use std::collections::{BTreeMap, HashMap, HashSet};

use arr_shared::{BillingCycle, ServiceLineItem};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::annualize::annualize;

/// Largest annualized value a single version may carry. Keeps every sum the
/// engine forms far below `Decimal::MAX`.
const MAX_VERSION_ARR: i64 = 1_000_000_000_000_000_000;

/// One priced version of a line item with its annualized value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub canceled: bool,
    pub arr: Decimal,
}

impl Version {
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.started_at <= at && self.ended_at.map_or(true, |end| at < end)
    }
}

/// The ordered amendment history of one recurring line item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lineage {
    pub root_id: Uuid,
    pub contract_id: Uuid,
    versions: Vec<Version>,
}

impl Lineage {
    pub fn first_started_at(&self) -> DateTime<Utc> {
        self.versions[0].started_at
    }

    fn terminal(&self) -> &Version {
        &self.versions[self.versions.len() - 1]
    }

    /// The version whose `[started_at, ended_at)` contains `at`.
    pub fn active_at(&self, at: DateTime<Utc>) -> Option<&Version> {
        let idx = self.versions.partition_point(|v| v.started_at <= at);
        if idx == 0 {
            return None;
        }
        let candidate = &self.versions[idx - 1];
        candidate.is_active_at(at).then_some(candidate)
    }

    /// Annualized value at `at`, zero when nothing is active.
    pub fn value_at(&self, at: DateTime<Utc>) -> Decimal {
        self.active_at(at).map_or(Decimal::ZERO, |v| v.arr)
    }

    /// Instant the lineage's cancellation takes effect, if its final version is canceled.
    fn cancellation(&self) -> Option<DateTime<Utc>> {
        let terminal = self.terminal();
        if terminal.canceled {
            terminal.ended_at
        } else {
            None
        }
    }

    /// Whether the cancellation has taken effect at `at`. A version flagged
    /// canceled still counts until its `ended_at`.
    pub fn canceled_by(&self, at: DateTime<Utc>) -> bool {
        self.cancellation().map_or(false, |canceled_at| canceled_at <= at)
    }

    /// Instant the lineage stops carrying revenue. A final version that ends
    /// without the canceled flag is a lapse and exits the same way.
    pub fn exit_at(&self) -> Option<DateTime<Utc>> {
        self.terminal().ended_at
    }

    /// The final version and the version it amended, if any.
    pub fn final_pair(&self) -> (&Version, Option<&Version>) {
        let last = self.versions.len() - 1;
        let predecessor = last.checked_sub(1).map(|i| &self.versions[i]);
        (&self.versions[last], predecessor)
    }

    /// Versions after the initial one, i.e. amendments.
    pub fn amendments(&self) -> &[Version] {
        &self.versions[1..]
    }
}

/// Kinds of malformed lineage data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    DanglingParent,
    Cycle,
    Branching,
    Overlap,
    CanceledWithSuccessor,
    CrossContract,
    MixedBilling,
    InvalidInterval,
    InvalidAmount,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::DanglingParent => "dangling_parent",
            FaultKind::Cycle => "cycle",
            FaultKind::Branching => "branching",
            FaultKind::Overlap => "overlap",
            FaultKind::CanceledWithSuccessor => "canceled_with_successor",
            FaultKind::CrossContract => "cross_contract",
            FaultKind::MixedBilling => "mixed_billing",
            FaultKind::InvalidInterval => "invalid_interval",
            FaultKind::InvalidAmount => "invalid_amount",
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lineage excluded from every total because its records are inconsistent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("malformed lineage ({kind}) at service line item {service_line_item_id} of contract {contract_id}")]
pub struct LineageFault {
    pub kind: FaultKind,
    pub contract_id: Uuid,
    pub service_line_item_id: Uuid,
}

/// Output of [`resolve_lineages`]
#[derive(Debug, Clone, Default)]
pub struct LineageSet {
    pub lineages: Vec<Lineage>,
    pub faults: Vec<LineageFault>,
}

#[derive(Debug, Clone, Copy)]
struct RootLink {
    key: Uuid,
    fault: Option<FaultKind>,
}

/// Rebuild every lineage from raw version records.
///
/// One-time lineages are dropped without a fault. Output order is stable
/// (by root id) so repeated runs over the same snapshot agree.
pub fn resolve_lineages(items: &[ServiceLineItem]) -> LineageSet {
    let by_id: HashMap<Uuid, &ServiceLineItem> = items.iter().map(|sli| (sli.id, sli)).collect();

    let mut children: HashMap<Uuid, Vec<&ServiceLineItem>> = HashMap::new();
    for sli in by_id.values() {
        if let Some(parent) = sli.parent_id() {
            children.entry(parent).or_default().push(*sli);
        }
    }
    for kids in children.values_mut() {
        kids.sort_by_key(|sli| (sli.started_at, sli.id));
    }

    let mut memo: HashMap<Uuid, RootLink> = HashMap::new();
    let mut groups: BTreeMap<Uuid, (Option<FaultKind>, Vec<&ServiceLineItem>)> = BTreeMap::new();
    for sli in by_id.values() {
        let link = find_root(sli, &by_id, &mut memo);
        let entry = groups.entry(link.key).or_insert((link.fault, Vec::new()));
        entry.1.push(*sli);
    }

    let mut set = LineageSet::default();
    for (key, (fault, members)) in groups {
        if let Some(kind) = fault {
            let contract_id = by_id
                .get(&key)
                .map_or_else(|| members[0].contract_id, |s| s.contract_id);
            set.faults.push(LineageFault {
                kind,
                contract_id,
                service_line_item_id: key,
            });
            continue;
        }
        let Some(&root) = by_id.get(&key) else {
            continue;
        };
        match build_chain(root, &children) {
            Ok(Some(lineage)) => set.lineages.push(lineage),
            Ok(None) => {}
            Err(fault) => set.faults.push(fault),
        }
    }

    for fault in &set.faults {
        tracing::warn!(
            kind = %fault.kind,
            contract_id = %fault.contract_id,
            service_line_item_id = %fault.service_line_item_id,
            "excluding malformed lineage"
        );
    }

    set
}

/// Walk parent links up to the root, memoizing every node on the path.
fn find_root<'a>(
    start: &'a ServiceLineItem,
    by_id: &HashMap<Uuid, &'a ServiceLineItem>,
    memo: &mut HashMap<Uuid, RootLink>,
) -> RootLink {
    let mut path: Vec<Uuid> = Vec::new();
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut current = start;

    let link = loop {
        if let Some(link) = memo.get(&current.id) {
            break *link;
        }
        if !seen.insert(current.id) {
            // Cycle: key it on its smallest member so every node in it groups together.
            let pos = path.iter().position(|id| *id == current.id).unwrap_or(0);
            let key = path[pos..].iter().min().copied().unwrap_or(current.id);
            break RootLink {
                key,
                fault: Some(FaultKind::Cycle),
            };
        }
        path.push(current.id);

        match current.parent_id() {
            None => {
                break RootLink {
                    key: current.id,
                    fault: None,
                }
            }
            Some(parent_id) => match by_id.get(&parent_id) {
                Some(&parent) => current = parent,
                None => {
                    break RootLink {
                        key: current.id,
                        fault: Some(FaultKind::DanglingParent),
                    }
                }
            },
        }
    };

    for id in path {
        memo.insert(id, link);
    }
    link
}

fn build_chain<'a>(
    root: &'a ServiceLineItem,
    children: &HashMap<Uuid, Vec<&'a ServiceLineItem>>,
) -> Result<Option<Lineage>, LineageFault> {
    let fault = |kind, sli: &ServiceLineItem| LineageFault {
        kind,
        contract_id: root.contract_id,
        service_line_item_id: sli.id,
    };

    let mut chain: Vec<&'a ServiceLineItem> = vec![root];
    let mut current = root;
    while let Some(kids) = children.get(&current.id) {
        if kids.len() > 1 {
            return Err(fault(FaultKind::Branching, kids[1]));
        }
        current = kids[0];
        chain.push(current);
    }

    let recurring = chain.iter().filter(|sli| sli.billing.is_recurring()).count();
    if recurring == 0 {
        return Ok(None);
    }
    if recurring != chain.len() {
        let offender = chain
            .iter()
            .find(|sli| sli.billing == BillingCycle::OneTime)
            .copied()
            .unwrap_or(root);
        return Err(fault(FaultKind::MixedBilling, offender));
    }

    for &sli in &chain {
        if sli.contract_id != root.contract_id {
            return Err(fault(FaultKind::CrossContract, sli));
        }
        if sli.ended_at.map_or(false, |end| end < sli.started_at) {
            return Err(fault(FaultKind::InvalidInterval, sli));
        }
    }

    for pair in chain.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev.canceled {
            return Err(fault(FaultKind::CanceledWithSuccessor, prev));
        }
        match prev.ended_at {
            Some(end) if end <= next.started_at => {}
            _ => return Err(fault(FaultKind::Overlap, next)),
        }
    }

    let max_arr = Decimal::from(MAX_VERSION_ARR);
    let mut versions = Vec::with_capacity(chain.len());
    for &sli in &chain {
        let Some(recurrence) = sli.billing.recurrence() else {
            continue;
        };
        if sli.price.is_sign_negative() || sli.quantity < 0 {
            return Err(fault(FaultKind::InvalidAmount, sli));
        }
        let arr = match annualize(sli.price, sli.quantity, recurrence) {
            Some(arr) if arr <= max_arr => arr,
            _ => return Err(fault(FaultKind::InvalidAmount, sli)),
        };
        versions.push(Version {
            id: sli.id,
            started_at: sli.started_at,
            ended_at: sli.ended_at,
            canceled: sli.canceled,
            arr,
        });
    }

    Ok(Some(Lineage {
        root_id: root.id,
        contract_id: root.contract_id,
        versions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn sli(
        id: u128,
        parent: Option<u128>,
        price: Decimal,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
    ) -> ServiceLineItem {
        ServiceLineItem {
            id: Uuid::from_u128(id),
            contract_id: Uuid::from_u128(1000),
            lineage_parent_id: parent.map(Uuid::from_u128),
            billing: BillingCycle::Annually,
            price,
            quantity: 2,
            started_at,
            ended_at,
            canceled: false,
        }
    }

    #[test]
    fn chain_is_ordered_from_root() {
        let items = vec![
            sli(3, Some(2), dec!(30), at(2023, 9, 1), None),
            sli(1, None, dec!(10), at(2023, 7, 1), Some(at(2023, 8, 1))),
            sli(2, Some(1), dec!(20), at(2023, 8, 1), Some(at(2023, 9, 1))),
        ];
        let set = resolve_lineages(&items);
        assert!(set.faults.is_empty());
        assert_eq!(set.lineages.len(), 1);
        let ids: Vec<u128> = set.lineages[0].versions.iter().map(|v| v.id.as_u128()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn active_version_uses_half_open_intervals() {
        let items = vec![
            sli(1, None, dec!(12), at(2023, 7, 1), Some(at(2023, 7, 15))),
            sli(2, Some(1), dec!(24), at(2023, 7, 15), None),
        ];
        let lineage = &resolve_lineages(&items).lineages[0];
        assert_eq!(lineage.value_at(at(2023, 6, 30)), Decimal::ZERO);
        assert_eq!(lineage.value_at(at(2023, 7, 1)), dec!(24));
        assert_eq!(lineage.value_at(at(2023, 7, 15) - Duration::nanoseconds(1)), dec!(24));
        assert_eq!(lineage.value_at(at(2023, 7, 15)), dec!(48));
        assert_eq!(lineage.value_at(at(2030, 1, 1)), dec!(48));
    }

    #[test]
    fn canceled_lineage_is_worth_nothing_from_its_end() {
        let mut canceled = sli(1, None, dec!(12), at(2023, 6, 1), Some(at(2023, 8, 1)));
        canceled.canceled = true;
        let lineage = &resolve_lineages(&[canceled]).lineages[0];
        assert_eq!(lineage.value_at(at(2023, 7, 31)), dec!(24));
        assert_eq!(lineage.value_at(at(2023, 8, 1)), Decimal::ZERO);
        assert_eq!(lineage.cancellation(), Some(at(2023, 8, 1)));
        assert!(lineage.canceled_by(at(2023, 8, 1)));
        assert_eq!(lineage.exit_at(), Some(at(2023, 8, 1)));
    }

    #[test]
    fn final_pair_exposes_the_amended_version() {
        let items = vec![
            sli(1, None, dec!(12), at(2023, 6, 1), Some(at(2023, 7, 15))),
            sli(2, Some(1), dec!(6), at(2023, 7, 15), Some(at(2023, 8, 1))),
        ];
        let lineage = &resolve_lineages(&items).lineages[0];
        let (last, previous) = lineage.final_pair();
        assert_eq!(last.arr, dec!(12));
        assert_eq!(previous.map(|v| v.arr), Some(dec!(24)));
        // Not canceled, but the lineage still lapses.
        assert_eq!(lineage.cancellation(), None);
        assert_eq!(lineage.exit_at(), Some(at(2023, 8, 1)));
    }

    #[test]
    fn zero_length_versions_are_never_active() {
        let items = vec![
            sli(1, None, dec!(12), at(2023, 6, 1), Some(at(2023, 6, 1))),
            sli(2, Some(1), dec!(6), at(2023, 6, 1), None),
        ];
        let lineage = &resolve_lineages(&items).lineages[0];
        assert_eq!(lineage.active_at(at(2023, 6, 1)).map(|v| v.id), Some(Uuid::from_u128(2)));
    }

    #[test]
    fn self_parented_root_starts_a_lineage() {
        let items = vec![sli(1, Some(1), dec!(12), at(2023, 6, 1), None)];
        let set = resolve_lineages(&items);
        assert_eq!(set.lineages.len(), 1);
        assert!(set.faults.is_empty());
    }

    #[test]
    fn one_time_lineages_are_dropped_silently() {
        let mut one_time = sli(1, None, dec!(500), at(2023, 6, 1), None);
        one_time.billing = BillingCycle::OneTime;
        let set = resolve_lineages(&[one_time]);
        assert!(set.lineages.is_empty());
        assert!(set.faults.is_empty());
    }

    #[test]
    fn dangling_parent_fails_closed() {
        let items = vec![
            sli(2, Some(99), dec!(12), at(2023, 6, 1), Some(at(2023, 7, 1))),
            sli(3, Some(2), dec!(12), at(2023, 7, 1), None),
        ];
        let set = resolve_lineages(&items);
        assert!(set.lineages.is_empty());
        assert_eq!(set.faults.len(), 1, "whole chain reported once");
        assert_eq!(set.faults[0].kind, FaultKind::DanglingParent);
        assert_eq!(set.faults[0].service_line_item_id, Uuid::from_u128(2));
    }

    #[test]
    fn cycle_fails_closed() {
        let items = vec![
            sli(1, Some(2), dec!(12), at(2023, 6, 1), Some(at(2023, 7, 1))),
            sli(2, Some(1), dec!(12), at(2023, 7, 1), None),
        ];
        let set = resolve_lineages(&items);
        assert!(set.lineages.is_empty());
        assert_eq!(set.faults.len(), 1);
        assert_eq!(set.faults[0].kind, FaultKind::Cycle);
    }

    #[test]
    fn overlapping_versions_fail_closed() {
        let items = vec![
            sli(1, None, dec!(12), at(2023, 6, 1), Some(at(2023, 8, 1))),
            sli(2, Some(1), dec!(24), at(2023, 7, 1), None),
        ];
        let set = resolve_lineages(&items);
        assert!(set.lineages.is_empty());
        assert_eq!(set.faults[0].kind, FaultKind::Overlap);
    }

    #[test]
    fn open_ended_predecessor_is_an_overlap() {
        let items = vec![
            sli(1, None, dec!(12), at(2023, 6, 1), None),
            sli(2, Some(1), dec!(24), at(2023, 7, 1), None),
        ];
        assert_eq!(resolve_lineages(&items).faults[0].kind, FaultKind::Overlap);
    }

    #[test]
    fn branching_fails_closed() {
        let items = vec![
            sli(1, None, dec!(12), at(2023, 6, 1), Some(at(2023, 7, 1))),
            sli(2, Some(1), dec!(24), at(2023, 7, 1), None),
            sli(3, Some(1), dec!(36), at(2023, 7, 2), None),
        ];
        let set = resolve_lineages(&items);
        assert!(set.lineages.is_empty());
        assert_eq!(set.faults[0].kind, FaultKind::Branching);
    }

    #[test]
    fn negative_amounts_fail_closed() {
        let mut refund = sli(1, None, dec!(12), at(2023, 6, 1), None);
        refund.quantity = -3;
        let set = resolve_lineages(&[refund, sli(2, None, dec!(-1), at(2023, 6, 1), None)]);
        assert!(set.lineages.is_empty());
        assert_eq!(set.faults.len(), 2);
        assert!(set.faults.iter().all(|f| f.kind == FaultKind::InvalidAmount));
    }

    #[test]
    fn unrepresentable_amounts_fail_closed() {
        let mut huge = sli(1, None, Decimal::MAX, at(2023, 6, 1), None);
        huge.quantity = i64::MAX;
        let too_large = sli(2, None, Decimal::from(MAX_VERSION_ARR), at(2023, 6, 1), None);
        let set = resolve_lineages(&[huge, too_large]);
        assert!(set.lineages.is_empty());
        assert_eq!(set.faults.len(), 2);
        assert_eq!(set.faults[0].kind, FaultKind::InvalidAmount);
        assert_eq!(set.faults[0].service_line_item_id, Uuid::from_u128(1));
    }

    #[test]
    fn gaps_between_versions_are_tolerated() {
        let items = vec![
            sli(1, None, dec!(12), at(2023, 6, 1), Some(at(2023, 7, 1))),
            sli(2, Some(1), dec!(24), at(2023, 8, 1), None),
        ];
        let set = resolve_lineages(&items);
        assert!(set.faults.is_empty());
        assert_eq!(set.lineages[0].value_at(at(2023, 7, 15)), Decimal::ZERO);
        assert_eq!(set.lineages[0].value_at(at(2023, 8, 15)), dec!(48));
    }

    #[test]
    fn independent_lineages_do_not_affect_each_other() {
        let items = vec![
            sli(1, None, dec!(12), at(2023, 6, 1), None),
            sli(5, Some(77), dec!(12), at(2023, 6, 1), None),
        ];
        let set = resolve_lineages(&items);
        assert_eq!(set.lineages.len(), 1);
        assert_eq!(set.faults.len(), 1);
    }
}
