//! Incoming delegation tally.

use super::Classifier;
use crate::types::{MonthLabel, OperationRecord};
use std::collections::{BTreeMap, BTreeSet};

/// Operation tag of a stake delegation.
pub const DELEGATION_KIND: &str = "delegate_vesting_shares";

/// Delegations received in one month.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonthDelegations {
    /// Positive delegation operations, including repeat delegators.
    pub count: u64,
    pub delegators: BTreeSet<String>,
}

/// Counts positive delegations to one account per calendar month.
///
/// Undelegations (zero amount) are ignored.
#[derive(Clone, Debug)]
pub struct DelegationTally {
    delegatee: String,
    per_month: BTreeMap<MonthLabel, MonthDelegations>,
}

impl DelegationTally {
    pub fn new(delegatee: impl Into<String>) -> Self {
        Self {
            delegatee: delegatee.into(),
            per_month: BTreeMap::new(),
        }
    }

    pub fn month(&self, month: MonthLabel) -> Option<&MonthDelegations> {
        self.per_month.get(&month)
    }

    pub fn count_for(&self, month: MonthLabel) -> u64 {
        self.per_month.get(&month).map(|m| m.count).unwrap_or(0)
    }

    pub fn months(&self) -> impl Iterator<Item = (&MonthLabel, &MonthDelegations)> {
        self.per_month.iter()
    }
}

impl Classifier for DelegationTally {
    fn observe(&mut self, record: &OperationRecord) {
        if record.kind != DELEGATION_KIND
            || record.field_str("delegatee") != Some(self.delegatee.as_str())
        {
            return;
        }
        let amount = record
            .field_str("vesting_shares")
            .and_then(parse_asset_amount)
            .unwrap_or(0.0);
        if amount <= 0.0 {
            return;
        }

        let entry = self
            .per_month
            .entry(MonthLabel::from_instant(record.timestamp))
            .or_default();
        entry.count += 1;
        if let Some(delegator) = record.field_str("delegator") {
            entry.delegators.insert(delegator.to_string());
        }
    }
}

/// Numeric part of an asset string such as `"2048.000000 VESTS"`.
pub fn parse_asset_amount(raw: &str) -> Option<f64> {
    raw.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SequenceId;
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    fn delegation(seq: u64, day: u32, delegator: &str, delegatee: &str, shares: &str) -> OperationRecord {
        OperationRecord {
            sequence: SequenceId(seq),
            timestamp: Utc.with_ymd_and_hms(2025, 3, day, 8, 0, 0).unwrap(),
            kind: DELEGATION_KIND.into(),
            payload: json!({
                "delegator": delegator,
                "delegatee": delegatee,
                "vesting_shares": shares,
            }),
        }
    }

    #[test]
    fn test_parse_asset_amount() {
        assert_eq!(parse_asset_amount("2048.500000 VESTS"), Some(2048.5));
        assert_eq!(parse_asset_amount("0.000000 VESTS"), Some(0.0));
        assert_eq!(parse_asset_amount(""), None);
        assert_eq!(parse_asset_amount("abc VESTS"), None);
    }

    #[test]
    fn test_counts_positive_incoming_only() {
        let mut tally = DelegationTally::new("curator");
        tally.observe(&delegation(1, 2, "alice", "curator", "100.000000 VESTS"));
        tally.observe(&delegation(2, 3, "alice", "curator", "250.000000 VESTS"));
        tally.observe(&delegation(3, 4, "bob", "curator", "0.000000 VESTS"));
        tally.observe(&delegation(4, 5, "carol", "elsewhere", "10.000000 VESTS"));

        let march = MonthLabel::from_date(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        let month = tally.month(march).unwrap();
        assert_eq!(month.count, 2);
        assert_eq!(month.delegators.len(), 1);
        assert!(month.delegators.contains("alice"));
        assert_eq!(tally.count_for(march.next().unwrap()), 0);
    }
}
