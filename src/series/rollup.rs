//! Monthly rollup records.

use crate::types::MonthLabel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Aggregate totals for one calendar month, keyed by the month's first day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRollup {
    pub date: NaiveDate,
    #[serde(default)]
    pub total_power: f64,
    #[serde(default)]
    pub active_members: u64,
    #[serde(default)]
    pub monthly_votes: u64,
    #[serde(default)]
    pub new_delegators: u64,
}

impl MonthlyRollup {
    /// Zeroed record for `month`.
    pub fn empty(month: MonthLabel) -> Self {
        Self {
            date: month.first_day(),
            total_power: 0.0,
            active_members: 0,
            monthly_votes: 0,
            new_delegators: 0,
        }
    }

    pub fn month(&self) -> MonthLabel {
        MonthLabel::from_date(self.date)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// Ordered list of monthly rollups, at most one per month.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RollupLedger(Vec<MonthlyRollup>);

impl RollupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records as read from disk.
    ///
    /// Dates are normalized to the first of their month and the list is
    /// sorted; when a month appears more than once the later entry wins.
    pub fn from_records(records: Vec<MonthlyRollup>) -> Self {
        let mut ledger = Self::new();
        for record in records {
            if ledger.get(record.month()).is_some() {
                warn!(month = ?record.month(), "duplicate rollup month; keeping the later entry");
            }
            ledger.upsert(record);
        }
        ledger
    }

    pub fn records(&self) -> &[MonthlyRollup] {
        &self.0
    }

    pub fn get(&self, month: MonthLabel) -> Option<&MonthlyRollup> {
        self.0.iter().find(|r| r.month() == month)
    }

    /// Insert or replace the record for its month.
    ///
    /// A replacement happens in place, so the other months keep their order.
    pub fn upsert(&mut self, mut record: MonthlyRollup) -> UpsertOutcome {
        let month = record.month();
        record.date = month.first_day();

        if let Some(existing) = self.0.iter_mut().find(|r| r.month() == month) {
            *existing = record;
            debug!(%month, "rollup replaced");
            return UpsertOutcome::Replaced;
        }

        let at = self.0.partition_point(|r| r.date < record.date);
        self.0.insert(at, record);
        debug!(%month, "rollup inserted");
        UpsertOutcome::Inserted
    }

    /// Update some fields of a month's record, creating a zeroed record
    /// first when the month is absent.
    pub fn amend(&mut self, month: MonthLabel, update: impl FnOnce(&mut MonthlyRollup)) -> UpsertOutcome {
        let mut record = self
            .get(month)
            .cloned()
            .unwrap_or_else(|| MonthlyRollup::empty(month));
        update(&mut record);
        self.upsert(record)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(y: i32, m: u32) -> MonthLabel {
        MonthLabel::from_date(NaiveDate::from_ymd_opt(y, m, 1).unwrap())
    }

    fn record(y: i32, m: u32, votes: u64) -> MonthlyRollup {
        MonthlyRollup {
            monthly_votes: votes,
            ..MonthlyRollup::empty(month(y, m))
        }
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut ledger = RollupLedger::new();
        ledger.upsert(record(2025, 1, 10));
        ledger.upsert(record(2025, 2, 20));
        ledger.upsert(record(2025, 3, 30));

        let outcome = ledger.upsert(record(2025, 2, 99));
        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert_eq!(ledger.len(), 3);
        let votes: Vec<u64> = ledger.records().iter().map(|r| r.monthly_votes).collect();
        assert_eq!(votes, vec![10, 99, 30]);
    }

    #[test]
    fn test_insert_keeps_sorted() {
        let mut ledger = RollupLedger::new();
        ledger.upsert(record(2025, 3, 3));
        ledger.upsert(record(2024, 12, 1));
        assert_eq!(ledger.upsert(record(2025, 1, 2)), UpsertOutcome::Inserted);

        let dates: Vec<String> = ledger.records().iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-12-01", "2025-01-01", "2025-03-01"]);
    }

    #[test]
    fn test_mid_month_date_normalized() {
        let mut ledger = RollupLedger::new();
        ledger.upsert(MonthlyRollup {
            date: NaiveDate::from_ymd_opt(2025, 5, 17).unwrap(),
            ..record(2025, 5, 4)
        });
        assert_eq!(ledger.upsert(record(2025, 5, 5)), UpsertOutcome::Replaced);
        assert_eq!(ledger.records()[0].date, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
    }

    #[test]
    fn test_amend_touches_only_given_fields() {
        let mut ledger = RollupLedger::new();
        ledger.upsert(MonthlyRollup {
            total_power: 1234.5,
            active_members: 40,
            ..record(2025, 1, 1)
        });

        ledger.amend(month(2025, 1), |r| r.monthly_votes = 77);
        ledger.amend(month(2025, 2), |r| r.monthly_votes = 5);

        let jan = ledger.get(month(2025, 1)).unwrap();
        assert_eq!(jan.total_power, 1234.5);
        assert_eq!(jan.active_members, 40);
        assert_eq!(jan.monthly_votes, 77);
        assert_eq!(ledger.get(month(2025, 2)).unwrap().total_power, 0.0);
    }

    #[test]
    fn test_from_records_dedupes_and_sorts() {
        let ledger = RollupLedger::from_records(vec![
            record(2025, 2, 1),
            record(2025, 1, 1),
            record(2025, 2, 2),
        ]);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get(month(2025, 2)).unwrap().monthly_votes, 2);
        assert_eq!(ledger.records()[0].date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn test_legacy_fields_default() {
        let json = r#"[{"date": "2025-01-01", "total_power": 10.5, "monthly_votes": 3, "extra": "x"}]"#;
        let records: Vec<MonthlyRollup> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].active_members, 0);
        assert_eq!(records[0].new_delegators, 0);
    }
}
