//! Curation vote classification.

use super::Classifier;
use crate::types::{EntityId, MonthLabel, OperationRecord, TimeWindow};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Operation tag of a curation vote.
pub const VOTE_KIND: &str = "vote";

/// Length of the rolling window.
pub const ROLLING_WINDOW_HOURS: i64 = 24;

/// Vote counts derived from one scan.
///
/// Built fresh each run; only the snapshot and rollup it feeds survive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VoteAggregate {
    /// Votes inside the rolling window ending at the classifier's `now`.
    pub rolling_window_count: u64,
    /// Votes per calendar month.
    pub per_label_counts: BTreeMap<MonthLabel, u64>,
    /// Most recent vote per author.
    pub last_occurrence_by_target: BTreeMap<EntityId, DateTime<Utc>>,
}

impl VoteAggregate {
    pub fn count_for(&self, month: MonthLabel) -> u64 {
        self.per_label_counts.get(&month).copied().unwrap_or(0)
    }

    /// Votes across all months.
    pub fn total(&self) -> u64 {
        self.per_label_counts.values().sum()
    }

    pub fn last_vote_on(&self, target: &str) -> Option<DateTime<Utc>> {
        self.last_occurrence_by_target.get(target).copied()
    }
}

/// Buckets votes cast by one actor.
pub struct VoteClassifier {
    actor: String,
    rolling: TimeWindow,
    aggregate: VoteAggregate,
}

impl VoteClassifier {
    /// Classifier for votes cast by `actor`, with the rolling window ending
    /// at `now`.
    pub fn new(actor: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            actor: actor.into(),
            rolling: TimeWindow::rolling(now, Duration::hours(ROLLING_WINDOW_HOURS), "last 24h"),
            aggregate: VoteAggregate::default(),
        }
    }

    pub fn rolling_window(&self) -> &TimeWindow {
        &self.rolling
    }

    pub fn aggregate(&self) -> &VoteAggregate {
        &self.aggregate
    }

    pub fn into_aggregate(self) -> VoteAggregate {
        self.aggregate
    }
}

impl Classifier for VoteClassifier {
    fn observe(&mut self, record: &OperationRecord) {
        if record.kind != VOTE_KIND || record.field_str("voter") != Some(self.actor.as_str()) {
            return;
        }
        let ts = record.timestamp;

        // Lower bound only: votes stamped after `now` still count.
        if ts >= self.rolling.start {
            self.aggregate.rolling_window_count += 1;
        }

        *self
            .aggregate
            .per_label_counts
            .entry(MonthLabel::from_instant(ts))
            .or_insert(0) += 1;

        if let Some(author) = record.field_str("author") {
            // Scan order follows sequence ids, not timestamps; keep the newest.
            self.aggregate
                .last_occurrence_by_target
                .entry(author.to_string())
                .and_modify(|last| {
                    if ts > *last {
                        *last = ts;
                    }
                })
                .or_insert(ts);
        }
    }
}
