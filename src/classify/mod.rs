//! Event classification over scanned ledger records.
//!
//! Classifiers are pure: they fold records into in-memory aggregates and
//! never perform I/O.

mod delegations;
mod votes;

pub use delegations::{DelegationTally, MonthDelegations};
pub use votes::{VoteAggregate, VoteClassifier};

use crate::types::{OperationRecord, SequenceId};
use std::collections::HashSet;

/// Something that consumes scanned records.
pub trait Classifier {
    fn observe(&mut self, record: &OperationRecord);
}

/// Runs the vote classifier and the delegation tally over one scan.
///
/// A sequence id seen twice within the run is only counted once.
pub struct LedgerClassifier {
    pub votes: VoteClassifier,
    pub delegations: DelegationTally,
    seen: HashSet<SequenceId>,
}

impl LedgerClassifier {
    pub fn new(votes: VoteClassifier, delegations: DelegationTally) -> Self {
        Self {
            votes,
            delegations,
            seen: HashSet::new(),
        }
    }

    /// Number of distinct records observed.
    pub fn observed(&self) -> usize {
        self.seen.len()
    }
}

impl Classifier for LedgerClassifier {
    fn observe(&mut self, record: &OperationRecord) {
        if !self.seen.insert(record.sequence) {
            return;
        }
        self.votes.observe(record);
        self.delegations.observe(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_repeated_sequence_counted_once() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let mut classifier = LedgerClassifier::new(
            VoteClassifier::new("curator", now),
            DelegationTally::new("curator"),
        );
        let record = OperationRecord {
            sequence: SequenceId(9),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 9, 12, 0, 0).unwrap(),
            kind: "vote".into(),
            payload: json!({"voter": "curator", "author": "alice"}),
        };

        classifier.observe(&record);
        classifier.observe(&record);

        assert_eq!(classifier.observed(), 1);
        assert_eq!(classifier.votes.aggregate().rolling_window_count, 1);
        assert_eq!(classifier.votes.aggregate().total(), 1);
    }
}
