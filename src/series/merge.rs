//! Snapshot merge engine.

use crate::error::{Result, TrackerError};
use crate::types::{CurrentEntity, EntityId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Sparse history: entity -> (calendar day -> value).
///
/// Dates are unique per entity and iterate in ascending order; serialized
/// as ISO `YYYY-MM-DD` keys.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSeries(BTreeMap<EntityId, BTreeMap<NaiveDate, f64>>);

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, id: &str) -> Option<&BTreeMap<NaiveDate, f64>> {
        self.0.get(id)
    }

    /// Most recent recorded observation for `id`.
    pub fn latest(&self, id: &str) -> Option<(NaiveDate, f64)> {
        self.0
            .get(id)
            .and_then(|dates| dates.iter().next_back())
            .map(|(date, value)| (*date, *value))
    }

    pub fn value_on(&self, id: &str, date: NaiveDate) -> Option<f64> {
        self.0.get(id).and_then(|dates| dates.get(&date)).copied()
    }

    /// Record one observation, returning the value it replaced.
    pub fn record(&mut self, id: &str, date: NaiveDate, value: f64) -> Option<f64> {
        self.0.entry(id.to_string()).or_default().insert(date, value)
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of one merge.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeOutcome {
    /// The full updated series; callers replace the artifact with it.
    pub series: TimeSeries,
    /// Observations whose stored value changed.
    pub written: usize,
    /// Entities seen for the first time.
    pub entered: Vec<EntityId>,
    /// Entities that dropped out today.
    pub exited: Vec<EntityId>,
}

/// Fold today's observations into the prior series.
///
/// - Every current entity gets `today = value`, overwriting an earlier
///   same-day value (the last run of the day wins).
/// - An entity in the prior series but absent today gets `today = 0` if its
///   most recent value was positive; an entity already at zero is left alone.
///
/// An empty current list is refused: it cannot be told apart from a failed
/// fetch and would record an exit for every tracked entity.
pub fn merge_series(
    current: &[CurrentEntity],
    prior: TimeSeries,
    today: NaiveDate,
) -> Result<MergeOutcome> {
    if current.is_empty() {
        return Err(TrackerError::EmptyCurrentState);
    }

    let mut series = prior;
    let mut written = 0;
    let mut entered = Vec::new();
    let mut present = BTreeSet::new();

    for entity in current {
        if !present.insert(entity.id.as_str()) {
            warn!(entity = %entity.id, "entity listed twice in current state; last value wins");
        }
        if series.entity(&entity.id).is_none() {
            entered.push(entity.id.clone());
        }
        if series.record(&entity.id, today, entity.value) != Some(entity.value) {
            written += 1;
        }
    }

    let departed: Vec<EntityId> = series
        .entity_ids()
        .filter(|id| !present.contains(id.as_str()))
        .filter(|id| matches!(series.latest(id), Some((_, last)) if last > 0.0))
        .cloned()
        .collect();
    for id in &departed {
        series.record(id, today, 0.0);
        written += 1;
    }

    info!(
        %today,
        entities = series.len(),
        written,
        entered = entered.len(),
        exited = departed.len(),
        "series merged"
    );

    Ok(MergeOutcome {
        series,
        written,
        entered,
        exited: departed,
    })
}
