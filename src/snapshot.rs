//! Current-state input and point-in-time snapshot output.
//!
//! The current-state artifact has exactly one schema, tagged with a
//! version. Bare arrays and `{ranking: [...]}` objects written by older
//! tooling are rejected instead of sniffed.

use crate::classify::{DelegationTally, VoteAggregate};
use crate::error::{Result, TrackerError};
use crate::types::{CurrentEntity, EntityId, MonthLabel};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Schema version of the current-state artifact.
pub const CURRENT_STATE_VERSION: u32 = 1;

/// "Right now" state of every delegator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentState {
    pub version: u32,
    pub account: String,
    pub generated_at: DateTime<Utc>,
    pub entities: Vec<CurrentEntity>,
}

impl CurrentState {
    /// Build a current state, sorted by value descending.
    pub fn new(account: impl Into<String>, generated_at: DateTime<Utc>, mut entities: Vec<CurrentEntity>) -> Self {
        entities.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.id.cmp(&b.id)));
        Self {
            version: CURRENT_STATE_VERSION,
            account: account.into(),
            generated_at,
            entities,
        }
    }

    pub fn total_value(&self) -> f64 {
        self.entities.iter().map(|e| e.value).sum()
    }
}

/// Load the mandatory current-state artifact.
///
/// Unlike historical artifacts this is never defaulted: a missing,
/// unreadable, legacy-shaped or empty file is a hard error.
pub fn load_current_state(path: impl AsRef<Path>) -> Result<CurrentState> {
    let path = path.as_ref();
    let missing = |reason: String| TrackerError::MissingInput {
        path: path.to_path_buf(),
        reason,
    };

    let raw = fs::read_to_string(path).map_err(|e| missing(e.to_string()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| missing(format!("invalid JSON: {}", e)))?;

    if value.is_array() {
        return Err(TrackerError::UnsupportedSchema(
            "bare array current state; expected a versioned object".into(),
        ));
    }
    match value.get("version").and_then(|v| v.as_u64()) {
        Some(v) if v == u64::from(CURRENT_STATE_VERSION) => {}
        Some(v) => {
            return Err(TrackerError::UnsupportedSchema(format!(
                "current state version {} (supported: {})",
                v, CURRENT_STATE_VERSION
            )))
        }
        None => {
            return Err(TrackerError::UnsupportedSchema(
                "current state has no version field".into(),
            ))
        }
    }

    let state: CurrentState =
        serde_json::from_value(value).map_err(|e| missing(format!("malformed entities: {}", e)))?;

    if let Some(bad) = state
        .entities
        .iter()
        .find(|e| !e.value.is_finite() || e.value < 0.0)
    {
        return Err(missing(format!("entity {} has invalid value {}", bad.id, bad.value)));
    }
    if state.entities.is_empty() {
        return Err(TrackerError::EmptyCurrentState);
    }
    Ok(state)
}

/// One tracked delegator in the snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub rank: usize,
    pub delegated_stake: f64,
    /// Fraction of the total delegated stake.
    pub share: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_stake: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_since: Option<DateTime<Utc>>,
    /// Most recent curation vote by the tracked account on this entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_vote: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub flags: BTreeSet<String>,
}

/// Activity in one calendar month.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthActivity {
    pub month: NaiveDate,
    pub label: String,
    pub votes: u64,
    pub new_delegations: u64,
}

/// Point-in-time snapshot, fully rebuilt every run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub generated_at: DateTime<Utc>,
    pub account: String,
    pub total_power: f64,
    pub rolling_votes_24h: u64,
    pub months: Vec<MonthActivity>,
    pub entities: Vec<EntitySnapshot>,
}

/// Run metadata written next to the current state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub last_updated: DateTime<Utc>,
    pub total_delegators: usize,
    pub total_power: f64,
}

impl RunMeta {
    pub fn from_state(state: &CurrentState) -> Self {
        Self {
            last_updated: state.generated_at,
            total_delegators: state.entities.len(),
            total_power: state.total_value(),
        }
    }
}

/// Combine the current state with this run's classifier output.
///
/// `tags` maps a flag name to the accounts that carry it.
pub fn build_snapshot(
    current: &CurrentState,
    votes: &VoteAggregate,
    delegations: &DelegationTally,
    tags: &BTreeMap<String, Vec<String>>,
    now: DateTime<Utc>,
) -> SnapshotDocument {
    let total_power = current.total_value();

    let entities = current
        .entities
        .iter()
        .enumerate()
        .map(|(i, entity)| EntitySnapshot {
            id: entity.id.clone(),
            rank: i + 1,
            delegated_stake: entity.value,
            share: if total_power > 0.0 { entity.value / total_power } else { 0.0 },
            owned_stake: entity.owned_stake,
            token_balance: entity.token_balance,
            delegated_since: entity.since,
            last_vote: votes.last_vote_on(&entity.id),
            flags: tags
                .iter()
                .filter(|(_, accounts)| accounts.iter().any(|a| a == &entity.id))
                .map(|(tag, _)| tag.clone())
                .collect(),
        })
        .collect();

    let mut months: BTreeSet<MonthLabel> = votes.per_label_counts.keys().copied().collect();
    months.extend(delegations.months().map(|(m, _)| *m));
    let months = months
        .into_iter()
        .map(|month| MonthActivity {
            month: month.first_day(),
            label: month.to_string(),
            votes: votes.count_for(month),
            new_delegations: delegations.count_for(month),
        })
        .collect();

    SnapshotDocument {
        generated_at: now,
        account: current.account.clone(),
        total_power,
        rolling_votes_24h: votes.rolling_window_count,
        months,
        entities,
    }
}
