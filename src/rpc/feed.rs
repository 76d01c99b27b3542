//! Incoming-delegation feed.

use crate::error::{Result, TrackerError};
use crate::snapshot::CurrentState;
use crate::types::{parse_timestamp, CurrentEntity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{info, warn};

/// One delegation as the feed reports it.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct IncomingDelegation {
    pub delegator: String,
    /// Stake equivalent of the delegation; the feed sends a string or a number.
    #[serde(deserialize_with = "number_or_string")]
    pub hp_equivalent: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Decode a feed response body.
///
/// Anything but a non-empty array is refused, so a failed fetch can never
/// overwrite the current state with an empty list.
pub fn parse_incoming(body: serde_json::Value) -> Result<Vec<IncomingDelegation>> {
    match body {
        serde_json::Value::Array(items) if !items.is_empty() => {
            Ok(serde_json::from_value(serde_json::Value::Array(items))?)
        }
        serde_json::Value::Array(_) => Err(TrackerError::EmptyCurrentState),
        other => Err(TrackerError::UnsupportedSchema(format!(
            "delegation feed returned {}",
            match other {
                serde_json::Value::Object(_) => "an object",
                serde_json::Value::Null => "null",
                _ => "a scalar",
            }
        ))),
    }
}

impl IncomingDelegation {
    fn into_entity(self) -> CurrentEntity {
        let since = self.timestamp.as_deref().and_then(|raw| match parse_timestamp(raw) {
            Ok(ts) => Some(ts),
            Err(e) => {
                warn!(delegator = %self.delegator, error = %e, "ignoring delegation timestamp");
                None
            }
        });
        CurrentEntity {
            since,
            ..CurrentEntity::new(self.delegator, self.hp_equivalent)
        }
    }
}

/// Client for the delegation feed.
pub struct DelegationFeed {
    client: reqwest::Client,
    base_url: String,
    limit: u32,
}

impl DelegationFeed {
    pub fn new(base_url: impl Into<String>, limit: u32, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            limit,
        })
    }

    pub fn url_for(&self, account: &str) -> String {
        format!(
            "{}/delegations/{}/incoming?limit={}",
            self.base_url.trim_end_matches('/'),
            account,
            self.limit
        )
    }

    /// Fetch the incoming delegations of `account` as a current state.
    pub async fn fetch(&self, account: &str, now: DateTime<Utc>) -> Result<CurrentState> {
        let url = self.url_for(account);
        info!(%account, %url, "fetching incoming delegations");
        let body: serde_json::Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let delegations = parse_incoming(body)?;
        Ok(to_current_state(account, delegations, now))
    }
}

/// Convert feed rows to a current state, sorted by stake descending.
pub fn to_current_state(account: &str, delegations: Vec<IncomingDelegation>, now: DateTime<Utc>) -> CurrentState {
    let entities = delegations
        .into_iter()
        .map(IncomingDelegation::into_entity)
        .collect();
    CurrentState::new(account, now, entities)
}
