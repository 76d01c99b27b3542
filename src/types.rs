//! Core types for ledger scanning and history tracking.

use crate::error::{Result, TrackerError};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a tracked entity (an account name).
pub type EntityId = String;

/// One row of the "right now" state: an entity and its current metric.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentEntity {
    pub id: EntityId,
    /// Delegated stake, the tracked metric.
    pub value: f64,
    /// When the current delegation started, if the feed knows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_stake: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_balance: Option<f64>,
}

impl CurrentEntity {
    pub fn new(id: impl Into<EntityId>, value: f64) -> Self {
        Self {
            id: id.into(),
            value,
            since: None,
            owned_stake: None,
            token_balance: None,
        }
    }
}

/// Chain-assigned position in one account's operation history.
///
/// Monotonic per account, which also approximates time order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceId(pub u64);

impl fmt::Debug for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Indexer convention for "start at the most recent record".
pub const MOST_RECENT: i64 = -1;

/// Transient pagination state for one backward scan. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistoryCursor {
    /// Sequence id the next page ends at, or [`MOST_RECENT`].
    pub next_start: i64,
    /// Number of records to request.
    pub page_size: u32,
}

impl HistoryCursor {
    /// Cursor for the first page of a scan.
    pub fn most_recent(page_size: u32) -> Self {
        Self {
            next_start: MOST_RECENT,
            page_size,
        }
    }

    /// Move the cursor behind the oldest record of the page just read.
    ///
    /// Returns `None` once genesis is reached. The page size shrinks when
    /// fewer records than a full page remain.
    pub fn advance(self, first_in_page: SequenceId) -> Option<Self> {
        let next = first_in_page.0 as i64 - 1;
        if next <= 0 {
            return None;
        }
        let page_size = if next < self.page_size as i64 {
            next as u32
        } else {
            self.page_size
        };
        Some(Self {
            next_start: next,
            page_size,
        })
    }
}

/// One decoded entry of an account's operation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub sequence: SequenceId,
    pub timestamp: DateTime<Utc>,
    /// Operation tag, e.g. `vote` or `delegate_vesting_shares`.
    pub kind: String,
    /// Operation fields as delivered by the indexer.
    pub payload: serde_json::Value,
}

/// Wire shape of one history entry:
/// `[sequence, { "timestamp": "...", "op": [kind, fields] }]`.
pub type WireHistoryEntry = (u64, WireEnvelope);

/// The object half of a wire history entry.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WireEnvelope {
    pub timestamp: String,
    pub op: (String, serde_json::Value),
}

impl OperationRecord {
    /// Decode a wire entry.
    pub fn from_wire(entry: WireHistoryEntry) -> Result<Self> {
        let (sequence, envelope) = entry;
        let (kind, payload) = envelope.op;
        Ok(Self {
            sequence: SequenceId(sequence),
            timestamp: parse_timestamp(&envelope.timestamp)?,
            kind,
            payload,
        })
    }

    /// String field of the payload, if present.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(|v| v.as_str())
    }
}

/// Parse an indexer timestamp.
///
/// The indexer sends zone-less `YYYY-MM-DDTHH:MM:SS` values that are UTC;
/// full RFC 3339 strings are accepted too.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let trimmed = raw.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| TrackerError::InvalidTimestamp(raw.to_string()))
}

/// A calendar month, identified by its first day.
///
/// Displays as the month name and year ("January 2025"). Computed on the
/// UTC calendar so there is no DST ambiguity at month boundaries.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthLabel(NaiveDate);

impl MonthLabel {
    /// Month containing the given calendar day.
    pub fn from_date(date: NaiveDate) -> Self {
        MonthLabel(date.with_day(1).unwrap_or(date))
    }

    /// Month containing the given instant.
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self::from_date(instant.date_naive())
    }

    /// First calendar day of the month, the rollup key.
    pub fn first_day(self) -> NaiveDate {
        self.0
    }

    /// Last calendar day of the month.
    pub fn last_day(self) -> NaiveDate {
        self.next()
            .and_then(|next| next.0.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn next(self) -> Option<Self> {
        self.0.checked_add_months(Months::new(1)).map(MonthLabel)
    }

    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub_months(Months::new(1)).map(MonthLabel)
    }

    /// The month as a closed-open window.
    pub fn window(self) -> TimeWindow {
        let start = self.0.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = self
            .next()
            .map(|next| next.0.and_time(chrono::NaiveTime::MIN).and_utc())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        TimeWindow {
            start,
            end,
            label: self.to_string(),
        }
    }
}

impl fmt::Debug for MonthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Month({})", self.0.format("%Y-%m"))
    }
}

impl fmt::Display for MonthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%B %Y"))
    }
}

/// A closed-open interval `[start, end)` with a display label.
///
/// Windows may overlap; the rolling window and the calendar months are
/// independent views over the same events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
}

impl TimeWindow {
    /// Window of the given length ending at `now` (inclusive of `now`).
    pub fn rolling(now: DateTime<Utc>, length: Duration, label: impl Into<String>) -> Self {
        Self {
            start: now - length,
            end: now + Duration::nanoseconds(1),
            label: label.into(),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}
