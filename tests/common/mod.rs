//! In-memory ledger shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use delegation_chronicle::config::TrackerConfig;
use delegation_chronicle::{FailoverClient, Result, RpcRequest, RpcResponse, RpcTransport};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub const PRIMARY: &str = "http://primary.test";
pub const SECONDARY: &str = "http://secondary.test";

/// One request as the ledger saw it.
#[derive(Clone, Debug, PartialEq)]
pub struct PageRequest {
    pub endpoint: String,
    pub start: i64,
    pub limit: u32,
}

/// Answers `get_account_history` from a fixed list of records.
///
/// A request `(start, limit)` returns ids in `(start - limit, start]`, or the
/// newest `limit` ids when `start` is -1, oldest first.
pub struct MemoryLedger {
    records: Vec<(u64, Value)>,
    down: HashSet<String>,
    requests: Mutex<Vec<PageRequest>>,
}

impl MemoryLedger {
    pub fn new(mut records: Vec<(u64, Value)>) -> Self {
        records.sort_by_key(|(seq, _)| *seq);
        Self {
            records,
            down: HashSet::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Mark `endpoint` as answering every call with an RPC error.
    pub fn with_down(mut self, endpoint: &str) -> Self {
        self.down.insert(endpoint.to_string());
        self
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().clone()
    }

    /// Requests that reached a healthy endpoint.
    pub fn answered(&self) -> Vec<PageRequest> {
        self.requests()
            .into_iter()
            .filter(|r| !self.down.contains(&r.endpoint))
            .collect()
    }

    fn page(&self, start: i64, limit: u32) -> Vec<Value> {
        let selected: Vec<&(u64, Value)> = if start < 0 {
            let skip = self.records.len().saturating_sub(limit as usize);
            self.records.iter().skip(skip).collect()
        } else {
            let low = start - i64::from(limit);
            self.records
                .iter()
                .filter(|(seq, _)| (*seq as i64) > low && (*seq as i64) <= start)
                .collect()
        };
        selected
            .into_iter()
            .map(|(seq, envelope)| json!([seq, envelope]))
            .collect()
    }
}

#[async_trait]
impl RpcTransport for MemoryLedger {
    async fn post(&self, endpoint: &str, request: &RpcRequest) -> Result<RpcResponse> {
        let start = request.params[1].as_i64().unwrap_or(-1);
        let limit = request.params[2].as_u64().unwrap_or(0) as u32;
        self.requests.lock().push(PageRequest {
            endpoint: endpoint.to_string(),
            start,
            limit,
        });

        if self.down.contains(endpoint) {
            return Ok(RpcResponse::err(json!({"code": -32603, "message": "node unavailable"})));
        }
        Ok(RpcResponse::ok(Value::Array(self.page(start, limit))))
    }
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn wire_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// A curation vote by `voter` on a post by `author`.
pub fn vote(seq: u64, ts: DateTime<Utc>, voter: &str, author: &str) -> (u64, Value) {
    (
        seq,
        json!({
            "timestamp": wire_time(ts),
            "op": ["vote", {"voter": voter, "author": author, "permlink": format!("post-{}", seq), "weight": 10000}]
        }),
    )
}

/// A stake delegation from `delegator` to `delegatee`.
pub fn delegation(seq: u64, ts: DateTime<Utc>, delegator: &str, delegatee: &str, vests: f64) -> (u64, Value) {
    (
        seq,
        json!({
            "timestamp": wire_time(ts),
            "op": ["delegate_vesting_shares", {
                "delegator": delegator,
                "delegatee": delegatee,
                "vesting_shares": format!("{:.6} VESTS", vests)
            }]
        }),
    )
}

/// An operation neither classifier cares about.
pub fn transfer(seq: u64, ts: DateTime<Utc>) -> (u64, Value) {
    (
        seq,
        json!({
            "timestamp": wire_time(ts),
            "op": ["transfer", {"from": "someone", "to": "curator", "amount": "1.000 HIVE"}]
        }),
    )
}

pub fn client(ledger: MemoryLedger) -> FailoverClient<MemoryLedger> {
    FailoverClient::new(
        vec![PRIMARY.to_string(), SECONDARY.to_string()],
        ledger,
        Duration::from_secs(5),
    )
    .unwrap()
}

/// Config for account `curator` with artifacts under `dir`.
pub fn config(dir: &Path) -> TrackerConfig {
    let mut config = TrackerConfig::default();
    config.account = "curator".to_string();
    config.rpc.endpoints = vec![PRIMARY.to_string(), SECONDARY.to_string()];
    config.scan.page_size = 3;
    config.scan.pacing_ms = 0;
    config.data.dir = dir.to_path_buf();
    config
}
