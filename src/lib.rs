//! # Delegation Chronicle
//!
//! Tracks the delegators of one ledger account over time: who delegates how
//! much today, how that changed day by day, and how active the account's
//! curation was each month.
//!
//! ## Core Concepts
//!
//! - **History walker**: Backward, paged scan of an account's operation log
//! - **Failover client**: JSON-RPC calls tried against each endpoint in turn
//! - **Classifiers**: Vote and delegation counters fed by the walker
//! - **Series**: Per-entity daily values, merged once per run
//! - **Rollup**: One aggregate record per calendar month
//! - **Guard**: Tolerant loading and atomic writing of JSON artifacts
//!
//! ## Example
//!
//! ```ignore
//! use delegation_chronicle::{Pipeline, TrackerConfig};
//!
//! let pipeline = Pipeline::from_config(TrackerConfig::default())?;
//! let report = pipeline.run(chrono::Utc::now()).await?;
//! println!("{} entities written", report.written);
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod guard;
pub mod history;
pub mod pipeline;
pub mod rpc;
pub mod series;
pub mod snapshot;
pub mod types;

// Re-exports
pub use classify::{Classifier, DelegationTally, LedgerClassifier, VoteAggregate, VoteClassifier};
pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use history::{HistoryScan, HistoryWalker, ScanStop, ScanSummary};
pub use pipeline::{Pipeline, RunReport, SeedReport};
pub use rpc::{FailoverClient, HttpTransport, RpcRequest, RpcResponse, RpcTransport};
pub use series::{merge_series, MergeOutcome, MonthlyRollup, RollupLedger, TimeSeries};
pub use snapshot::{CurrentState, SnapshotDocument};
pub use types::*;
