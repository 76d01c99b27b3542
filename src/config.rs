//! Tracker configuration.
//!
//! Loaded from a TOML file; every field has a default so partial files work.

use crate::error::{Result, TrackerError};
use crate::types::MonthLabel;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Account whose delegations and curation votes are tracked.
    #[serde(default = "default_account")]
    pub account: String,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub watchlist: WatchlistConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            account: default_account(),
            rpc: RpcConfig::default(),
            scan: ScanConfig::default(),
            data: DataConfig::default(),
            feed: FeedConfig::default(),
            watchlist: WatchlistConfig::default(),
        }
    }
}

fn default_account() -> String {
    "hive-br.voter".to_string()
}

/// Ledger RPC endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Candidate endpoints, tried in order.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Per-attempt timeout in seconds.
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            timeout_secs: default_rpc_timeout(),
        }
    }
}

fn default_endpoints() -> Vec<String> {
    vec![
        "https://api.hive.blog".to_string(),
        "https://api.deathwing.me".to_string(),
        "https://api.openhive.network".to_string(),
    ]
}

fn default_rpc_timeout() -> u64 { 15 }

/// History scan bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Records per page request.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Maximum records to read in one scan.
    #[serde(default = "default_max_records")]
    pub max_records: u64,

    /// Delay between page fetches in milliseconds.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Whole calendar months to scan before the current one.
    #[serde(default = "default_months_back")]
    pub months_back: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_records: default_max_records(),
            pacing_ms: default_pacing_ms(),
            months_back: default_months_back(),
        }
    }
}

fn default_page_size() -> u32 { 1000 }
fn default_max_records() -> u64 { 200_000 }
fn default_pacing_ms() -> u64 { 250 }
fn default_months_back() -> u32 { 1 }

impl ScanConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Oldest instant a regular run reads: midnight UTC on the first day of
    /// the month `months_back` months before `now`'s month.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut month = MonthLabel::from_instant(now);
        for _ in 0..self.months_back {
            match month.prev() {
                Some(prev) => month = prev,
                None => break,
            }
        }
        month.first_day().and_time(NaiveTime::MIN).and_utc()
    }
}

/// Artifact locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_current_file")]
    pub current_file: String,
    #[serde(default = "default_history_file")]
    pub history_file: String,
    #[serde(default = "default_rollup_file")]
    pub rollup_file: String,
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,
    #[serde(default = "default_meta_file")]
    pub meta_file: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            current_file: default_current_file(),
            history_file: default_history_file(),
            rollup_file: default_rollup_file(),
            snapshot_file: default_snapshot_file(),
            meta_file: default_meta_file(),
        }
    }
}

fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_current_file() -> String { "current.json".to_string() }
fn default_history_file() -> String { "ranking_history.json".to_string() }
fn default_rollup_file() -> String { "monthly_stats.json".to_string() }
fn default_snapshot_file() -> String { "snapshot.json".to_string() }
fn default_meta_file() -> String { "meta.json".to_string() }

impl DataConfig {
    pub fn current_path(&self) -> PathBuf {
        self.dir.join(&self.current_file)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(&self.history_file)
    }

    pub fn rollup_path(&self) -> PathBuf {
        self.dir.join(&self.rollup_file)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(&self.snapshot_file)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(&self.meta_file)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(".lock")
    }
}

/// Incoming-delegation feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub base_url: String,
    #[serde(default = "default_feed_limit")]
    pub limit: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_url(),
            limit: default_feed_limit(),
        }
    }
}

fn default_feed_url() -> String {
    "https://rpc.mahdiyari.info/hafsql".to_string()
}

fn default_feed_limit() -> u32 { 300 }

/// Manually maintained account tags (for example a community's country
/// groups), copied into each entity's snapshot flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchlistConfig {
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<String>>,
}

impl TrackerConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or use defaults when the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.account.trim().is_empty() {
            return Err(TrackerError::InvalidConfig("account must not be empty".into()));
        }
        if self.rpc.endpoints.is_empty() {
            return Err(TrackerError::InvalidConfig("rpc.endpoints must not be empty".into()));
        }
        if self.scan.page_size == 0 {
            return Err(TrackerError::InvalidConfig("scan.page_size must be positive".into()));
        }
        if self.scan.max_records == 0 {
            return Err(TrackerError::InvalidConfig("scan.max_records must be positive".into()));
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.account, "hive-br.voter");
        assert_eq!(config.rpc.endpoints.len(), 3);
        assert_eq!(config.scan.page_size, 1000);
        assert_eq!(config.data.history_path(), PathBuf::from("data/ranking_history.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = TrackerConfig::from_toml(
            r#"
            account = "curator"

            [scan]
            page_size = 50

            [watchlist.tags]
            br = ["alice", "bob"]
            "#,
        )
        .unwrap();

        assert_eq!(config.account, "curator");
        assert_eq!(config.scan.page_size, 50);
        assert_eq!(config.scan.max_records, 200_000);
        assert_eq!(config.watchlist.tags["br"], vec!["alice", "bob"]);
        assert_eq!(config.rpc, RpcConfig::default());
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            TrackerConfig::from_toml("[rpc]\nendpoints = []"),
            Err(TrackerError::InvalidConfig(_))
        ));
        assert!(matches!(
            TrackerConfig::from_toml("[scan]\npage_size = 0"),
            Err(TrackerError::InvalidConfig(_))
        ));
        assert!(matches!(
            TrackerConfig::from_toml("account = 5"),
            Err(TrackerError::Toml(_))
        ));
    }

    #[test]
    fn test_cutoff_months_back() {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap();
        let mut scan = ScanConfig::default();
        assert_eq!(scan.cutoff(now), Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());

        scan.months_back = 0;
        assert_eq!(scan.cutoff(now), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = TrackerConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, TrackerConfig::default());
    }
}
