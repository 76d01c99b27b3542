//! One scan → classify → merge cycle over the persisted artifacts.

use crate::classify::{DelegationTally, LedgerClassifier, VoteClassifier};
use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::guard;
use crate::history::{HistoryWalker, ScanSummary};
use crate::rpc::{FailoverClient, HttpTransport, RpcTransport};
use crate::series::{
    merge_series, reference_date, top_gainer, GainerReport, MonthlyRollup, RollupLedger,
    TimeSeries, UpsertOutcome,
};
use crate::snapshot::{build_snapshot, load_current_state, CurrentState, RunMeta};
use crate::types::{EntityId, MonthLabel};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::Path;
use tracing::{info, warn};

/// Outcome of [`Pipeline::run`].
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub today: NaiveDate,
    pub cutoff: DateTime<Utc>,
    pub scan: ScanSummary,
    pub written: usize,
    pub entered: Vec<EntityId>,
    pub exited: Vec<EntityId>,
    /// `None` when the rollup was left untouched.
    pub rollup: Option<UpsertOutcome>,
}

impl RunReport {
    pub fn ledger_reachable(&self) -> bool {
        !self.scan.source_unreachable()
    }

    /// `0` on success, `3` when no ledger endpoint answered.
    pub fn exit_code(&self) -> u8 {
        if self.ledger_reachable() {
            0
        } else {
            3
        }
    }
}

/// Outcome of [`Pipeline::seed`].
#[derive(Clone, Debug, PartialEq)]
pub struct SeedReport {
    pub scan: ScanSummary,
    pub inserted: Vec<MonthLabel>,
    pub updated: Vec<MonthLabel>,
    /// Months only partly covered by the scan; not written.
    pub skipped: Vec<MonthLabel>,
}

/// Exclusive lock on the data directory for the duration of a run.
struct RunLock {
    _file: File,
}

impl RunLock {
    fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        file.try_lock_exclusive().map_err(|_| TrackerError::Locked)?;
        Ok(Self { _file: file })
    }
}

/// The tracker pipeline, configured once and run per invocation.
pub struct Pipeline<T: RpcTransport = HttpTransport> {
    config: TrackerConfig,
    client: FailoverClient<T>,
}

impl Pipeline<HttpTransport> {
    /// Pipeline talking HTTP to the configured endpoints.
    pub fn from_config(config: TrackerConfig) -> Result<Self> {
        let client = FailoverClient::http(config.rpc.endpoints.clone(), config.rpc_timeout())?;
        Self::new(config, client)
    }
}

impl<T: RpcTransport> Pipeline<T> {
    pub fn new(config: TrackerConfig, client: FailoverClient<T>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn client(&self) -> &FailoverClient<T> {
        &self.client
    }

    /// Run one full cycle as of `now`.
    ///
    /// The current-state input is loaded first; when it is missing or
    /// unreadable nothing is written. An unreachable ledger still updates
    /// the series and snapshot (with zero vote counts) but leaves the
    /// monthly rollup alone.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let data = &self.config.data;
        let _lock = RunLock::acquire(&data.lock_path())?;

        let current = load_current_state(data.current_path())?;
        if current.account != self.config.account {
            warn!(
                expected = %self.config.account,
                found = %current.account,
                "current state was generated for a different account"
            );
        }
        let prior: TimeSeries = guard::load_or_default(data.history_path(), TimeSeries::new());
        let mut rollup = RollupLedger::from_records(guard::load_or_default(data.rollup_path(), Vec::new()));

        let cutoff = self.config.scan.cutoff(now);
        let (classifier, scan) = self.scan_ledger(cutoff, self.config.scan.max_records, now).await;
        if scan.source_unreachable() {
            warn!(account = %self.config.account, "ledger unreachable; vote counts default to zero");
        }

        let today = now.date_naive();
        let merged = merge_series(&current.entities, prior, today)?;
        guard::write_atomic(data.history_path(), &merged.series)?;

        let votes = classifier.votes.aggregate();
        let snapshot = build_snapshot(
            &current,
            votes,
            &classifier.delegations,
            &self.config.watchlist.tags,
            now,
        );
        guard::write_atomic(data.snapshot_path(), &snapshot)?;

        let month = MonthLabel::from_instant(now);
        let rollup_outcome = if covers(&scan, cutoff, month) {
            let outcome = rollup.upsert(MonthlyRollup {
                date: month.first_day(),
                total_power: current.total_value(),
                active_members: current.entities.len() as u64,
                monthly_votes: votes.count_for(month),
                new_delegators: classifier.delegations.count_for(month),
            });
            guard::write_atomic(data.rollup_path(), &rollup)?;
            info!(%month, ?outcome, "monthly rollup updated");
            Some(outcome)
        } else {
            warn!(%month, stop = ?scan.stop, "scan did not cover the month; rollup left unchanged");
            None
        };

        Ok(RunReport {
            today,
            cutoff,
            scan,
            written: merged.written,
            entered: merged.entered,
            exited: merged.exited,
            rollup: rollup_outcome,
        })
    }

    /// Backfill vote and delegation counts for every month from `since`
    /// through the month of `now`.
    ///
    /// Months already in the rollup keep their power and member totals;
    /// new months are created with those at zero. A month the scan did not
    /// read from its first day (including the month of a mid-month `since`)
    /// is skipped and left as stored.
    pub async fn seed(&self, since: NaiveDate, max_records: u64, now: DateTime<Utc>) -> Result<SeedReport> {
        let data = &self.config.data;
        let _lock = RunLock::acquire(&data.lock_path())?;

        let cutoff = since.and_time(NaiveTime::MIN).and_utc();
        let (classifier, scan) = self.scan_ledger(cutoff, max_records, now).await;
        if scan.source_unreachable() {
            return Err(TrackerError::LedgerUnreachable {
                account: self.config.account.clone(),
            });
        }

        let mut rollup = RollupLedger::from_records(guard::load_or_default(data.rollup_path(), Vec::new()));
        let votes = classifier.votes.aggregate();

        // Every month in range, so quiet months are reset to zero too.
        let mut months = Vec::new();
        let last = MonthLabel::from_instant(now);
        let mut month = MonthLabel::from_date(since);
        while month <= last {
            months.push(month);
            match month.next() {
                Some(next) => month = next,
                None => break,
            }
        }

        let mut report = SeedReport {
            scan: scan.clone(),
            inserted: Vec::new(),
            updated: Vec::new(),
            skipped: Vec::new(),
        };
        for month in months {
            if !covers(&scan, cutoff, month) {
                warn!(%month, "month only partly scanned; not seeding it");
                report.skipped.push(month);
                continue;
            }
            let vote_count = votes.count_for(month);
            let delegation_count = classifier.delegations.count_for(month);
            info!(%month, votes = vote_count, delegations = delegation_count, "seeding month");
            match rollup.amend(month, |r| {
                r.monthly_votes = vote_count;
                r.new_delegators = delegation_count;
            }) {
                UpsertOutcome::Inserted => report.inserted.push(month),
                UpsertOutcome::Replaced => report.updated.push(month),
            }
        }

        guard::write_atomic(data.rollup_path(), &rollup)?;
        Ok(report)
    }

    /// Entity with the largest gain since the end of last month.
    pub fn gainer(&self, today: NaiveDate) -> Result<GainerReport> {
        let data = &self.config.data;
        let current = load_current_state(data.current_path())?;
        let series: TimeSeries = guard::load_or_default(data.history_path(), TimeSeries::new());
        Ok(top_gainer(&current.entities, &series, reference_date(today)))
    }

    /// Persist a freshly fetched current state and its run metadata.
    pub fn store_current(&self, state: &CurrentState) -> Result<()> {
        let data = &self.config.data;
        let _lock = RunLock::acquire(&data.lock_path())?;
        guard::write_atomic(data.current_path(), state)?;
        guard::write_atomic(data.meta_path(), &RunMeta::from_state(state))?;
        info!(
            entities = state.entities.len(),
            total = state.total_value(),
            "current state stored"
        );
        Ok(())
    }

    async fn scan_ledger(
        &self,
        cutoff: DateTime<Utc>,
        max_records: u64,
        now: DateTime<Utc>,
    ) -> (LedgerClassifier, ScanSummary) {
        let account = &self.config.account;
        let mut classifier = LedgerClassifier::new(
            VoteClassifier::new(account.as_str(), now),
            DelegationTally::new(account.as_str()),
        );
        let walker = HistoryWalker::new(&self.client, self.config.scan.pacing());
        let summary = walker
            .scan(account, cutoff, max_records, self.config.scan.page_size)
            .drain_into(&mut classifier)
            .await;
        (classifier, summary)
    }
}

/// Whether every record of `month` up to the scan start was read.
///
/// A month that begins before `cutoff` is never covered, however the scan
/// ended.
fn covers(scan: &ScanSummary, cutoff: DateTime<Utc>, month: MonthLabel) -> bool {
    let start = month.window().start;
    if cutoff > start {
        return false;
    }
    scan.is_complete() || scan.oldest_seen.map_or(false, |oldest| oldest <= start)
}
