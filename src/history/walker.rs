//! Ledger history walker.

use crate::classify::Classifier;
use crate::rpc::{FailoverClient, RpcTransport, GET_ACCOUNT_HISTORY};
use crate::types::{HistoryCursor, OperationRecord, SequenceId, WireHistoryEntry};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why a scan ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanStop {
    /// A record older than the cutoff was reached.
    CutoffReached,
    /// The oldest record of the ledger was read.
    Genesis,
    /// The indexer returned an empty page.
    Exhausted,
    /// The record budget ran out before the cutoff.
    BudgetExhausted,
    /// No endpoint answered a page request.
    SourceUnavailable,
}

/// Outcome of a finished (or abandoned) scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanSummary {
    /// Pages successfully fetched.
    pub pages: u32,
    /// Records emitted to the caller.
    pub emitted: u64,
    /// Oldest emitted timestamp.
    pub oldest_seen: Option<DateTime<Utc>>,
    pub stop: Option<ScanStop>,
}

impl ScanSummary {
    /// No page could be fetched at all.
    pub fn source_unreachable(&self) -> bool {
        self.pages == 0 && self.stop == Some(ScanStop::SourceUnavailable)
    }

    /// The scan covered everything back to the cutoff (or the ledger start).
    pub fn is_complete(&self) -> bool {
        matches!(
            self.stop,
            Some(ScanStop::CutoffReached) | Some(ScanStop::Genesis) | Some(ScanStop::Exhausted)
        )
    }
}

/// Starts backward scans through a failover client.
pub struct HistoryWalker<'a, T: RpcTransport> {
    client: &'a FailoverClient<T>,
    pacing: Duration,
}

impl<'a, T: RpcTransport> HistoryWalker<'a, T> {
    /// Walker that waits `pacing` between page fetches.
    pub fn new(client: &'a FailoverClient<T>, pacing: Duration) -> Self {
        Self { client, pacing }
    }

    /// Begin a scan of `account` from its most recent record back to
    /// `cutoff` (inclusive), reading at most `max_records` records.
    pub fn scan(
        &self,
        account: &str,
        cutoff: DateTime<Utc>,
        max_records: u64,
        page_size: u32,
    ) -> HistoryScan<'a, T> {
        HistoryScan {
            client: self.client,
            account: account.to_string(),
            cutoff,
            cursor: HistoryCursor::most_recent(page_size.max(1)),
            remaining_budget: max_records,
            pacing: self.pacing,
            summary: ScanSummary {
                pages: 0,
                emitted: 0,
                oldest_seen: None,
                stop: None,
            },
        }
    }
}

/// A lazy backward scan; each call to [`HistoryScan::next_page`] fetches at
/// most one page.
pub struct HistoryScan<'a, T: RpcTransport> {
    client: &'a FailoverClient<T>,
    account: String,
    cutoff: DateTime<Utc>,
    cursor: HistoryCursor,
    remaining_budget: u64,
    pacing: Duration,
    summary: ScanSummary,
}

impl<'a, T: RpcTransport> HistoryScan<'a, T> {
    pub fn cursor(&self) -> HistoryCursor {
        self.cursor
    }

    pub fn summary(&self) -> &ScanSummary {
        &self.summary
    }

    /// Fetch the next page and return its in-window records in
    /// chronological order. Returns `None` once the scan has stopped.
    pub async fn next_page(&mut self) -> Option<Vec<OperationRecord>> {
        if self.summary.stop.is_some() {
            return None;
        }

        if self.summary.pages > 0 && !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }

        let cursor = self.cursor;
        debug!(
            account = %self.account,
            start = cursor.next_start,
            count = cursor.page_size,
            "fetching history page"
        );
        let params = json!([self.account, cursor.next_start, cursor.page_size]);
        let page: Vec<WireHistoryEntry> =
            match self.client.call_as(GET_ACCOUNT_HISTORY, params).await {
                Some(page) => page,
                None => {
                    warn!(
                        account = %self.account,
                        start = cursor.next_start,
                        pages = self.summary.pages,
                        "history page unavailable, ending scan"
                    );
                    return self.finish(ScanStop::SourceUnavailable);
                }
            };
        self.summary.pages += 1;

        let first_in_page = match page.iter().map(|(seq, _)| *seq).min() {
            Some(first) => SequenceId(first),
            None => return self.finish(ScanStop::Exhausted),
        };

        // Newest first, so the cutoff is met in order.
        let mut kept = Vec::with_capacity(page.len());
        let mut hit_cutoff = false;
        for entry in page.into_iter().rev() {
            let seq = entry.0;
            let record = match OperationRecord::from_wire(entry) {
                Ok(record) => record,
                Err(e) => {
                    warn!(account = %self.account, seq, error = %e, "skipping undecodable record");
                    continue;
                }
            };
            if record.timestamp < self.cutoff {
                hit_cutoff = true;
                break;
            }
            kept.push(record);
        }
        kept.reverse();

        if let Some(oldest) = kept.first().map(|r| r.timestamp) {
            self.summary.oldest_seen = Some(match self.summary.oldest_seen {
                Some(seen) if seen < oldest => seen,
                _ => oldest,
            });
        }
        self.summary.emitted += kept.len() as u64;

        if hit_cutoff {
            self.stop(ScanStop::CutoffReached);
            return Some(kept);
        }

        match cursor.advance(first_in_page) {
            None => self.stop(ScanStop::Genesis),
            Some(next) => {
                self.remaining_budget = self
                    .remaining_budget
                    .saturating_sub(u64::from(cursor.page_size));
                if self.remaining_budget == 0 {
                    info!(
                        account = %self.account,
                        cutoff = %self.cutoff,
                        next_start = next.next_start,
                        "scan budget exhausted before cutoff; widen the budget if data is missing"
                    );
                    self.stop(ScanStop::BudgetExhausted);
                } else {
                    self.cursor = next;
                }
            }
        }

        Some(kept)
    }

    /// Feed every remaining record to `classifier`.
    pub async fn drain_into<C: Classifier>(mut self, classifier: &mut C) -> ScanSummary {
        while let Some(records) = self.next_page().await {
            for record in &records {
                classifier.observe(record);
            }
        }
        info!(
            account = %self.account,
            pages = self.summary.pages,
            emitted = self.summary.emitted,
            stop = ?self.summary.stop,
            "history scan finished"
        );
        self.summary
    }

    fn stop(&mut self, reason: ScanStop) {
        debug!(account = %self.account, ?reason, "scan stopping");
        self.summary.stop = Some(reason);
    }

    fn finish(&mut self, reason: ScanStop) -> Option<Vec<OperationRecord>> {
        self.stop(reason);
        None
    }
}
