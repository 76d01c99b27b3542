//! Backward, cursor-based pagination over an account's operation history.
//!
//! Pages come back oldest-first but the scan walks from the newest record
//! toward genesis, so each page is read in reverse and cut at the cutoff.

mod walker;

pub use walker::{HistoryScan, HistoryWalker, ScanStop, ScanSummary};
