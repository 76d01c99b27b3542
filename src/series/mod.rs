//! Long-lived history artifacts.
//!
//! - [`TimeSeries`]: sparse per-entity daily values, merged once per run.
//! - [`RollupLedger`]: one aggregate record per calendar month.

mod gainer;
mod merge;
mod rollup;

pub use gainer::{reference_date, top_gainer, Gainer, GainerReport};
pub use merge::{merge_series, MergeOutcome, TimeSeries};
pub use rollup::{MonthlyRollup, RollupLedger, UpsertOutcome};
