//! Run-to-run comparison of coverage and validation summaries.

pub mod comparator;
pub mod types;

pub use comparator::{compare_runs, Comparator, SIGNIFICANT_CHANGE};
pub use types::{ChangeDirection, ComparisonMetadata, ModuleChange, RunComparison, RunSummary};
