//! Hierarchical coverage derived from raw execution facts.

pub mod aggregator;
pub mod coverage_json;
pub mod facts;
pub mod lcov;
pub mod summary;

pub use aggregator::{
    aggregate_coverage, aggregate_coverage_with_cancel, CoverageRecord, CoverageTree,
};
pub use coverage_json::{parse_coverage_json_file, parse_coverage_json_str};
pub use facts::{percentage, BranchCount, ExecutionFacts, FileFacts};
pub use self::lcov::{parse_lcov, parse_lcov_file, parse_lcov_str};
pub use summary::{summarize_coverage, CoverageSummary, ModuleCoverage};
