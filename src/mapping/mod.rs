//! Best-effort association of test units with the implementation units they exercise.
//!
//! Three independent signals (name correlation, declared reference, path
//! proximity) add up to a confidence per candidate. The best candidate wins,
//! unless a manual override pins the test to a unit.

pub mod overrides;
pub mod resolver;
pub mod signals;

pub use overrides::OverrideTable;
pub use resolver::{
    candidates_for, resolve_mappings, resolve_mappings_with_cancel, MappingEdge, MappingReport,
    MappingRun,
};
pub use signals::{extract_imports, strip_test_markers, Signal};
