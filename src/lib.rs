// Export modules for library usage
pub mod cancel;
pub mod comparison;
pub mod config;
pub mod core;
pub mod coverage;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod frameworks;
pub mod mapping;
pub mod priority;
pub mod structure;
pub mod validation;

// Re-export commonly used types
pub use crate::core::{
    Language, LineRange, SourceFile, TestId, TestUnit, UnitDescriptor, UnitId, UnitKind,
};

pub use crate::cancel::CancellationToken;
pub use crate::config::{load_config, load_config_from_path, TestgapConfig};
pub use crate::diagnostics::{Diagnostic, Diagnostics};
pub use crate::errors::{Error, Result};

pub use crate::engine::{AnalysisContext, AnalysisSnapshot, CandidateEvaluation, Engine, RunInput};

pub use crate::structure::{build_structural_model, StructuralModel, UnitNode};

pub use crate::mapping::{resolve_mappings, MappingEdge, MappingReport, OverrideTable, Signal};

pub use crate::coverage::{
    aggregate_coverage, parse_coverage_json_file, parse_lcov_file, summarize_coverage,
    CoverageRecord, CoverageSummary, CoverageTree, ExecutionFacts, FileFacts,
};

pub use crate::priority::{prioritize, DependencyMap, DependencyProvider, PriorityList, PriorityScore};

pub use crate::validation::{
    calculate_quality_score, validate_tests, FnRule, RuleContext, RuleOutcome, RuleRegistry,
    Severity, ValidationIssue, ValidationReport, ValidationRule,
};

pub use crate::frameworks::{detect_framework, TestFramework};

pub use crate::comparison::{compare_runs, RunComparison, RunSummary};
