//! Test-quality validation.
//!
//! Rules are values implementing [`ValidationRule`] held in an ordered
//! [`RuleRegistry`]. Each test unit is checked by every rule independently;
//! its quality score is the fraction of rules it passes.

pub mod evaluator;
pub mod registry;
pub mod rule;
pub mod rules;

pub use evaluator::{
    calculate_quality_score, validate_test, validate_tests, RuleResult, TestValidation,
    ValidationReport, ValidationRun, RULE_EVALUATION_ERROR,
};
pub use registry::RuleRegistry;
pub use rule::{
    Finding, FnRule, RuleContext, RuleError, RuleOutcome, Severity, ValidationIssue,
    ValidationRule,
};
pub use rules::builtin_rules;
