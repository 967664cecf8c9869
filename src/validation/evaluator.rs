use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, info_span};

use super::registry::RuleRegistry;
use super::rule::{
    RuleContext, RuleError, RuleOutcome, Severity, ValidationIssue, ValidationRule,
};
use crate::cancel::CancellationToken;
use crate::core::{normalize_path, TestId, TestUnit, UnitId};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::frameworks::{detect_framework, TestFramework};
use crate::mapping::MappingReport;

pub const RULE_EVALUATION_ERROR: &str = "rule_evaluation_error";

/// Outcome of one rule on one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule: String,
    pub passed: bool,
    pub issue: Option<ValidationIssue>,
}

/// All rule results for one test unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestValidation {
    pub test: TestId,
    pub file: PathBuf,
    /// Implementation unit the test was mapped to, for reporting.
    pub target: Option<UnitId>,
    pub framework: TestFramework,
    pub results: Vec<RuleResult>,
    pub quality_score: f64,
}

impl TestValidation {
    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.results.iter().filter_map(|result| result.issue.as_ref())
    }

    pub fn passed_all(&self) -> bool {
        self.results.iter().all(|result| result.passed)
    }

    pub fn result_for(&self, rule: &str) -> Option<&RuleResult> {
        self.results.iter().find(|result| result.rule == rule)
    }
}

/// Fraction of passed rules; an empty rule set scores 1.0.
pub fn calculate_quality_score(results: &[RuleResult]) -> f64 {
    if results.is_empty() {
        return 1.0;
    }
    let passed = results.iter().filter(|result| result.passed).count();
    passed as f64 / results.len() as f64
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn run_rule(rule: &dyn ValidationRule, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
    catch_unwind(AssertUnwindSafe(|| rule.evaluate(ctx)))
        .unwrap_or_else(|payload| Err(RuleError::Panicked(panic_message(payload))))
}

/// Evaluate every rule in `registry` against one test.
///
/// A rule that errors or panics yields a low-severity issue for that rule
/// only, counts as not passed, and is reported as a diagnostic.
pub fn validate_test(
    registry: &RuleRegistry,
    test: &TestUnit,
    target: Option<&UnitId>,
) -> (TestValidation, Vec<Diagnostic>) {
    let framework = detect_framework(&test.source, test.language());
    let ctx = RuleContext::new(test, framework, target);
    let mut diagnostics = Vec::new();

    let results: Vec<RuleResult> = registry
        .iter()
        .map(|rule| {
            let id = rule.id().to_string();
            match run_rule(rule.as_ref(), &ctx) {
                Ok(RuleOutcome::Pass) => RuleResult {
                    rule: id,
                    passed: true,
                    issue: None,
                },
                Ok(RuleOutcome::Fail(finding)) => RuleResult {
                    issue: Some(ValidationIssue::from_finding(&test.id, &id, finding)),
                    rule: id,
                    passed: false,
                },
                Err(err) => {
                    let message = err.to_string();
                    diagnostics.push(Diagnostic::RuleEvaluationError {
                        test: test.id.clone(),
                        rule: id.clone(),
                        message: message.clone(),
                    });
                    RuleResult {
                        issue: Some(ValidationIssue {
                            test: test.id.clone(),
                            rule: id.clone(),
                            issue_type: RULE_EVALUATION_ERROR.to_string(),
                            severity: Severity::Low,
                            message,
                            recommendation: format!("Fix or disable rule '{}'", id),
                        }),
                        rule: id,
                        passed: false,
                    }
                }
            }
        })
        .collect();

    let validation = TestValidation {
        test: test.id.clone(),
        file: test.file.clone(),
        target: target.cloned(),
        framework,
        quality_score: calculate_quality_score(&results),
        results,
    };
    (validation, diagnostics)
}

/// Validation output for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub tests: BTreeMap<TestId, TestValidation>,
    /// Mean quality score of the tests in each file.
    pub file_scores: BTreeMap<PathBuf, f64>,
    /// Mean of the file scores under each directory, at every depth.
    /// The repository root is keyed as `.`.
    pub directory_scores: BTreeMap<PathBuf, f64>,
    /// Fraction of tests passing every rule; 0 when there are no tests.
    pub success_rate: f64,
}

impl ValidationReport {
    pub fn get(&self, test: &TestId) -> Option<&TestValidation> {
        self.tests.get(test)
    }

    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.tests.values().flat_map(TestValidation::issues)
    }

    pub fn file_score(&self, file: &Path) -> Option<f64> {
        self.file_scores.get(&score_key(file)).copied()
    }

    pub fn directory_score(&self, dir: &Path) -> Option<f64> {
        self.directory_scores.get(&score_key(dir)).copied()
    }

    fn from_validations(validations: Vec<TestValidation>) -> Self {
        let mut per_file: BTreeMap<PathBuf, Vec<f64>> = BTreeMap::new();
        for validation in &validations {
            per_file
                .entry(score_key(&validation.file))
                .or_default()
                .push(validation.quality_score);
        }
        let file_scores: BTreeMap<PathBuf, f64> = per_file
            .into_iter()
            .map(|(file, scores)| (file, mean(&scores)))
            .collect();

        let mut per_dir: BTreeMap<PathBuf, Vec<f64>> = BTreeMap::new();
        for (file, score) in &file_scores {
            for dir in file.ancestors().skip(1) {
                per_dir.entry(score_key(dir)).or_default().push(*score);
            }
        }
        let directory_scores = per_dir
            .into_iter()
            .map(|(dir, scores)| (dir, mean(&scores)))
            .collect();

        let success_rate = if validations.is_empty() {
            0.0
        } else {
            validations.iter().filter(|v| v.passed_all()).count() as f64
                / validations.len() as f64
        };

        Self {
            tests: validations
                .into_iter()
                .map(|validation| (validation.test.clone(), validation))
                .collect(),
            file_scores,
            directory_scores,
            success_rate,
        }
    }
}

/// Score map key: `./tests/a.py` and `tests/a.py` share one entry; the root is `.`.
fn score_key(path: &Path) -> PathBuf {
    let normalized = normalize_path(path);
    if normalized.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(normalized)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[derive(Debug)]
pub struct ValidationRun {
    pub report: ValidationReport,
    pub diagnostics: Diagnostics,
    pub complete: bool,
}

/// Run the registry over every test in parallel.
///
/// `mapping` only contributes the target unit attached to each result.
pub fn validate_tests(
    registry: &RuleRegistry,
    tests: &[TestUnit],
    mapping: Option<&MappingReport>,
    cancel: &CancellationToken,
) -> ValidationRun {
    let _span = info_span!("validation", tests = tests.len(), rules = registry.len()).entered();

    let mut ordered: Vec<&TestUnit> = tests.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));
    ordered.dedup_by(|later, earlier| later.id == earlier.id);

    let evaluated: Vec<(TestValidation, Vec<Diagnostic>)> = ordered
        .par_iter()
        .filter(|_| !cancel.is_cancelled())
        .map(|test| {
            let target = mapping
                .and_then(|report| report.resolved_for(&test.id))
                .map(|edge| &edge.unit);
            validate_test(registry, test, target)
        })
        .collect();

    let complete = evaluated.len() == ordered.len();
    let mut diagnostics = Diagnostics::new();
    let mut validations = Vec::with_capacity(evaluated.len());
    for (validation, found) in evaluated {
        for diagnostic in found {
            diagnostics.push(diagnostic);
        }
        validations.push(validation);
    }

    let report = ValidationReport::from_validations(validations);
    debug!(
        tests = report.tests.len(),
        success_rate = report.success_rate,
        "validated tests"
    );

    ValidationRun {
        report,
        diagnostics,
        complete,
    }
}
