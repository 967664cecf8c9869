//! Analysis entry point.
//!
//! An [`Engine`] owns the two pieces of state that outlive a run: the manual
//! override table and the rule registry. Everything else is passed in through
//! an [`AnalysisContext`] and a [`RunInput`], and every call to
//! [`Engine::analyze`] returns a self-contained [`AnalysisSnapshot`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span};

use crate::cancel::CancellationToken;
use crate::config::TestgapConfig;
use crate::core::{SourceFile, TestId, TestUnit, UnitDescriptor, UnitId};
use crate::coverage::{
    aggregate_coverage_with_cancel, summarize_coverage, CoverageRecord, CoverageSummary,
    CoverageTree, ExecutionFacts,
};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::errors::Result;
use crate::mapping::{resolve_mappings, resolve_mappings_with_cancel, MappingEdge, MappingReport, OverrideTable};
use crate::priority::{prioritize, DependencyProvider, PriorityList, PriorityScore};
use crate::structure::{build_structural_model_with_cancel, StructuralModel, UnitNode};
use crate::validation::{
    validate_test, validate_tests, RuleRegistry, TestValidation, ValidationIssue,
    ValidationReport, ValidationRule,
};

/// Per-call settings: which repository, with which configuration.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub repository: PathBuf,
    pub config: TestgapConfig,
    pub cancel: CancellationToken,
}

impl AnalysisContext {
    pub fn new(repository: impl Into<PathBuf>, config: TestgapConfig) -> Self {
        Self {
            repository: repository.into(),
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Materialized collaborator output for one run.
#[derive(Clone, Default)]
pub struct RunInput {
    pub files: Vec<SourceFile>,
    pub units: Vec<UnitDescriptor>,
    pub tests: Vec<TestUnit>,
    pub facts: ExecutionFacts,
    pub dependencies: Option<Arc<dyn DependencyProvider>>,
}

impl RunInput {
    pub fn new(files: Vec<SourceFile>, units: Vec<UnitDescriptor>) -> Self {
        Self {
            files,
            units,
            ..Self::default()
        }
    }

    pub fn with_tests(mut self, tests: Vec<TestUnit>) -> Self {
        self.tests = tests;
        self
    }

    pub fn with_facts(mut self, facts: ExecutionFacts) -> Self {
        self.facts = facts;
        self
    }

    pub fn with_dependencies(mut self, provider: impl DependencyProvider + 'static) -> Self {
        self.dependencies = Some(Arc::new(provider));
        self
    }
}

/// Everything one run produced. Snapshots never change after they are returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub repository: PathBuf,
    pub model: StructuralModel,
    pub mapping: MappingReport,
    pub coverage: CoverageTree,
    pub coverage_summary: CoverageSummary,
    pub priorities: PriorityList,
    pub validation: ValidationReport,
    pub diagnostics: Diagnostics,
    /// False when the run was cancelled before every stage finished its work.
    pub complete: bool,
}

impl AnalysisSnapshot {
    pub fn unit(&self, id: &UnitId) -> Option<&UnitNode> {
        self.model.get(id)
    }

    pub fn coverage_of(&self, id: &UnitId) -> Option<&CoverageRecord> {
        self.coverage.get(id)
    }

    pub fn line_coverage(&self, id: &UnitId) -> Option<f64> {
        self.coverage.line_pct(id)
    }

    pub fn weighted_coverage(&self, id: &UnitId) -> Option<f64> {
        self.coverage.weighted_pct(id)
    }

    pub fn resolved_edge(&self, test: &TestId) -> Option<&MappingEdge> {
        self.mapping.resolved_for(test)
    }

    pub fn unmapped_tests(&self) -> &[TestId] {
        &self.mapping.unmapped
    }

    pub fn untested_units(&self) -> Vec<&UnitNode> {
        self.mapping.untested_units(&self.model)
    }

    pub fn top_priorities(&self, n: usize) -> &[PriorityScore] {
        self.priorities.top(n)
    }

    pub fn test_validation(&self, test: &TestId) -> Option<&TestValidation> {
        self.validation.get(test)
    }

    pub fn directory_score(&self, dir: &Path) -> Option<f64> {
        self.validation.directory_score(dir)
    }

    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.validation.issues()
    }
}

/// Mapping and validation of a single candidate test against an existing snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvaluation {
    pub resolved: Option<MappingEdge>,
    pub candidates: Vec<MappingEdge>,
    pub validation: TestValidation,
    pub diagnostics: Diagnostics,
}

impl CandidateEvaluation {
    pub fn accepted(&self) -> bool {
        self.resolved.is_some() && self.validation.passed_all()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    overrides: OverrideTable,
    rules: RuleRegistry,
}

impl Engine {
    /// An engine with the built-in rules enabled by `config`.
    pub fn new(config: &TestgapConfig) -> Self {
        Self {
            overrides: OverrideTable::new(),
            rules: RuleRegistry::with_builtin_rules(&config.validation),
        }
    }

    pub fn with_parts(overrides: OverrideTable, rules: RuleRegistry) -> Self {
        Self { overrides, rules }
    }

    pub fn overrides(&self) -> &OverrideTable {
        &self.overrides
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    /// Pin a test to a unit of `model`. Rejected overrides leave the table unchanged.
    pub fn add_override(
        &mut self,
        test: TestId,
        unit: UnitId,
        model: &StructuralModel,
    ) -> std::result::Result<Option<UnitId>, Diagnostic> {
        self.overrides.add(test, unit, model)
    }

    pub fn remove_override(&mut self, test: &TestId) -> Option<UnitId> {
        self.overrides.remove(test)
    }

    pub fn clear_overrides(&mut self) {
        self.overrides.clear();
    }

    pub fn load_overrides(&mut self, path: &Path) -> Result<()> {
        self.overrides = OverrideTable::load_or_default(path)?;
        Ok(())
    }

    pub fn save_overrides(&self, path: &Path) -> Result<()> {
        self.overrides.save(path)
    }

    pub fn register_rule<R: ValidationRule + 'static>(&mut self, rule: R) -> Result<()> {
        self.rules.register(rule)
    }

    pub fn remove_rule(&mut self, id: &str) -> bool {
        self.rules.remove(id).is_some()
    }

    /// Run every stage over `input` and collect the results.
    pub fn analyze(&self, ctx: &AnalysisContext, input: &RunInput) -> AnalysisSnapshot {
        let span = info_span!(
            "analysis",
            repository = %ctx.repository.display(),
            units = input.units.len(),
            tests = input.tests.len(),
        );
        let _guard = span.enter();
        let start = Instant::now();

        let structure = build_structural_model_with_cancel(&input.files, &input.units, &ctx.cancel);
        let model = structure.model;
        let mut diagnostics = structure.diagnostics;

        let (mapping, coverage) = rayon::join(
            || {
                resolve_mappings_with_cancel(
                    &model,
                    &input.tests,
                    &self.overrides,
                    &ctx.config.mapping,
                    &ctx.cancel,
                )
            },
            || aggregate_coverage_with_cancel(&model, &input.facts, &ctx.cancel),
        );
        diagnostics.extend(mapping.diagnostics);

        let coverage_summary = summarize_coverage(
            &model,
            &coverage,
            ctx.config.coverage.low_coverage_threshold,
        );
        let priorities = prioritize(
            &model,
            &coverage,
            &ctx.config.priority,
            input.dependencies.as_deref(),
        );

        let validation = validate_tests(&self.rules, &input.tests, Some(&mapping.report), &ctx.cancel);
        diagnostics.extend(validation.diagnostics);

        let complete =
            structure.complete && mapping.complete && coverage.complete && validation.complete;

        info!(
            units = model.len(),
            resolved = mapping.report.resolved.len(),
            unmapped = mapping.report.unmapped.len(),
            overall_coverage = coverage_summary.overall_pct,
            diagnostics = diagnostics.len(),
            complete,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        AnalysisSnapshot {
            repository: ctx.repository.clone(),
            model,
            mapping: mapping.report,
            coverage,
            coverage_summary,
            priorities,
            validation: validation.report,
            diagnostics,
            complete,
        }
    }

    /// Map and validate a generated test against `snapshot` without changing it.
    pub fn evaluate_candidate(
        &self,
        ctx: &AnalysisContext,
        snapshot: &AnalysisSnapshot,
        test: &TestUnit,
    ) -> CandidateEvaluation {
        let run = resolve_mappings(
            &snapshot.model,
            std::slice::from_ref(test),
            &self.overrides,
            &ctx.config.mapping,
        );
        let mut diagnostics = run.diagnostics;
        let mut report = run.report;

        let resolved = report.resolved.remove(&test.id);
        let candidates = report.candidates.remove(&test.id).unwrap_or_default();

        let (validation, rule_diagnostics) =
            validate_test(&self.rules, test, resolved.as_ref().map(|edge| &edge.unit));
        for diagnostic in rule_diagnostics {
            diagnostics.push(diagnostic);
        }

        CandidateEvaluation {
            resolved,
            candidates,
            validation,
            diagnostics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LineRange, UnitKind};
    use crate::coverage::FileFacts;
    use indoc::indoc;

    fn input() -> RunInput {
        let mut facts = ExecutionFacts::new();
        facts.insert("billing.py", FileFacts::with_lines(1..=8, 9..=15));

        RunInput::new(
            vec![SourceFile::new("billing.py", 15)],
            vec![
                UnitDescriptor::new(UnitKind::Function, "billing.calculate_total", "billing.py", LineRange::new(1, 10)),
                UnitDescriptor::new(UnitKind::Function, "billing.refund", "billing.py", LineRange::new(11, 15)),
            ],
        )
        .with_tests(vec![TestUnit::new(
            "test_calculate_total",
            "tests/test_billing.py",
            LineRange::new(1, 5),
            indoc! {"
                from billing import calculate_total

                def test_calculate_total():
                    assert calculate_total([1, 2]) == 3
            "},
        )])
        .with_facts(facts)
    }

    #[test]
    fn test_analyze_produces_every_stage() {
        let config = TestgapConfig::default();
        let engine = Engine::new(&config);
        let ctx = AnalysisContext::new("/repo", config);

        let snapshot = engine.analyze(&ctx, &input());
        assert!(snapshot.complete);

        let test = TestId::from("tests/test_billing.py::test_calculate_total");
        let edge = snapshot.resolved_edge(&test).unwrap();
        assert_eq!(edge.unit, UnitId::unit(Path::new("billing.py"), "billing.calculate_total"));

        let refund = UnitId::unit(Path::new("billing.py"), "billing.refund");
        assert_eq!(snapshot.line_coverage(&refund), Some(0.0));
        assert_eq!(snapshot.top_priorities(1)[0].unit, refund);
        assert_eq!(snapshot.test_validation(&test).unwrap().quality_score, 1.0);
    }

    #[test]
    fn test_cancelled_analysis_is_incomplete() {
        let config = TestgapConfig::default();
        let engine = Engine::new(&config);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = AnalysisContext::new("/repo", config).with_cancellation(cancel);

        let snapshot = engine.analyze(&ctx, &input());
        assert!(!snapshot.complete);
    }

    #[test]
    fn test_candidate_evaluation_leaves_snapshot_untouched() {
        let config = TestgapConfig::default();
        let engine = Engine::new(&config);
        let ctx = AnalysisContext::new("/repo", config);
        let snapshot = engine.analyze(&ctx, &input());

        let candidate = TestUnit::new(
            "test_refund",
            "tests/test_billing.py",
            LineRange::new(10, 12),
            "def test_refund():\n    assert refund(3) == -3\n",
        );
        let evaluation = engine.evaluate_candidate(&ctx, &snapshot, &candidate);

        assert_eq!(
            evaluation.resolved.as_ref().map(|edge| edge.unit.clone()),
            Some(UnitId::unit(Path::new("billing.py"), "billing.refund"))
        );
        assert!(evaluation.accepted());
        assert!(snapshot.resolved_edge(&candidate.id).is_none());
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let config = TestgapConfig::default();
        let mut engine = Engine::new(&config);
        let snapshot = engine.analyze(&AnalysisContext::new("/repo", config), &input());

        let result = engine.add_override(
            TestId::from("t"),
            UnitId::from("nowhere.py::ghost"),
            &snapshot.model,
        );
        assert!(matches!(result, Err(Diagnostic::InvalidOverride { .. })));
        assert!(engine.overrides().is_empty());
    }
}
