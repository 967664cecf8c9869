//! End-to-end checks of the documented coverage, mapping and scoring scenarios.

mod common;

use common::{function, init_tracing, module_id, test_unit, unit_id};
use pretty_assertions::assert_eq;
use testgap::coverage::FileFacts;
use testgap::mapping::{OverrideTable, Signal};
use testgap::validation::{validate_test, Finding, RuleError};
use testgap::{
    aggregate_coverage, build_structural_model, calculate_quality_score, resolve_mappings,
    ExecutionFacts, FnRule, RuleContext, RuleOutcome, RuleRegistry, Severity, SourceFile,
    TestgapConfig,
};

const EPSILON: f64 = 1e-6;

fn two_function_module(complexity_a: u32, complexity_b: u32) -> (f64, f64) {
    let build = build_structural_model(
        &[SourceFile::new("m.py", 15)],
        &[
            function("m.a", "m.py", 1, 10).with_complexity(complexity_a),
            function("m.b", "m.py", 11, 15).with_complexity(complexity_b),
        ],
    );
    assert!(build.diagnostics.is_empty());

    let mut facts = ExecutionFacts::new();
    facts.insert("m.py", FileFacts::with_lines(1..=8, (9..=10).chain(11..=15)));
    let tree = aggregate_coverage(&build.model, &facts);

    let module = tree.get(&module_id("m.py")).unwrap();
    assert_eq!(module.covered.len() + module.missing.len(), 15);
    assert_eq!(tree.line_pct(&unit_id("m.py", "m.a")), Some(80.0));
    assert_eq!(tree.line_pct(&unit_id("m.py", "m.b")), Some(0.0));
    (module.line_pct, module.weighted_pct)
}

#[test]
fn weighted_and_plain_module_coverage_diverge_with_uneven_complexity() {
    init_tracing();

    let (plain, weighted) = two_function_module(2, 1);
    assert!((plain - 800.0 / 15.0).abs() < EPSILON);
    assert!((weighted - 160.0 / 3.0).abs() < EPSILON);

    let (plain, weighted) = two_function_module(5, 1);
    assert!((plain - 53.333_333).abs() < 1e-3);
    assert!((weighted - 66.666_667).abs() < 1e-3);
    assert!((plain - weighted).abs() > 1.0);
}

fn billing_files() -> (Vec<SourceFile>, Vec<testgap::UnitDescriptor>) {
    (
        vec![
            SourceFile::new("billing.py", 20),
            SourceFile::new("check_total.py", 10),
            SourceFile::new("legacy/calculate.py", 10),
        ],
        vec![
            function("billing.calculate_total", "billing.py", 1, 10),
            function("check_total.helper", "check_total.py", 1, 5),
            function("legacy.calculate.calculate_total", "legacy/calculate.py", 1, 8),
        ],
    )
}

#[test]
fn declared_reference_maps_and_name_correlation_raises_confidence() {
    init_tracing();
    let (files, units) = billing_files();
    let model = build_structural_model(&files, &units).model;
    let config = TestgapConfig::default();
    let target = unit_id("billing.py", "billing.calculate_total");
    let source = "result = billing.calculate_total([1, 2])\nassert result == 3\n";

    let reference_only = test_unit("check_total", "tests/check_total_spec", source);
    let run = resolve_mappings(
        &model,
        &[reference_only.clone()],
        &OverrideTable::new(),
        &config.mapping,
    );
    let edge = run.report.resolved_for(&reference_only.id).unwrap();
    assert_eq!(edge.unit, target);
    assert_eq!(edge.signals, vec![Signal::DeclaredReference]);
    assert!(edge.confidence >= 0.3 - EPSILON);

    let alternatives = &run.report.candidates[&reference_only.id];
    assert!(alternatives
        .iter()
        .any(|c| c.unit == unit_id("check_total.py", "check_total.helper") && c.confidence < edge.confidence));

    let correlated = test_unit("test_calculate_total", "tests/check_total_spec", source);
    let run = resolve_mappings(&model, &[correlated.clone()], &OverrideTable::new(), &config.mapping);
    let edge = run.report.resolved_for(&correlated.id).unwrap();
    assert_eq!(edge.unit, target);
    assert!(edge.confidence >= 0.8 - EPSILON);
    assert!(edge.signals.contains(&Signal::NameCorrelation));

    let legacy = run.report.candidates[&correlated.id]
        .iter()
        .find(|c| c.unit == unit_id("legacy/calculate.py", "legacy.calculate.calculate_total"))
        .unwrap();
    assert!(legacy.confidence < edge.confidence);
}

fn requires_assert() -> impl testgap::ValidationRule {
    FnRule::new("requires-assert", |ctx: &RuleContext<'_>| -> Result<RuleOutcome, RuleError> {
        if ctx.source().contains("assert") {
            Ok(RuleOutcome::Pass)
        } else {
            Ok(RuleOutcome::Fail(Finding::new(
                "insufficient_assertions",
                Severity::High,
                "no assertions found",
                "assert on the result",
            )))
        }
    })
}

#[test]
fn quality_score_for_failing_then_passing_rule() {
    let test = test_unit("test_noop", "tests/test_noop.py", "def test_noop():\n    run()\n");

    let mut registry = RuleRegistry::new();
    registry.register(requires_assert()).unwrap();
    let (validation, _) = validate_test(&registry, &test, None);
    assert_eq!(calculate_quality_score(&validation.results), 0.0);

    registry
        .register(FnRule::new("always", |_: &RuleContext<'_>| {
            Ok(RuleOutcome::Pass)
        }))
        .unwrap();
    let (validation, _) = validate_test(&registry, &test, None);
    assert_eq!(calculate_quality_score(&validation.results), 0.5);
    assert_eq!(validation.quality_score, 0.5);

    assert_eq!(calculate_quality_score(&[]), 1.0);
}
