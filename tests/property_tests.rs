//! Property-based tests for the analysis stages
//!
//! These tests verify invariants that should hold for all inputs:
//! - Every node accounts for exactly the executable lines in its range
//! - Aggregation is idempotent
//! - Mapping resolution ignores input order
//! - Priority order is consistent with descending score
//! - Quality scores stay within [0, 1]

mod common;

use common::{function, test_unit};
use proptest::prelude::*;
use std::collections::BTreeSet;
use testgap::coverage::FileFacts;
use testgap::mapping::OverrideTable;
use testgap::validation::{RuleError, RuleResult};
use testgap::{
    aggregate_coverage, build_structural_model, calculate_quality_score, prioritize,
    resolve_mappings, ExecutionFacts, SourceFile, StructuralModel, TestgapConfig,
};

const FILE: &str = "pkg/mod_a.py";
const FILE_LINES: usize = 120;

/// Non-overlapping function ranges inside one file.
fn layout() -> impl Strategy<Value = Vec<(usize, usize, u32)>> {
    prop::collection::vec((1usize..12, 0usize..4, 0u32..8), 1..8).prop_map(|spans| {
        let mut start = 1;
        let mut out = Vec::new();
        for (len, gap, complexity) in spans {
            let begin = start + gap;
            let end = begin + len - 1;
            if end > FILE_LINES {
                break;
            }
            out.push((begin, end, complexity));
            start = end + 1;
        }
        out
    })
}

fn model_for(layout: &[(usize, usize, u32)]) -> StructuralModel {
    let units: Vec<_> = layout
        .iter()
        .enumerate()
        .map(|(idx, (start, end, complexity))| {
            function(&format!("pkg.mod_a.f{}", idx), FILE, *start, *end).with_complexity(*complexity)
        })
        .collect();
    build_structural_model(&[SourceFile::new(FILE, FILE_LINES)], &units).model
}

fn facts_for(covered: &BTreeSet<usize>, missing: &BTreeSet<usize>) -> ExecutionFacts {
    let mut facts = ExecutionFacts::new();
    facts.insert(
        FILE,
        FileFacts::with_lines(covered.iter().copied(), missing.difference(covered).copied()),
    );
    facts
}

fn line_set() -> impl Strategy<Value = BTreeSet<usize>> {
    prop::collection::btree_set(1usize..=FILE_LINES, 0..60)
}

proptest! {
    #[test]
    fn prop_line_accounting_holds_for_every_node(
        layout in layout(),
        covered in line_set(),
        missing in line_set(),
    ) {
        let model = model_for(&layout);
        let facts = facts_for(&covered, &missing);
        let tree = aggregate_coverage(&model, &facts);
        let file_facts = facts.file(std::path::Path::new(FILE)).unwrap();

        for node in model.implementation_units().chain(model.modules()) {
            let record = tree.get(&node.id).unwrap();
            prop_assert!(record.covered.is_disjoint(&record.missing));
            prop_assert_eq!(
                record.covered.len() + record.missing.len(),
                file_facts.executable_in(node.range)
            );
            prop_assert!(record.line_pct >= 0.0 && record.line_pct <= 100.0);
            prop_assert!(record.weighted_pct >= 0.0 && record.weighted_pct <= 100.0);
        }
    }

    #[test]
    fn prop_aggregation_is_idempotent(
        layout in layout(),
        covered in line_set(),
        missing in line_set(),
    ) {
        let model = model_for(&layout);
        let facts = facts_for(&covered, &missing);
        prop_assert_eq!(aggregate_coverage(&model, &facts), aggregate_coverage(&model, &facts));
    }

    #[test]
    fn prop_priority_order_follows_score(
        layout in layout(),
        covered in line_set(),
        missing in line_set(),
    ) {
        let model = model_for(&layout);
        let tree = aggregate_coverage(&model, &facts_for(&covered, &missing));
        let config = TestgapConfig::default();

        let first = prioritize(&model, &tree, &config.priority, None);
        let second = prioritize(&model, &tree, &config.priority, None);
        prop_assert_eq!(&first, &second);

        let scores: Vec<f64> = first.iter().map(|entry| entry.score).collect();
        prop_assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn prop_mapping_ignores_test_order(
        layout in layout(),
        names in prop::collection::vec("[a-z]{1,6}", 1..6),
        rotation in 0usize..6,
    ) {
        let model = model_for(&layout);
        let config = TestgapConfig::default();
        let tests: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                test_unit(
                    &format!("test_f{}", idx),
                    &format!("tests/test_{}.py", name),
                    "import pkg.mod_a\nassert pkg.mod_a.f0() is None\n",
                )
            })
            .collect();

        let mut shuffled = tests.clone();
        shuffled.reverse();
        let len = shuffled.len();
        shuffled.rotate_left(rotation % len);

        let forward = resolve_mappings(&model, &tests, &OverrideTable::new(), &config.mapping);
        let backward = resolve_mappings(&model, &shuffled, &OverrideTable::new(), &config.mapping);
        prop_assert_eq!(forward.report, backward.report);
    }

    #[test]
    fn prop_quality_score_is_a_fraction(outcomes in prop::collection::vec(any::<bool>(), 0..20)) {
        let results: Vec<RuleResult> = outcomes
            .iter()
            .enumerate()
            .map(|(idx, passed)| RuleResult {
                rule: format!("rule-{}", idx),
                passed: *passed,
                issue: None,
            })
            .collect();

        let score = calculate_quality_score(&results);
        prop_assert!((0.0..=1.0).contains(&score));
        if results.is_empty() {
            prop_assert_eq!(score, 1.0);
        }
    }
}

#[test]
fn rule_errors_render_their_message() {
    assert_eq!(RuleError::Failed("bad input".into()).to_string(), "bad input");
}
