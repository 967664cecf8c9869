//! Bottom-up coverage aggregation over the structural tree.
//!
//! Leaves intersect the raw per-file facts with their line range. Containers
//! take the union of their children's records plus the facts inside their own
//! range that no child claims (class bodies, module top-level statements).
//! Modules are folded in parallel; the repository root is rolled up last.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, debug_span};

use super::facts::{percentage, BranchCount, ExecutionFacts, FileFacts};
use crate::cancel::CancellationToken;
use crate::core::{LineRange, UnitId, UnitKind};
use crate::structure::{StructuralModel, UnitNode};

/// Derived coverage for one structural node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRecord {
    pub unit: UnitId,
    pub kind: UnitKind,
    pub owning_class: Option<String>,
    /// Covered line numbers. Empty for the repository, whose lines span files.
    pub covered: BTreeSet<usize>,
    /// Missing line numbers. Empty for the repository, whose lines span files.
    pub missing: BTreeSet<usize>,
    pub covered_count: usize,
    pub missing_count: usize,
    pub branches: BranchCount,
    pub line_pct: f64,
    pub branch_pct: f64,
    /// Complexity-weighted mean of the children's line percentages.
    pub weighted_pct: f64,
    /// False when the file had no execution facts at all.
    pub measured: bool,
}

impl CoverageRecord {
    pub fn executable_lines(&self) -> usize {
        self.covered_count + self.missing_count
    }

    pub fn is_fully_covered(&self) -> bool {
        self.measured && self.missing_count == 0
    }

    fn unmeasured(node: &UnitNode) -> Self {
        Self {
            unit: node.id.clone(),
            kind: node.kind,
            owning_class: node.owning_class.clone(),
            covered: BTreeSet::new(),
            missing: BTreeSet::new(),
            covered_count: 0,
            missing_count: 0,
            branches: BranchCount::default(),
            line_pct: 0.0,
            branch_pct: 0.0,
            weighted_pct: 0.0,
            measured: false,
        }
    }
}

/// Coverage records for every node reached by one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageTree {
    records: BTreeMap<UnitId, CoverageRecord>,
    /// False when cancellation skipped some modules.
    pub complete: bool,
}

impl CoverageTree {
    pub fn get(&self, id: &UnitId) -> Option<&CoverageRecord> {
        self.records.get(id)
    }

    pub fn line_pct(&self, id: &UnitId) -> Option<f64> {
        self.records.get(id).map(|r| r.line_pct)
    }

    pub fn weighted_pct(&self, id: &UnitId) -> Option<f64> {
        self.records.get(id).map(|r| r.weighted_pct)
    }

    pub fn records(&self) -> impl Iterator<Item = &CoverageRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn aggregate_coverage(model: &StructuralModel, facts: &ExecutionFacts) -> CoverageTree {
    aggregate_coverage_with_cancel(model, facts, &CancellationToken::new())
}

pub fn aggregate_coverage_with_cancel(
    model: &StructuralModel,
    facts: &ExecutionFacts,
    cancel: &CancellationToken,
) -> CoverageTree {
    let _span = debug_span!("coverage_aggregation", files = facts.len()).entered();

    let modules: Vec<&UnitNode> = model.modules().collect();
    let per_module: Vec<Vec<CoverageRecord>> = modules
        .par_iter()
        .filter(|_| !cancel.is_cancelled())
        .map(|module| aggregate_module(model, module, facts.file(&module.file)))
        .collect();

    let complete = per_module.len() == modules.len();
    let mut records: BTreeMap<UnitId, CoverageRecord> = per_module
        .into_iter()
        .flatten()
        .map(|record| (record.unit.clone(), record))
        .collect();

    let root = roll_up_repository(model, &records);
    records.insert(root.unit.clone(), root);

    let ignored = facts
        .files()
        .filter(|(path, _)| model.module_for(path).is_none())
        .count();
    if ignored > 0 {
        debug!(ignored, "execution facts for files outside the structural model ignored");
    }

    CoverageTree { records, complete }
}

fn aggregate_module(
    model: &StructuralModel,
    module: &UnitNode,
    facts: Option<&FileFacts>,
) -> Vec<CoverageRecord> {
    let order = model.post_order(&module.id);

    let Some(facts) = facts else {
        return order
            .iter()
            .filter_map(|id| model.get(id))
            .map(CoverageRecord::unmeasured)
            .collect();
    };

    let mut done: HashMap<UnitId, CoverageRecord> = HashMap::with_capacity(order.len());
    for id in &order {
        let Some(node) = model.get(id) else {
            continue;
        };
        let children: Vec<(&UnitNode, &CoverageRecord)> = model
            .children(id)
            .filter_map(|child| done.get(&child.id).map(|record| (child, record)))
            .collect();
        let record = aggregate_node(node, &children, facts);
        done.insert(id.clone(), record);
    }

    order
        .into_iter()
        .filter_map(|id| done.remove(&id))
        .collect()
}

fn aggregate_node(
    node: &UnitNode,
    children: &[(&UnitNode, &CoverageRecord)],
    facts: &FileFacts,
) -> CoverageRecord {
    let child_ranges: Vec<LineRange> = children.iter().map(|(child, _)| child.range).collect();
    let own = |line: &usize| !in_any(&child_ranges, *line);

    let mut covered: BTreeSet<usize> = facts.covered_in(node.range).filter(own).collect();
    let mut missing: BTreeSet<usize> = facts.missing_in(node.range).filter(own).collect();
    let mut branches = BranchCount::default();
    for (line, count) in facts.branches_in(node.range) {
        if own(&line) {
            branches += count;
        }
    }

    for (_, record) in children {
        covered.extend(record.covered.iter().copied());
        missing.extend(record.missing.iter().copied());
        branches += record.branches;
    }

    let line_pct = percentage(covered.len(), missing.len());
    let weighted_pct = weighted_percentage(children).unwrap_or(line_pct);

    CoverageRecord {
        unit: node.id.clone(),
        kind: node.kind,
        owning_class: node.owning_class.clone(),
        covered_count: covered.len(),
        missing_count: missing.len(),
        covered,
        missing,
        branches,
        line_pct,
        branch_pct: branches.percentage(),
        weighted_pct,
        measured: true,
    }
}

/// `Σ(child.line_pct × child.complexity) / Σ(child.complexity)`; `None` for
/// leaves and for children whose complexities sum to zero.
fn weighted_percentage(children: &[(&UnitNode, &CoverageRecord)]) -> Option<f64> {
    let total: u64 = children.iter().map(|(node, _)| node.complexity as u64).sum();
    if total == 0 {
        return None;
    }
    let weighted: f64 = children
        .iter()
        .map(|(node, record)| record.line_pct * node.complexity as f64)
        .sum();
    Some(weighted / total as f64)
}

/// Children are sorted and disjoint, so a binary search on start lines suffices.
fn in_any(ranges: &[LineRange], line: usize) -> bool {
    let idx = ranges.partition_point(|range| range.start <= line);
    idx > 0 && ranges[idx - 1].contains_line(line)
}

fn roll_up_repository(
    model: &StructuralModel,
    records: &BTreeMap<UnitId, CoverageRecord>,
) -> CoverageRecord {
    let root = model.root();
    let modules: Vec<(&UnitNode, &CoverageRecord)> = model
        .children(&root.id)
        .filter_map(|module| records.get(&module.id).map(|record| (module, record)))
        .collect();

    let mut record = CoverageRecord::unmeasured(root);
    for (_, module) in &modules {
        record.covered_count += module.covered_count;
        record.missing_count += module.missing_count;
        record.branches += module.branches;
        record.measured |= module.measured;
    }

    if record.measured {
        record.line_pct = percentage(record.covered_count, record.missing_count);
        record.branch_pct = record.branches.percentage();
        record.weighted_pct = weighted_percentage(&modules).unwrap_or(record.line_pct);
    } else if modules.is_empty() {
        record.line_pct = 100.0;
        record.branch_pct = 100.0;
        record.weighted_pct = 100.0;
    }
    record
}
