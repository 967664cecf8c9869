//! Module-level coverage classification.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;

use super::aggregator::CoverageTree;
use crate::structure::StructuralModel;

/// Coverage of one module as shown in summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCoverage {
    pub file: PathBuf,
    pub line_pct: f64,
    pub covered_lines: usize,
    pub total_lines: usize,
    pub uncovered_lines: Vec<usize>,
    pub measured: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub overall_pct: f64,
    pub covered_lines: usize,
    pub total_lines: usize,
    pub fully_covered: Vec<PathBuf>,
    /// Modules with no covered line or no execution facts at all.
    pub uncovered: Vec<PathBuf>,
    pub partially_covered: Vec<ModuleCoverage>,
    /// Partially covered modules below the threshold, lowest first.
    pub low_coverage: Vec<ModuleCoverage>,
    /// Uncovered modules followed by low-coverage modules.
    pub priority_files: Vec<PathBuf>,
}

/// Classify every module in `model`. Modules without executable lines are skipped.
pub fn summarize_coverage(
    model: &StructuralModel,
    tree: &CoverageTree,
    low_coverage_threshold: f64,
) -> CoverageSummary {
    let mut summary = CoverageSummary::default();

    for module in model.modules() {
        let Some(record) = tree.get(&module.id) else {
            continue;
        };
        let entry = ModuleCoverage {
            file: module.file.clone(),
            line_pct: record.line_pct,
            covered_lines: record.covered_count,
            total_lines: record.executable_lines(),
            uncovered_lines: record.missing.iter().copied().collect(),
            measured: record.measured,
        };

        if !record.measured {
            summary.uncovered.push(entry.file);
            continue;
        }
        if entry.total_lines == 0 {
            continue;
        }

        summary.covered_lines += entry.covered_lines;
        summary.total_lines += entry.total_lines;

        if record.missing_count == 0 {
            summary.fully_covered.push(entry.file);
        } else if record.covered_count == 0 {
            summary.uncovered.push(entry.file);
        } else {
            if entry.line_pct < low_coverage_threshold {
                summary.low_coverage.push(entry.clone());
            }
            summary.partially_covered.push(entry);
        }
    }

    summary.low_coverage.sort_by(|a, b| {
        a.line_pct
            .partial_cmp(&b.line_pct)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.file.cmp(&b.file))
    });

    summary.overall_pct = if summary.total_lines == 0 {
        0.0
    } else {
        summary.covered_lines as f64 / summary.total_lines as f64 * 100.0
    };

    summary.priority_files = summary
        .uncovered
        .iter()
        .cloned()
        .chain(summary.low_coverage.iter().map(|m| m.file.clone()))
        .collect();

    summary
}
