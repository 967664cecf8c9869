use chrono::Utc;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::comparison::types::*;
use crate::engine::AnalysisSnapshot;
use crate::errors::{Error, Result};

/// Coverage changes at or below this many percentage points are noise.
pub const SIGNIFICANT_CHANGE: f64 = 0.01;

impl RunSummary {
    /// Summarize `snapshot`. `generated_tests` counts the tests that came
    /// from the generative collaborator during the run.
    pub fn from_snapshot(snapshot: &AnalysisSnapshot, generated_tests: usize) -> Self {
        let module_coverage = snapshot
            .model
            .modules()
            .filter_map(|module| {
                let record = snapshot.coverage.get(&module.id)?;
                (record.measured && record.executable_lines() > 0)
                    .then(|| (module.file.clone(), record.line_pct))
            })
            .collect();

        Self {
            repository: snapshot.repository.clone(),
            timestamp: Utc::now(),
            overall_coverage: snapshot.coverage_summary.overall_pct,
            module_coverage,
            uncovered_modules: snapshot.coverage_summary.uncovered.clone(),
            generated_tests,
            validated_tests: snapshot.validation.tests.len(),
            validation_success_rate: snapshot.validation.success_rate,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system("Failed to read run summary", path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| Error::file_system("Failed to write run summary", path, e))
    }
}

pub struct Comparator<'a> {
    before: &'a RunSummary,
    after: &'a RunSummary,
}

impl<'a> Comparator<'a> {
    pub fn new(before: &'a RunSummary, after: &'a RunSummary) -> Self {
        Self { before, after }
    }

    pub fn compare(&self) -> RunComparison {
        RunComparison {
            metadata: self.build_metadata(),
            overall_change: self.after.overall_coverage - self.before.overall_coverage,
            module_changes: self.module_changes(),
            newly_covered: difference(&self.before.uncovered_modules, &self.after.uncovered_modules),
            newly_uncovered: difference(&self.after.uncovered_modules, &self.before.uncovered_modules),
        }
    }

    /// Modules present in both runs whose coverage moved significantly.
    fn module_changes(&self) -> Vec<ModuleChange> {
        self.after
            .module_coverage
            .iter()
            .filter_map(|(file, &after)| {
                let before = *self.before.module_coverage.get(file)?;
                let delta = after - before;
                (delta.abs() > SIGNIFICANT_CHANGE).then(|| ModuleChange {
                    file: file.clone(),
                    before,
                    after,
                    delta,
                    direction: if delta > 0.0 {
                        ChangeDirection::Improved
                    } else {
                        ChangeDirection::Regressed
                    },
                })
            })
            .collect()
    }

    fn build_metadata(&self) -> ComparisonMetadata {
        ComparisonMetadata {
            before: self.before.timestamp,
            after: self.after.timestamp,
            comparison_date: Utc::now().to_rfc3339(),
        }
    }
}

/// Entries of `left` missing from `right`, in `left` order.
fn difference(left: &[PathBuf], right: &[PathBuf]) -> Vec<PathBuf> {
    let right: BTreeSet<&PathBuf> = right.iter().collect();
    left.iter()
        .filter(|path| !right.contains(path))
        .cloned()
        .collect()
}

pub fn compare_runs(before: &RunSummary, after: &RunSummary) -> RunComparison {
    Comparator::new(before, after).compare()
}
