use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Condensed result of one run, kept between runs for comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub repository: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub overall_coverage: f64,
    /// Line coverage per measured module with executable lines.
    pub module_coverage: BTreeMap<PathBuf, f64>,
    pub uncovered_modules: Vec<PathBuf>,
    pub generated_tests: usize,
    pub validated_tests: usize,
    /// Fraction of validated tests that passed every rule.
    pub validation_success_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Improved,
    Regressed,
}

/// A module whose coverage moved by more than the significance threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleChange {
    pub file: PathBuf,
    pub before: f64,
    pub after: f64,
    pub delta: f64,
    pub direction: ChangeDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMetadata {
    pub before: DateTime<Utc>,
    pub after: DateTime<Utc>,
    pub comparison_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunComparison {
    pub metadata: ComparisonMetadata,
    pub overall_change: f64,
    pub module_changes: Vec<ModuleChange>,
    pub newly_covered: Vec<PathBuf>,
    pub newly_uncovered: Vec<PathBuf>,
}

impl RunComparison {
    pub fn improvements(&self) -> impl Iterator<Item = &ModuleChange> {
        self.module_changes
            .iter()
            .filter(|change| change.direction == ChangeDirection::Improved)
    }

    pub fn regressions(&self) -> impl Iterator<Item = &ModuleChange> {
        self.module_changes
            .iter()
            .filter(|change| change.direction == ChangeDirection::Regressed)
    }
}
