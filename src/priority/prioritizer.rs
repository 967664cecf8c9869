//! Testing-urgency ranking.
//!
//! ```text
//! score = (1 - line_pct / 100) * complexity_weight + dependency_weight
//! ```
//!
//! `complexity_weight` is the unit's complexity divided by the largest
//! complexity among ranked units. `dependency_weight` scales the unit's
//! `fan_in + fan_out` against the largest degree in the run and is zero when no
//! [`DependencyProvider`] is supplied.
//!
//! The resulting list is a total order: score descending, then complexity
//! descending, then qualified name and identifier ascending. Truncating it
//! for display never requires recomputation.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

use super::dependency::DependencyProvider;
use crate::config::PriorityConfig;
use crate::core::{UnitId, UnitKind};
use crate::coverage::{CoverageRecord, CoverageTree};
use crate::structure::{StructuralModel, UnitNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    CoverageDeficit,
    Complexity,
    Dependency,
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FactorKind::CoverageDeficit => "coverage deficit",
            FactorKind::Complexity => "complexity",
            FactorKind::Dependency => "dependency",
        })
    }
}

/// One normalized input to a priority score, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityFactor {
    pub kind: FactorKind,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityScore {
    pub unit: UnitId,
    pub kind: UnitKind,
    pub qualified_name: String,
    pub file: PathBuf,
    pub score: f64,
    pub complexity: u32,
    pub line_pct: f64,
    /// Largest factor first.
    pub factors: Vec<PriorityFactor>,
}

impl PriorityScore {
    pub fn factor(&self, kind: FactorKind) -> Option<f64> {
        self.factors.iter().find(|f| f.kind == kind).map(|f| f.value)
    }
}

/// Priority-ordered implementation units for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityList {
    entries: Vec<PriorityScore>,
}

impl PriorityList {
    pub fn top(&self, n: usize) -> &[PriorityScore] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriorityScore> {
        self.entries.iter()
    }

    pub fn get(&self, unit: &UnitId) -> Option<&PriorityScore> {
        self.entries.iter().find(|entry| &entry.unit == unit)
    }

    pub fn rank_of(&self, unit: &UnitId) -> Option<usize> {
        self.entries.iter().position(|entry| &entry.unit == unit)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<PriorityScore> {
        self.entries
    }
}

pub fn priority_order(a: &PriorityScore, b: &PriorityScore) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.complexity.cmp(&a.complexity))
        .then_with(|| a.qualified_name.cmp(&b.qualified_name))
        .then_with(|| a.unit.cmp(&b.unit))
}

fn ranked_units<'m>(
    model: &'m StructuralModel,
    tree: &'m CoverageTree,
    config: &PriorityConfig,
) -> Vec<(&'m UnitNode, &'m CoverageRecord)> {
    model
        .implementation_units()
        .filter(|node| config.kinds.contains(&node.kind))
        .filter_map(|node| tree.get(&node.id).map(|record| (node, record)))
        .collect()
}

pub fn prioritize(
    model: &StructuralModel,
    tree: &CoverageTree,
    config: &PriorityConfig,
    dependencies: Option<&dyn DependencyProvider>,
) -> PriorityList {
    let units = ranked_units(model, tree, config);

    let max_complexity = units.iter().map(|(node, _)| node.complexity).max().unwrap_or(0);
    let degrees: Vec<Option<usize>> = units
        .iter()
        .map(|(node, _)| {
            dependencies
                .and_then(|provider| provider.degree(&node.id))
                .map(|(fan_in, fan_out)| fan_in.saturating_add(fan_out))
        })
        .collect();
    let max_degree = degrees.iter().flatten().copied().max().unwrap_or(0);

    let mut entries: Vec<PriorityScore> = units
        .iter()
        .zip(&degrees)
        .map(|((node, record), degree)| {
            let deficit = (1.0 - record.line_pct / 100.0).clamp(0.0, 1.0);
            let complexity_weight = if max_complexity == 0 {
                0.0
            } else {
                node.complexity as f64 / max_complexity as f64
            };

            let mut factors = vec![
                PriorityFactor {
                    kind: FactorKind::CoverageDeficit,
                    value: deficit,
                },
                PriorityFactor {
                    kind: FactorKind::Complexity,
                    value: complexity_weight,
                },
            ];

            let dependency_weight = match (dependencies, degree) {
                (Some(_), Some(degree)) if max_degree > 0 => {
                    let weight = config.dependency_weight * (*degree as f64 / max_degree as f64);
                    factors.push(PriorityFactor {
                        kind: FactorKind::Dependency,
                        value: weight,
                    });
                    weight
                }
                _ => 0.0,
            };

            factors.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.kind.cmp(&b.kind)));

            PriorityScore {
                unit: node.id.clone(),
                kind: node.kind,
                qualified_name: node.qualified_name.clone(),
                file: node.file.clone(),
                score: deficit * complexity_weight + dependency_weight,
                complexity: node.complexity,
                line_pct: record.line_pct,
                factors,
            }
        })
        .collect();

    entries.sort_by(priority_order);
    debug!(
        ranked = entries.len(),
        max_complexity,
        with_dependencies = dependencies.is_some(),
        "prioritized units"
    );
    PriorityList { entries }
}
