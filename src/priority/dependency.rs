//! Optional fan-in / fan-out data from a dependency collaborator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::UnitId;

/// Source of call-graph degree per unit.
///
/// Implementations must be safe to query from several scoring threads.
pub trait DependencyProvider: Send + Sync {
    /// `(fan_in, fan_out)` for `unit`, or `None` when the unit is unknown.
    fn degree(&self, unit: &UnitId) -> Option<(usize, usize)>;
}

/// In-memory provider keyed by unit identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyMap {
    degrees: BTreeMap<UnitId, (usize, usize)>,
}

impl DependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: UnitId, fan_in: usize, fan_out: usize) {
        self.degrees.insert(unit, (fan_in, fan_out));
    }

    pub fn len(&self) -> usize {
        self.degrees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.degrees.is_empty()
    }
}

impl FromIterator<(UnitId, (usize, usize))> for DependencyMap {
    fn from_iter<I: IntoIterator<Item = (UnitId, (usize, usize))>>(iter: I) -> Self {
        Self {
            degrees: iter.into_iter().collect(),
        }
    }
}

impl DependencyProvider for DependencyMap {
    fn degree(&self, unit: &UnitId) -> Option<(usize, usize)> {
        self.degrees.get(unit).copied()
    }
}
