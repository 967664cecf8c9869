//! Raw execution facts as produced by the test-execution collaborator.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use crate::core::{normalize_path, LineRange};

/// Branch outcomes observed on one line (or summed over a range).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCount {
    pub taken: u32,
    pub total: u32,
}

impl BranchCount {
    pub fn new(taken: u32, total: u32) -> Self {
        Self {
            taken: taken.min(total),
            total,
        }
    }

    pub fn percentage(&self) -> f64 {
        let taken = self.taken.min(self.total);
        percentage(taken as usize, self.total.saturating_sub(taken) as usize)
    }
}

impl AddAssign for BranchCount {
    fn add_assign(&mut self, rhs: Self) {
        self.taken = self.taken.saturating_add(rhs.taken);
        self.total = self.total.saturating_add(rhs.total);
    }
}

/// `covered / (covered + missing)` as a percentage; 100 when nothing is executable.
pub fn percentage(covered: usize, missing: usize) -> f64 {
    let total = covered + missing;
    if total == 0 {
        100.0
    } else {
        covered as f64 / total as f64 * 100.0
    }
}

/// Executable-line facts for one file.
///
/// The fields are public and deserializable, so the range queries read them
/// normalized: a line in both sets is covered, and branch counts never report
/// more taken outcomes than exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileFacts {
    pub covered: BTreeSet<usize>,
    pub missing: BTreeSet<usize>,
    #[serde(default)]
    pub branches: BTreeMap<usize, BranchCount>,
}

impl FileFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a line hit count. A line hit by any record is covered.
    pub fn record_line(&mut self, line: usize, hits: u64) {
        if hits > 0 {
            self.missing.remove(&line);
            self.covered.insert(line);
        } else if !self.covered.contains(&line) {
            self.missing.insert(line);
        }
    }

    /// Record one branch outcome on `line`.
    pub fn record_branch(&mut self, line: usize, taken: bool) {
        let entry = self.branches.entry(line).or_default();
        entry.total += 1;
        if taken {
            entry.taken += 1;
        }
    }

    pub fn with_lines(
        covered: impl IntoIterator<Item = usize>,
        missing: impl IntoIterator<Item = usize>,
    ) -> Self {
        let mut facts = Self::new();
        for line in missing {
            facts.record_line(line, 0);
        }
        for line in covered {
            facts.record_line(line, 1);
        }
        facts
    }

    pub fn covered_in(&self, range: LineRange) -> impl Iterator<Item = usize> + '_ {
        self.covered.range(range.start..=range.end).copied()
    }

    pub fn missing_in(&self, range: LineRange) -> impl Iterator<Item = usize> + '_ {
        self.missing
            .range(range.start..=range.end)
            .copied()
            .filter(|line| !self.covered.contains(line))
    }

    pub fn branches_in(&self, range: LineRange) -> impl Iterator<Item = (usize, BranchCount)> + '_ {
        self.branches
            .range(range.start..=range.end)
            .map(|(line, count)| (*line, BranchCount::new(count.taken, count.total)))
    }

    pub fn executable_in(&self, range: LineRange) -> usize {
        self.covered_in(range).count() + self.missing_in(range).count()
    }

    pub fn merge(&mut self, other: FileFacts) {
        for line in other.missing {
            self.record_line(line, 0);
        }
        for line in other.covered {
            self.record_line(line, 1);
        }
        for (line, count) in other.branches {
            *self.branches.entry(line).or_default() += count;
        }
    }
}

/// Execution facts for a whole run, keyed by repository-relative path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFacts {
    files: BTreeMap<PathBuf, FileFacts>,
}

impl ExecutionFacts {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(path: &Path) -> PathBuf {
        PathBuf::from(normalize_path(path))
    }

    pub fn file(&self, path: &Path) -> Option<&FileFacts> {
        self.files.get(&Self::key(path))
    }

    pub fn file_mut(&mut self, path: &Path) -> &mut FileFacts {
        self.files.entry(Self::key(path)).or_default()
    }

    /// Insert facts for a file, merging with anything already recorded.
    pub fn insert(&mut self, path: impl AsRef<Path>, facts: FileFacts) {
        self.file_mut(path.as_ref()).merge(facts);
    }

    pub fn files(&self) -> impl Iterator<Item = (&PathBuf, &FileFacts)> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn merge(&mut self, other: ExecutionFacts) {
        for (path, facts) in other.files {
            self.insert(path, facts);
        }
    }
}
