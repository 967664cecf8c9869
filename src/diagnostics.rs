//! Per-run anomaly records.
//!
//! Nothing inside an analysis run is fatal. Every anomaly a stage detects is
//! collected here and returned alongside the (possibly partial) output so the
//! caller can decide whether accumulated diagnostics constitute a failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::core::{LineRange, TestId, UnitId};

/// The taxonomy of recoverable anomalies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A unit descriptor was rejected; the rest of the build proceeds.
    MalformedUnit {
        file: PathBuf,
        qualified_name: String,
        range: LineRange,
        reason: String,
    },
    /// Two descriptors could not be nested unambiguously; the later one was dropped.
    StructuralConflict {
        file: PathBuf,
        kept: String,
        dropped: String,
        reason: String,
    },
    /// A test unit produced no mapping candidate.
    UnmappedTest { test: TestId },
    /// A validation rule failed internally for one test unit.
    RuleEvaluationError {
        test: TestId,
        rule: String,
        message: String,
    },
    /// A manual override names a unit that does not exist in the structural model.
    InvalidOverride { test: TestId, unit: UnitId },
}

impl Diagnostic {
    pub fn code(&self) -> &'static str {
        match self {
            Diagnostic::MalformedUnit { .. } => "MalformedUnit",
            Diagnostic::StructuralConflict { .. } => "StructuralConflict",
            Diagnostic::UnmappedTest { .. } => "UnmappedTest",
            Diagnostic::RuleEvaluationError { .. } => "RuleEvaluationError",
            Diagnostic::InvalidOverride { .. } => "InvalidOverride",
        }
    }

    /// `UnmappedTest` is a report, not a problem with the inputs.
    pub fn is_warning(&self) -> bool {
        !matches!(self, Diagnostic::UnmappedTest { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MalformedUnit {
                file,
                qualified_name,
                range,
                reason,
            } => write!(
                f,
                "malformed unit {} ({}, lines {}): {}",
                qualified_name,
                file.display(),
                range,
                reason
            ),
            Diagnostic::StructuralConflict {
                file,
                kept,
                dropped,
                reason,
            } => write!(
                f,
                "structural conflict in {}: kept {}, dropped {} ({})",
                file.display(),
                kept,
                dropped,
                reason
            ),
            Diagnostic::UnmappedTest { test } => write!(f, "test {} has no mapping candidate", test),
            Diagnostic::RuleEvaluationError {
                test,
                rule,
                message,
            } => write!(f, "rule {} failed on {}: {}", rule, test, message),
            Diagnostic::InvalidOverride { test, unit } => write!(
                f,
                "override for {} references unknown unit {}",
                test, unit
            ),
        }
    }
}

impl std::error::Error for Diagnostic {}

/// Ordered collection of diagnostics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and mirror it to the tracing subscriber.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_warning() {
            tracing::warn!(code = diagnostic.code(), "{}", diagnostic);
        } else {
            tracing::debug!(code = diagnostic.code(), "{}", diagnostic);
        }
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_of(&self, code: &str) -> usize {
        self.entries.iter().filter(|d| d.code() == code).count()
    }

    pub fn has_warnings(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_warning)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
