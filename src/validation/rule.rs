//! The rule contract.
//!
//! A rule is any `Send + Sync` value that maps a test unit's source text (and
//! optional context) to a pass/fail outcome. Rules must not mutate shared
//! state: the evaluator runs many (rule, test) pairs concurrently.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::{Language, TestId, TestUnit, UnitId};
use crate::frameworks::TestFramework;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        })
    }
}

/// What a failing rule reports, before it is attributed to a test and rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub issue_type: String,
    pub severity: Severity,
    pub message: String,
    pub recommendation: String,
}

impl Finding {
    pub fn new(
        issue_type: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            issue_type: issue_type.into(),
            severity,
            message: message.into(),
            recommendation: recommendation.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Pass,
    Fail(Finding),
}

impl RuleOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, RuleOutcome::Pass)
    }
}

/// A populated issue attributed to one test and one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub test: TestId,
    pub rule: String,
    pub issue_type: String,
    pub severity: Severity,
    pub message: String,
    pub recommendation: String,
}

impl ValidationIssue {
    pub fn from_finding(test: &TestId, rule: &str, finding: Finding) -> Self {
        Self {
            test: test.clone(),
            rule: rule.to_string(),
            issue_type: finding.issue_type,
            severity: finding.severity,
            message: finding.message,
            recommendation: finding.recommendation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("{0}")]
    Failed(String),
    #[error("rule panicked: {0}")]
    Panicked(String),
}

/// Inputs handed to every rule.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub test: &'a TestUnit,
    pub language: Language,
    pub framework: TestFramework,
    /// Implementation unit the test was mapped to, when known.
    pub target: Option<&'a UnitId>,
}

impl<'a> RuleContext<'a> {
    pub fn new(test: &'a TestUnit, framework: TestFramework, target: Option<&'a UnitId>) -> Self {
        Self {
            test,
            language: test.language(),
            framework,
            target,
        }
    }

    pub fn source(&self) -> &'a str {
        &self.test.source
    }
}

pub trait ValidationRule: Send + Sync {
    /// Stable identifier used for registration, disabling and reporting.
    fn id(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError>;
}

/// Adapts a closure to [`ValidationRule`].
pub struct FnRule<F> {
    id: String,
    evaluate: F,
}

impl<F> FnRule<F>
where
    F: Fn(&RuleContext<'_>) -> Result<RuleOutcome, RuleError> + Send + Sync,
{
    pub fn new(id: impl Into<String>, evaluate: F) -> Self {
        Self {
            id: id.into(),
            evaluate,
        }
    }
}

impl<F> ValidationRule for FnRule<F>
where
    F: Fn(&RuleContext<'_>) -> Result<RuleOutcome, RuleError> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
        (self.evaluate)(ctx)
    }
}

impl<F> fmt::Debug for FnRule<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRule").field("id", &self.id).finish()
    }
}
