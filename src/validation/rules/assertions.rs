use once_cell::sync::Lazy;
use regex::Regex;

use crate::validation::rule::{
    Finding, RuleContext, RuleError, RuleOutcome, Severity, ValidationRule,
};

static ASSERTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\bassert\w*!?\s*[(\s]",
        r"|\bexpect\s*\(",
        r"|\.should\b",
        r"|\b(?:EXPECT|ASSERT)_\w+\s*\(",
        r"|\bt\.(?:Error|Errorf|Fatal|Fatalf|Fail|FailNow)\s*\(",
        r"|\bpytest\.raises\b",
        r"|\bself\.fail\s*\(",
        r"|\bverify\s*\(",
    ))
    .expect("valid assertion pattern")
});

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#') || trimmed.starts_with("//") || trimmed.starts_with("/*")
}

pub fn is_assertion_line(line: &str) -> bool {
    !is_comment(line) && ASSERTION.is_match(line)
}

/// Number of source lines carrying at least one assertion.
pub fn count_assertions(source: &str) -> usize {
    source.lines().filter(|line| is_assertion_line(line)).count()
}

/// Fails tests with fewer assertion lines than the configured minimum.
#[derive(Debug, Clone)]
pub struct MinimumAssertions {
    min: usize,
}

impl MinimumAssertions {
    pub const ID: &'static str = "minimum-assertions";

    pub fn new(min: usize) -> Self {
        Self { min }
    }
}

impl ValidationRule for MinimumAssertions {
    fn id(&self) -> &str {
        Self::ID
    }

    fn description(&self) -> &str {
        "tests must verify behavior with assertions"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
        let found = count_assertions(ctx.source());
        if found >= self.min {
            return Ok(RuleOutcome::Pass);
        }

        let severity = if found == 0 {
            Severity::High
        } else {
            Severity::Medium
        };
        Ok(RuleOutcome::Fail(Finding::new(
            "insufficient_assertions",
            severity,
            format!(
                "Test '{}' has {} assertion(s), at least {} required",
                ctx.test.name, found, self.min
            ),
            "Add assertions that verify the result of the code under test",
        )))
    }
}
