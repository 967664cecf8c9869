//! Rules for tests that depend on other tests or on wall-clock timing.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::validation::rule::{
    Finding, RuleContext, RuleError, RuleOutcome, Severity, ValidationRule,
};

static SHARED_STATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?m)^\s*global\s+\w+",
        r"|\bstatic\s+mut\b",
        r"|@pytest\.mark\.dependency",
        r"|\bdependsOnMethods\b",
        r"|@depends\b",
        r"|@Order\(",
        r"|@FixMethodOrder",
    ))
    .expect("valid shared-state pattern")
});

static TEST_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(test_\w+|test[A-Z]\w*)\s*\(").expect("valid test-call pattern"));

static SLEEP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\b(?:time|asyncio)\.sleep\s*\(",
        r"|\bThread\.sleep\s*\(",
        r"|\b(?:std::)?thread::sleep\s*\(",
        r"|\btokio::time::sleep\s*\(",
        r"|\btime\.Sleep\s*\(",
        r"|\bsetTimeout\s*\(",
        r"|(?m)^\s*sleep\s*\(",
    ))
    .expect("valid sleep pattern")
});

const DEFINITION_KEYWORDS: [&str; 5] = ["def", "fn", "function", "func", "void"];

fn is_definition_site(source: &str, start: usize) -> bool {
    let before = source[..start].trim_end();
    DEFINITION_KEYWORDS.iter().any(|kw| {
        before.ends_with(kw)
            && before[..before.len() - kw.len()]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric() && c != '_')
    })
}

/// Names of other tests invoked from this test's body.
pub fn called_tests<'a>(source: &'a str, own_name: &str) -> Vec<&'a str> {
    TEST_CALL
        .captures_iter(source)
        .filter_map(|caps| caps.get(1))
        .filter(|m| m.as_str() != own_name && !is_definition_site(source, m.start()))
        .map(|m| m.as_str())
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct NoCrossTestDependency;

impl NoCrossTestDependency {
    pub const ID: &'static str = "no-cross-test-dependency";
}

impl ValidationRule for NoCrossTestDependency {
    fn id(&self) -> &str {
        Self::ID
    }

    fn description(&self) -> &str {
        "tests must not rely on other tests or on shared mutable state"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
        let source = ctx.source();
        let calls = called_tests(source, &ctx.test.name);

        let message = if let Some(called) = calls.first() {
            format!("Test '{}' calls another test '{}'", ctx.test.name, called)
        } else if let Some(found) = SHARED_STATE.find(source) {
            format!(
                "Test '{}' depends on shared state or ordering ({})",
                ctx.test.name,
                found.as_str().trim()
            )
        } else {
            return Ok(RuleOutcome::Pass);
        };

        Ok(RuleOutcome::Fail(Finding::new(
            "cross_test_dependency",
            Severity::Medium,
            message,
            "Give each test its own setup; share it through fixtures instead of other tests",
        )))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoSleep;

impl NoSleep {
    pub const ID: &'static str = "no-sleep";
}

impl ValidationRule for NoSleep {
    fn id(&self) -> &str {
        Self::ID
    }

    fn description(&self) -> &str {
        "tests must not wait on wall-clock time"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
        match SLEEP.find(ctx.source()) {
            None => Ok(RuleOutcome::Pass),
            Some(found) => Ok(RuleOutcome::Fail(Finding::new(
                "timing_dependency",
                Severity::Medium,
                format!(
                    "Test '{}' waits on real time ({})",
                    ctx.test.name,
                    found.as_str().trim()
                ),
                "Use mock time or freeze time libraries instead of sleep/time-based assertions",
            ))),
        }
    }
}
