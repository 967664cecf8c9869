//! Rules about the shape of a test: definitions, imports, async use and
//! arrange/act/assert ordering.

use once_cell::sync::Lazy;
use regex::Regex;

use super::assertions::is_assertion_line;
use crate::core::Language;
use crate::frameworks::has_test_definition;
use crate::validation::rule::{
    Finding, RuleContext, RuleError, RuleOutcome, Severity, ValidationRule,
};

static ASYNC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\basync\b").expect("valid async pattern"));
static AWAIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bawait\b").expect("valid await pattern"));

static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:import\s|from\s+\S+\s+import\s|package\s|use\s|#include\s)|\brequire\s*\(")
        .expect("valid import pattern")
});

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s*(?:@|#\[",
        r"|(?:pub\s+)?(?:async\s+)?(?:def|fn|func|function)\b",
        r"|(?:public\s+|private\s+)?void\s",
        r"|(?:describe|it|test|context)\b",
        r"|class\s",
        r"|TEST(?:_F|_P)?\()",
    ))
    .expect("valid header pattern")
});

#[derive(Debug, Clone, Default)]
pub struct AsyncWithoutAwait;

impl AsyncWithoutAwait {
    pub const ID: &'static str = "async-without-await";
}

impl ValidationRule for AsyncWithoutAwait {
    fn id(&self) -> &str {
        Self::ID
    }

    fn description(&self) -> &str {
        "async tests must await the code under test"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
        let source = ctx.source();
        if !ASYNC.is_match(source) || AWAIT.is_match(source) {
            return Ok(RuleOutcome::Pass);
        }
        Ok(RuleOutcome::Fail(Finding::new(
            "async_without_await",
            Severity::Medium,
            format!("Test '{}' is async but never awaits", ctx.test.name),
            "Await the asynchronous call under test, or make the test synchronous",
        )))
    }
}

/// Flags tests that keep alternating between acting and asserting.
#[derive(Debug, Clone)]
pub struct ArrangeActAssert {
    max_transitions: usize,
}

impl Default for ArrangeActAssert {
    fn default() -> Self {
        Self { max_transitions: 1 }
    }
}

impl ArrangeActAssert {
    pub const ID: &'static str = "arrange-act-assert";

    pub fn new(max_transitions: usize) -> Self {
        Self { max_transitions }
    }
}

fn is_statement(line: &str) -> bool {
    let trimmed = line.trim();
    !(trimmed.is_empty()
        || trimmed.starts_with('#') && !trimmed.starts_with("#[")
        || trimmed.starts_with("//")
        || matches!(trimmed, "{" | "}" | "});" | "})" | ")" | "end" | "pass"))
}

/// Count the times an assertion block is followed by further actions.
pub fn assert_to_act_transitions(source: &str) -> usize {
    let mut transitions = 0;
    let mut in_assertions = false;

    for line in source.lines().filter(|line| is_statement(line)) {
        if HEADER.is_match(line) {
            continue;
        }
        if is_assertion_line(line) {
            in_assertions = true;
        } else if in_assertions {
            transitions += 1;
            in_assertions = false;
        }
    }
    transitions
}

impl ValidationRule for ArrangeActAssert {
    fn id(&self) -> &str {
        Self::ID
    }

    fn description(&self) -> &str {
        "tests should arrange, act, then assert"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
        let transitions = assert_to_act_transitions(ctx.source());
        if transitions <= self.max_transitions {
            return Ok(RuleOutcome::Pass);
        }
        Ok(RuleOutcome::Fail(Finding::new(
            "interleaved_assertions",
            Severity::Low,
            format!(
                "Test '{}' returns to acting after assertions {} times",
                ctx.test.name, transitions
            ),
            "Split the test so each one arranges, acts once, then asserts",
        )))
    }
}

/// Whole-file test sources in import-based languages must import something.
///
/// Test units that start past line 1 are fragments of a larger file and pass.
#[derive(Debug, Clone, Default)]
pub struct DeclaresImports;

impl DeclaresImports {
    pub const ID: &'static str = "declares-imports";
}

impl ValidationRule for DeclaresImports {
    fn id(&self) -> &str {
        Self::ID
    }

    fn description(&self) -> &str {
        "standalone test files must import the code under test"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
        let applies = ctx.test.range.start == 1
            && (ctx.language.is_js_family()
                || matches!(ctx.language, Language::Python | Language::Java | Language::Go));
        if !applies || IMPORT.is_match(ctx.source()) {
            return Ok(RuleOutcome::Pass);
        }
        Ok(RuleOutcome::Fail(Finding::new(
            "missing_imports",
            Severity::Medium,
            format!("Test file for '{}' declares no imports", ctx.test.name),
            "Add necessary imports for the code being tested",
        )))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DefinesTest;

impl DefinesTest {
    pub const ID: &'static str = "defines-test";
}

impl ValidationRule for DefinesTest {
    fn id(&self) -> &str {
        Self::ID
    }

    fn description(&self) -> &str {
        "test sources must declare a recognizable test"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
        if has_test_definition(ctx.source(), ctx.language) {
            return Ok(RuleOutcome::Pass);
        }
        Ok(RuleOutcome::Fail(Finding::new(
            "no_test_definitions",
            Severity::High,
            format!("No test functions or blocks found in '{}'", ctx.test.name),
            "Name test functions with the framework's test prefix or wrap them in test blocks",
        )))
    }
}
