//! Adapter for coverage.py JSON reports (`coverage json`).

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use super::facts::{ExecutionFacts, FileFacts};
use super::lcov::relativize;
use crate::errors::{Error, Result};

#[derive(Debug, Deserialize)]
struct CoverageReport {
    #[serde(default)]
    files: BTreeMap<String, FileReport>,
}

#[derive(Debug, Deserialize)]
struct FileReport {
    #[serde(default)]
    executed_lines: Vec<usize>,
    #[serde(default)]
    missing_lines: Vec<usize>,
    /// Arcs as `[from, to]`; negative targets are function exits.
    #[serde(default)]
    executed_branches: Vec<(i64, i64)>,
    #[serde(default)]
    missing_branches: Vec<(i64, i64)>,
}

impl FileReport {
    fn into_facts(self) -> FileFacts {
        let mut facts = FileFacts::with_lines(self.executed_lines, self.missing_lines);
        let arcs = self
            .executed_branches
            .into_iter()
            .map(|arc| (arc, true))
            .chain(self.missing_branches.into_iter().map(|arc| (arc, false)));
        for ((from, _), taken) in arcs {
            if let Ok(line) = usize::try_from(from) {
                if line > 0 {
                    facts.record_branch(line, taken);
                }
            }
        }
        facts
    }
}

pub fn parse_coverage_json_str(content: &str, root: Option<&Path>) -> Result<ExecutionFacts> {
    let report: CoverageReport = serde_json::from_str(content)?;
    let mut facts = ExecutionFacts::new();
    for (file, report) in report.files {
        facts.insert(relativize(Path::new(&file), root), report.into_facts());
    }
    debug!(files = facts.len(), "parsed coverage.py report");
    Ok(facts)
}

pub fn parse_coverage_json_file(path: &Path, root: Option<&Path>) -> Result<ExecutionFacts> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::file_system("Failed to read coverage report", path, e))?;
    parse_coverage_json_str(&content, root)
        .map_err(|e| Error::coverage_input(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::facts::BranchCount;
    use indoc::indoc;

    #[test]
    fn test_parse_report() {
        let json = indoc! {r#"
            {
              "meta": {"version": "7.4.0"},
              "files": {
                "src/billing.py": {
                  "executed_lines": [1, 2, 4],
                  "missing_lines": [5],
                  "executed_branches": [[4, 5]],
                  "missing_branches": [[4, -1]],
                  "summary": {"percent_covered": 75.0}
                }
              }
            }
        "#};

        let facts = parse_coverage_json_str(json, None).unwrap();
        let billing = facts.file(Path::new("src/billing.py")).unwrap();

        assert_eq!(billing.covered.len(), 3);
        assert!(billing.missing.contains(&5));
        assert_eq!(billing.branches[&4], BranchCount::new(1, 2));
    }

    #[test]
    fn test_lines_only_report() {
        let facts =
            parse_coverage_json_str(r#"{"files": {"/r/a.py": {"executed_lines": [3]}}}"#, Some(Path::new("/r")))
                .unwrap();
        assert!(facts.file(Path::new("a.py")).is_some());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(
            parse_coverage_json_str("{not json", None),
            Err(Error::Json(_))
        ));
    }
}
