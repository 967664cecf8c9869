//! Independent evidence that a test exercises a unit.
//!
//! Each signal is computed from a precomputed profile of the test and of the
//! candidate unit so the resolver can score every pair without re-parsing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use crate::config::MappingConfig;
use crate::core::{normalize_path, simple_name, TestUnit, UnitKind};
use crate::structure::UnitNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    NameCorrelation,
    DeclaredReference,
    PathProximity,
    ManualOverride,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Signal::NameCorrelation => "name correlation",
            Signal::DeclaredReference => "declared reference",
            Signal::PathProximity => "path proximity",
            Signal::ManualOverride => "manual override",
        };
        f.write_str(name)
    }
}

static PY_FROM_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*from\s+([\w.]+)\s+import\s+\(?\s*([\w\s,]+?)\s*\)?\s*$")
        .expect("valid regex")
});
static PLAIN_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*import\s+(?:static\s+)?([\w.]+(?:\s*,\s*[\w.]+)*)\s*;?\s*$")
        .expect("valid regex")
});
static RUST_USE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:pub\s+)?use\s+([\w:]+?)(?:::\{([^}]*)\})?\s*;").expect("valid regex")
});
static JS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+(?:\{([^}]*)\}|(\w+))\s+from\s+['"]([^'"]+)['"]"#)
        .expect("valid regex")
});
static JS_REQUIRE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:const|let|var)\s+(?:\{([^}]*)\}|(\w+))\s*=\s*require\(\s*['"]([^'"]+)['"]\s*\)"#)
        .expect("valid regex")
});

/// Collapse `::` and `/` separators to dots.
pub fn dotted(name: &str) -> String {
    name.replace("::", ".").replace('/', ".")
}

fn first_word(item: &str) -> Option<&str> {
    item.split_whitespace().next().filter(|w| *w != "*")
}

fn js_module_name(specifier: &str) -> String {
    let trimmed = specifier.trim_start_matches("./");
    let trimmed = trimmed.trim_start_matches("../");
    let mut segments: Vec<&str> = trimmed.split('/').filter(|s| *s != ".." && *s != ".").collect();
    if let Some(last) = segments.last_mut() {
        *last = last.split('.').next().unwrap_or(last);
    }
    segments.join(".")
}

/// Dotted names a test source imports.
pub fn extract_imports(source: &str) -> BTreeSet<String> {
    let mut imports = BTreeSet::new();

    for caps in PY_FROM_IMPORT.captures_iter(source) {
        let module = caps[1].trim_start_matches('.');
        for name in caps[2].split(',').filter_map(first_word) {
            if module.is_empty() {
                imports.insert(name.to_string());
            } else {
                imports.insert(format!("{}.{}", module, name));
            }
        }
    }

    for caps in PLAIN_IMPORT.captures_iter(source) {
        for name in caps[1].split(',') {
            imports.insert(name.trim().to_string());
        }
    }

    for caps in RUST_USE.captures_iter(source) {
        let path = caps[1]
            .trim_start_matches("crate::")
            .trim_start_matches("super::")
            .trim_start_matches("self::");
        match caps.get(2) {
            Some(group) => {
                for name in group.as_str().split(',').filter_map(first_word) {
                    imports.insert(dotted(&format!("{}::{}", path, name)));
                }
            }
            None => {
                imports.insert(dotted(path));
            }
        }
    }

    for re in [&*JS_IMPORT, &*JS_REQUIRE] {
        for caps in re.captures_iter(source) {
            let module = js_module_name(&caps[3]);
            imports.insert(module.clone());
            if let Some(names) = caps.get(1) {
                for name in names.as_str().split(',').filter_map(first_word) {
                    imports.insert(format!("{}.{}", module, name));
                }
            }
        }
    }

    imports.retain(|name| !name.is_empty());
    imports
}

fn has_marker_prefix(name: &str, marker: &str) -> bool {
    name.len() > marker.len()
        && name.as_bytes()[..marker.len()].eq_ignore_ascii_case(marker.as_bytes())
        && name.is_char_boundary(marker.len())
}

fn has_marker_suffix(name: &str, marker: &str) -> bool {
    let Some(cut) = name.len().checked_sub(marker.len()) else {
        return false;
    };
    cut > 0
        && name.as_bytes()[cut..].eq_ignore_ascii_case(marker.as_bytes())
        && name.is_char_boundary(cut)
}

/// Strip one leading and one trailing test marker.
///
/// Markers without an underscore only match on a case boundary, so
/// `testCalculate` and `CartTest` are stripped but `contest` is not.
pub fn strip_test_markers(name: &str, prefixes: &[String], suffixes: &[String]) -> String {
    let mut current = name.split('[').next().unwrap_or(name).to_string();

    let mut prefixes: Vec<&String> = prefixes.iter().collect();
    prefixes.sort_by_key(|p| std::cmp::Reverse(p.len()));
    for prefix in prefixes {
        if !has_marker_prefix(&current, prefix) {
            continue;
        }
        let rest = &current[prefix.len()..];
        let boundary = prefix.ends_with('_')
            || rest.starts_with('_')
            || rest.chars().next().is_some_and(char::is_uppercase);
        if boundary {
            current = rest.trim_start_matches('_').to_string();
            break;
        }
    }

    let mut suffixes: Vec<&String> = suffixes.iter().collect();
    suffixes.sort_by_key(|s| std::cmp::Reverse(s.len()));
    for suffix in suffixes {
        if !has_marker_suffix(&current, suffix) {
            continue;
        }
        let cut = current.len() - suffix.len();
        let marker = &current[cut..];
        let boundary = suffix.starts_with('_')
            || current[..cut].ends_with('_')
            || marker.chars().next().is_some_and(char::is_uppercase);
        if boundary {
            current = current[..cut].trim_end_matches('_').to_string();
            break;
        }
    }

    current
}

/// Lowercase and drop underscores so `calculate_total` matches `calculateTotal`.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn file_stem(segment: &str) -> &str {
    match segment.find('.') {
        Some(0) | None => segment,
        Some(idx) => &segment[..idx],
    }
}

fn is_source_root(segment: &str) -> bool {
    matches!(segment, "src" | "lib")
}

/// Path segments with source roots removed and the extension dropped.
fn implementation_path_key(path: &Path) -> Vec<String> {
    let normalized = normalize_path(path);
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
    let mut key: Vec<String> = Vec::with_capacity(segments.len());
    for (idx, segment) in segments.iter().enumerate() {
        if idx + 1 == segments.len() {
            key.push(file_stem(segment).to_lowercase());
        } else if !is_source_root(segment) {
            key.push(segment.to_lowercase());
        }
    }
    key
}

/// Like [`implementation_path_key`] but also dropping test directories and markers.
fn test_path_key(path: &Path, config: &MappingConfig) -> Vec<String> {
    let normalized = normalize_path(path);
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
    let mut key: Vec<String> = Vec::with_capacity(segments.len());
    for (idx, segment) in segments.iter().enumerate() {
        if idx + 1 == segments.len() {
            let stem = strip_test_markers(
                file_stem(segment),
                &config.test_prefixes,
                &config.test_suffixes,
            );
            key.push(stem.to_lowercase());
        } else if !is_source_root(segment) && !config.test_dirs.iter().any(|d| d == segment) {
            key.push(segment.to_lowercase());
        }
    }
    key
}

/// Everything the signals need to know about one test.
#[derive(Debug, Clone)]
pub struct TestProfile<'a> {
    pub test: &'a TestUnit,
    normalized_name: String,
    imports: BTreeSet<String>,
    hints: Vec<String>,
    path_key: Vec<String>,
}

impl<'a> TestProfile<'a> {
    pub fn new(test: &'a TestUnit, config: &MappingConfig) -> Self {
        let stripped = strip_test_markers(&test.name, &config.test_prefixes, &config.test_suffixes);
        Self {
            test,
            normalized_name: normalize_name(&stripped),
            imports: extract_imports(&test.source),
            hints: test.target_hints.iter().map(|h| dotted(h)).collect(),
            path_key: test_path_key(&test.file, config),
        }
    }

    pub fn imports(&self) -> &BTreeSet<String> {
        &self.imports
    }
}

/// Everything the signals need to know about one candidate unit.
#[derive(Debug, Clone)]
pub struct UnitProfile<'a> {
    pub node: &'a UnitNode,
    normalized_name: String,
    dotted_name: String,
    colon_name: String,
    path_key: Vec<String>,
}

impl<'a> UnitProfile<'a> {
    pub fn new(node: &'a UnitNode) -> Self {
        let dotted_name = dotted(&node.qualified_name);
        Self {
            node,
            normalized_name: normalize_name(simple_name(&node.qualified_name)),
            colon_name: dotted_name.replace('.', "::"),
            dotted_name,
            path_key: implementation_path_key(&node.file),
        }
    }

    /// Candidate kinds for mapping. The repository root is never a target.
    pub fn is_candidate(node: &UnitNode) -> bool {
        node.kind != UnitKind::Repository
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Word-bounded occurrence of `needle` that is not the tail of a longer path.
fn occurs_bounded(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(idx, _)| {
        let before_ok = haystack[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !is_ident_char(c) && c != '.' && c != ':');
        let after_ok = haystack[idx + needle.len()..]
            .chars()
            .next()
            .map_or(true, |c| !is_ident_char(c));
        before_ok && after_ok
    })
}

fn names_match(reference: &str, qualified: &str) -> bool {
    reference == qualified
        || reference.ends_with(&format!(".{}", qualified))
        || (reference.contains('.') && qualified.ends_with(&format!(".{}", reference)))
}

pub fn name_correlation(test: &TestProfile<'_>, unit: &UnitProfile<'_>) -> bool {
    unit.node.kind != UnitKind::Module
        && !test.normalized_name.is_empty()
        && test.normalized_name == unit.normalized_name
}

pub fn declared_reference(test: &TestProfile<'_>, unit: &UnitProfile<'_>) -> bool {
    if unit.dotted_name.is_empty() {
        return false;
    }
    if test.hints.iter().any(|hint| names_match(hint, &unit.dotted_name)) {
        return true;
    }
    if test.imports.iter().any(|import| names_match(import, &unit.dotted_name)) {
        return true;
    }
    // Bare single-segment names are too ambiguous to count as qualified occurrences.
    unit.dotted_name.contains('.')
        && (occurs_bounded(&test.test.source, &unit.dotted_name)
            || occurs_bounded(&test.test.source, &unit.colon_name))
}

pub fn path_proximity(test: &TestProfile<'_>, unit: &UnitProfile<'_>) -> bool {
    !test.path_key.is_empty() && test.path_key == unit.path_key
}

/// Same directory once test directories and source roots are discounted.
pub fn same_directory(test: &TestProfile<'_>, unit: &UnitProfile<'_>) -> bool {
    let test_dir = &test.path_key[..test.path_key.len().saturating_sub(1)];
    let unit_dir = &unit.path_key[..unit.path_key.len().saturating_sub(1)];
    test_dir == unit_dir
}

/// Raw score for one (test, unit) pair: capped confidence plus contributing signals.
pub fn score_pair(
    test: &TestProfile<'_>,
    unit: &UnitProfile<'_>,
    config: &MappingConfig,
) -> (f64, Vec<Signal>) {
    let mut confidence = 0.0;
    let mut signals = Vec::new();

    if name_correlation(test, unit) {
        confidence += config.name_weight;
        signals.push(Signal::NameCorrelation);
    }
    if declared_reference(test, unit) {
        confidence += config.reference_weight;
        signals.push(Signal::DeclaredReference);
    }
    if path_proximity(test, unit) {
        confidence += config.proximity_weight;
        signals.push(Signal::PathProximity);
    }

    (f64::min(confidence, 1.0), signals)
}
