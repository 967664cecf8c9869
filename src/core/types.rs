//! Value types shared by every analysis stage.
//!
//! These are plain data: discovered units and tests arrive from the scanning
//! collaborator in this shape and are never mutated by the engine afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::language::Language;

/// Kind of repository entity a [`UnitId`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Repository,
    Module,
    Class,
    Function,
    Method,
}

impl UnitKind {
    /// Rank in the containment order `repository > module > class > function > method`.
    ///
    /// Used to break ties between descriptors that declare identical line ranges:
    /// the higher-ranked descriptor becomes the container.
    pub fn containment_rank(self) -> u8 {
        match self {
            UnitKind::Repository => 4,
            UnitKind::Module => 3,
            UnitKind::Class => 2,
            UnitKind::Function => 1,
            UnitKind::Method => 0,
        }
    }

    /// Functions and methods are the units that hold executable bodies.
    pub fn is_callable(self) -> bool {
        matches!(self, UnitKind::Function | UnitKind::Method)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnitKind::Repository => "repository",
            UnitKind::Module => "module",
            UnitKind::Class => "class",
            UnitKind::Function => "function",
            UnitKind::Method => "method",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "repository" => Some(UnitKind::Repository),
            "module" => Some(UnitKind::Module),
            "class" => Some(UnitKind::Class),
            "function" => Some(UnitKind::Function),
            "method" => Some(UnitKind::Method),
            _ => None,
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifier of a structural unit: `<file>::<qualified name>`.
///
/// Module nodes use the bare file path and the repository root uses
/// [`UnitId::REPOSITORY`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub const REPOSITORY: &'static str = "<repository>";

    pub fn repository() -> Self {
        Self(Self::REPOSITORY.to_string())
    }

    pub fn module(file: &Path) -> Self {
        Self(normalize_path(file))
    }

    pub fn unit(file: &Path, qualified_name: &str) -> Self {
        Self(format!("{}::{}", normalize_path(file), qualified_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UnitId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a discovered test unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestId(String);

impl TestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive, 1-based line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A range is well formed when it is 1-based and not inverted.
    pub fn is_valid(&self) -> bool {
        self.start >= 1 && self.start <= self.end
    }

    pub fn len(&self) -> usize {
        if self.is_valid() {
            self.end - self.start + 1
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }

    /// `other` lies fully inside `self` (equal ranges included).
    pub fn contains(&self, other: &LineRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// `other` lies inside `self` and the two ranges differ.
    pub fn strictly_contains(&self, other: &LineRange) -> bool {
        self.contains(other) && self != other
    }

    pub fn overlaps(&self, other: &LineRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A source file known to the scanner, with its length when available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Number of lines in the file; `None` disables the file-bounds check.
    #[serde(default)]
    pub line_count: Option<usize>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, line_count: usize) -> Self {
        Self {
            path: path.into(),
            line_count: Some(line_count),
        }
    }
}

/// Flat description of one code unit as reported by the scanning collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDescriptor {
    pub kind: UnitKind,
    /// Dotted or `::`-separated name, e.g. `billing.Cart.add`.
    pub qualified_name: String,
    pub file: PathBuf,
    pub range: LineRange,
    #[serde(default)]
    pub complexity: Option<u32>,
    /// Qualified name of the intended parent, used to disambiguate identical ranges.
    #[serde(default)]
    pub parent_hint: Option<String>,
}

impl UnitDescriptor {
    pub fn new(
        kind: UnitKind,
        qualified_name: impl Into<String>,
        file: impl Into<PathBuf>,
        range: LineRange,
    ) -> Self {
        Self {
            kind,
            qualified_name: qualified_name.into(),
            file: file.into(),
            range,
            complexity: None,
            parent_hint: None,
        }
    }

    pub fn with_complexity(mut self, complexity: u32) -> Self {
        self.complexity = Some(complexity);
        self
    }

    pub fn with_parent_hint(mut self, parent: impl Into<String>) -> Self {
        self.parent_hint = Some(parent.into());
        self
    }
}

/// A discovered test entity. Re-scans replace it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestUnit {
    pub id: TestId,
    /// Bare test name, e.g. `test_calculate_total`.
    pub name: String,
    pub file: PathBuf,
    pub range: LineRange,
    pub source: String,
    /// Explicitly declared targets (annotations, docstring tags, naming tokens).
    #[serde(default)]
    pub target_hints: Vec<String>,
}

impl TestUnit {
    pub fn new(
        name: impl Into<String>,
        file: impl Into<PathBuf>,
        range: LineRange,
        source: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let file = file.into();
        Self {
            id: TestId::new(format!("{}::{}", normalize_path(&file), name)),
            name,
            file,
            range,
            source: source.into(),
            target_hints: Vec::new(),
        }
    }

    pub fn with_target_hint(mut self, hint: impl Into<String>) -> Self {
        self.target_hints.push(hint.into());
        self
    }

    pub fn language(&self) -> Language {
        Language::from_path(&self.file)
    }
}

/// Last segment of a dotted or `::`-separated qualified name.
pub fn simple_name(qualified_name: &str) -> &str {
    qualified_name
        .rsplit(|c| c == '.' || c == ':')
        .find(|segment| !segment.is_empty())
        .unwrap_or(qualified_name)
}

/// Render a path with forward slashes so identifiers are platform independent.
pub fn normalize_path(path: &Path) -> String {
    use std::path::Component;

    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| match c {
            Component::RootDir => String::new(),
            other => other.as_os_str().to_string_lossy().into_owned(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_range_containment() {
        let outer = LineRange::new(1, 20);
        let inner = LineRange::new(5, 10);

        assert!(outer.contains(&inner));
        assert!(outer.strictly_contains(&inner));
        assert!(outer.contains(&outer));
        assert!(!outer.strictly_contains(&outer));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn test_line_range_validity() {
        assert!(LineRange::new(1, 1).is_valid());
        assert!(!LineRange::new(0, 4).is_valid());
        assert!(!LineRange::new(9, 4).is_valid());
        assert_eq!(LineRange::new(9, 4).len(), 0);
        assert_eq!(LineRange::new(3, 7).len(), 5);
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let a = LineRange::new(1, 10);
        let b = LineRange::new(10, 12);
        let c = LineRange::new(11, 12);

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_simple_name_handles_both_separators() {
        assert_eq!(simple_name("billing.Cart.add"), "add");
        assert_eq!(simple_name("billing::cart::total"), "total");
        assert_eq!(simple_name("standalone"), "standalone");
    }

    #[test]
    fn test_unit_ids_are_path_qualified() {
        let id = UnitId::unit(Path::new("./src/billing.py"), "billing.calculate_total");
        assert_eq!(id.as_str(), "src/billing.py::billing.calculate_total");
        assert_eq!(UnitId::module(Path::new("src/billing.py")).as_str(), "src/billing.py");
    }

    #[test]
    fn test_kind_rank_orders_containers_first() {
        assert!(UnitKind::Class.containment_rank() > UnitKind::Function.containment_rank());
        assert!(UnitKind::Function.containment_rank() > UnitKind::Method.containment_rank());
        assert_eq!(UnitKind::parse("Method"), Some(UnitKind::Method));
        assert_eq!(UnitKind::parse("trait"), None);
    }
}
