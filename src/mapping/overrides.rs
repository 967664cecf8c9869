//! User-provided test → unit mappings.
//!
//! Overrides live outside any single analysis run. They are only mutated
//! through `&mut self`, so the owner serializes changes; analysis workers get
//! a shared reference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::{TestId, UnitId};
use crate::diagnostics::Diagnostic;
use crate::errors::{Error, Result};
use crate::structure::StructuralModel;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideTable {
    #[serde(default)]
    entries: BTreeMap<TestId, UnitId>,
}

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `test` to `unit`, returning the mapping it replaced.
    ///
    /// A unit missing from `model` is rejected with `InvalidOverride` and the
    /// table is left untouched.
    pub fn add(
        &mut self,
        test: TestId,
        unit: UnitId,
        model: &StructuralModel,
    ) -> std::result::Result<Option<UnitId>, Diagnostic> {
        if !model.contains(&unit) || unit.as_str() == UnitId::REPOSITORY {
            let diagnostic = Diagnostic::InvalidOverride { test, unit };
            tracing::warn!(code = diagnostic.code(), "{}", diagnostic);
            return Err(diagnostic);
        }
        Ok(self.entries.insert(test, unit))
    }

    pub fn remove(&mut self, test: &TestId) -> Option<UnitId> {
        self.entries.remove(test)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, test: &TestId) -> Option<&UnitId> {
        self.entries.get(test)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TestId, &UnitId)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system("Failed to read override table", path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Like [`OverrideTable::load`], but a missing file yields an empty table.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| Error::file_system("Failed to write override table", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LineRange, SourceFile, UnitDescriptor, UnitKind};
    use crate::structure::build_structural_model;
    use tempfile::TempDir;

    fn model() -> StructuralModel {
        build_structural_model(
            &[SourceFile::new("billing.py", 20)],
            &[UnitDescriptor::new(
                UnitKind::Function,
                "billing.calculate_total",
                "billing.py",
                LineRange::new(1, 10),
            )],
        )
        .model
    }

    fn unit() -> UnitId {
        UnitId::unit(Path::new("billing.py"), "billing.calculate_total")
    }

    #[test]
    fn test_add_and_replace() {
        let model = model();
        let mut table = OverrideTable::new();
        let test = TestId::from("tests/test_x.py::test_x");

        assert_eq!(table.add(test.clone(), unit(), &model), Ok(None));
        assert_eq!(
            table.add(test.clone(), UnitId::from("billing.py"), &model),
            Ok(Some(unit()))
        );
        assert_eq!(table.get(&test), Some(&UnitId::from("billing.py")));
    }

    #[test]
    fn test_invalid_override_leaves_state_unchanged() {
        let model = model();
        let mut table = OverrideTable::new();
        let test = TestId::from("t");
        table.add(test.clone(), unit(), &model).unwrap();

        let result = table.add(test.clone(), UnitId::from("billing.py::missing"), &model);

        assert!(matches!(result, Err(Diagnostic::InvalidOverride { .. })));
        assert_eq!(table.get(&test), Some(&unit()));
        assert!(table.add(TestId::from("u"), UnitId::repository(), &model).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let model = model();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("overrides.json");

        let mut table = OverrideTable::new();
        table.add(TestId::from("t"), unit(), &model).unwrap();
        table.save(&path).unwrap();

        assert_eq!(OverrideTable::load(&path).unwrap(), table);
        assert!(OverrideTable::load_or_default(&dir.path().join("none.json"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let model = model();
        let mut table = OverrideTable::new();
        table.add(TestId::from("a"), unit(), &model).unwrap();
        table.add(TestId::from("b"), unit(), &model).unwrap();

        assert_eq!(table.remove(&TestId::from("a")), Some(unit()));
        assert_eq!(table.len(), 1);
        table.clear();
        assert!(table.is_empty());
    }
}
