use serde::{Deserialize, Serialize};

use super::sections::{CoverageConfig, MappingConfig, PriorityConfig, ValidationConfig};

/// Root configuration structure for testgap
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TestgapConfig {
    /// Test-to-implementation mapping signals
    #[serde(default)]
    pub mapping: MappingConfig,

    /// Coverage reporting thresholds
    #[serde(default)]
    pub coverage: CoverageConfig,

    /// Gap prioritization settings
    #[serde(default)]
    pub priority: PriorityConfig,

    /// Built-in validation rule settings
    #[serde(default)]
    pub validation: ValidationConfig,
}

impl TestgapConfig {
    /// Check every section, reporting the first invalid one.
    pub fn validate(&self) -> Result<(), String> {
        self.mapping.validate()?;
        self.coverage.validate()?;
        self.priority.validate()?;
        Ok(())
    }

    /// Replace each invalid section with its defaults, returning the messages
    /// for the sections that were reset.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = self.mapping.validate() {
            warnings.push(e);
            self.mapping = MappingConfig::default();
        }
        if let Err(e) = self.coverage.validate() {
            warnings.push(e);
            self.coverage = CoverageConfig::default();
        }
        if let Err(e) = self.priority.validate() {
            warnings.push(e);
            self.priority = PriorityConfig::default();
        }

        warnings
    }

    pub fn is_rule_disabled(&self, rule_id: &str) -> bool {
        self.validation
            .disabled_rules
            .iter()
            .any(|disabled| disabled == rule_id)
    }
}
