use serde::{Deserialize, Serialize};

use crate::core::UnitKind;

/// Weights and marker tokens used by the test-mapping resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Contribution of an exact normalized name match.
    #[serde(default = "default_name_weight")]
    pub name_weight: f64,

    /// Contribution of a qualified-name or import reference in the test source.
    #[serde(default = "default_reference_weight")]
    pub reference_weight: f64,

    /// Contribution of a conventional test-path relationship.
    #[serde(default = "default_proximity_weight")]
    pub proximity_weight: f64,

    #[serde(default = "default_test_prefixes")]
    pub test_prefixes: Vec<String>,

    #[serde(default = "default_test_suffixes")]
    pub test_suffixes: Vec<String>,

    /// Directory segments that only exist to hold tests.
    #[serde(default = "default_test_dirs")]
    pub test_dirs: Vec<String>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            name_weight: default_name_weight(),
            reference_weight: default_reference_weight(),
            proximity_weight: default_proximity_weight(),
            test_prefixes: default_test_prefixes(),
            test_suffixes: default_test_suffixes(),
            test_dirs: default_test_dirs(),
        }
    }
}

impl MappingConfig {
    pub fn is_valid_weight(weight: f64) -> bool {
        (0.0..=1.0).contains(&weight)
    }

    pub fn validate_weight(weight: f64, name: &str) -> Result<(), String> {
        if Self::is_valid_weight(weight) {
            Ok(())
        } else {
            Err(format!("{} weight must be between 0.0 and 1.0", name))
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        Self::validate_weight(self.name_weight, "Name")?;
        Self::validate_weight(self.reference_weight, "Reference")?;
        Self::validate_weight(self.proximity_weight, "Proximity")?;
        Ok(())
    }
}

pub fn default_name_weight() -> f64 {
    0.5
}
pub fn default_reference_weight() -> f64 {
    0.3
}
pub fn default_proximity_weight() -> f64 {
    0.2
}

pub fn default_test_prefixes() -> Vec<String> {
    vec!["test_".into(), "test".into()]
}

pub fn default_test_suffixes() -> Vec<String> {
    vec![
        "_test".into(),
        "_tests".into(),
        "_spec".into(),
        "test".into(),
        "spec".into(),
    ]
}

pub fn default_test_dirs() -> Vec<String> {
    vec![
        "tests".into(),
        "test".into(),
        "__tests__".into(),
        "spec".into(),
        "specs".into(),
    ]
}

/// Coverage reporting thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Modules below this line percentage are reported as low coverage.
    #[serde(default = "default_low_coverage_threshold")]
    pub low_coverage_threshold: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            low_coverage_threshold: default_low_coverage_threshold(),
        }
    }
}

impl CoverageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if (0.0..=100.0).contains(&self.low_coverage_threshold) {
            Ok(())
        } else {
            Err("low_coverage_threshold must be between 0 and 100".to_string())
        }
    }
}

pub fn default_low_coverage_threshold() -> f64 {
    50.0
}

/// Gap prioritizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityConfig {
    /// Scale applied to normalized fan-in/out when dependency data is available.
    #[serde(default = "default_dependency_weight")]
    pub dependency_weight: f64,

    /// Unit kinds that participate in the ranking.
    #[serde(default = "default_priority_kinds")]
    pub kinds: Vec<UnitKind>,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            dependency_weight: default_dependency_weight(),
            kinds: default_priority_kinds(),
        }
    }
}

impl PriorityConfig {
    pub fn validate(&self) -> Result<(), String> {
        MappingConfig::validate_weight(self.dependency_weight, "Dependency")?;
        if self.kinds.is_empty() {
            return Err("priority kinds must not be empty".to_string());
        }
        if self.kinds.contains(&UnitKind::Repository) {
            return Err("the repository node cannot be prioritized".to_string());
        }
        Ok(())
    }
}

pub fn default_dependency_weight() -> f64 {
    0.25
}

pub fn default_priority_kinds() -> Vec<UnitKind> {
    vec![UnitKind::Function, UnitKind::Method]
}

/// Built-in validation rule settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_min_assertions")]
    pub min_assertions: usize,

    /// Identifiers of built-in rules that should not be registered.
    #[serde(default)]
    pub disabled_rules: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_assertions: default_min_assertions(),
            disabled_rules: Vec::new(),
        }
    }
}

pub fn default_min_assertions() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping_weights_sum_to_one() {
        let config = MappingConfig::default();
        let sum = config.name_weight + config.reference_weight + config.proximity_weight;
        assert!((sum - 1.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mapping_rejects_out_of_range_weight() {
        let config = MappingConfig {
            name_weight: 1.5,
            ..MappingConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err("Name weight must be between 0.0 and 1.0".to_string())
        );
    }

    #[test]
    fn test_priority_rejects_repository_kind() {
        let config = PriorityConfig {
            kinds: vec![UnitKind::Repository],
            ..PriorityConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_coverage_threshold_bounds() {
        let config = CoverageConfig {
            low_coverage_threshold: 120.0,
        };
        assert!(config.validate().is_err());
        assert!(CoverageConfig::default().validate().is_ok());
    }
}
