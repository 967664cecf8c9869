use std::fmt;
use std::sync::Arc;

use super::rule::ValidationRule;
use super::rules::builtin_rules;
use crate::config::ValidationConfig;
use crate::errors::{Error, Result};

/// Ordered set of rules, keyed by id.
///
/// Mutation takes `&mut self`; evaluation only needs `&self`, so a registry
/// can be shared with workers but never changed while they run.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn ValidationRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in rules minus those listed in `config.disabled_rules`.
    pub fn with_builtin_rules(config: &ValidationConfig) -> Self {
        let rules = builtin_rules(config)
            .into_iter()
            .filter(|rule| !config.disabled_rules.iter().any(|id| id == rule.id()))
            .collect();
        Self { rules }
    }

    pub fn register<R: ValidationRule + 'static>(&mut self, rule: R) -> Result<()> {
        self.register_shared(Arc::new(rule))
    }

    pub fn register_shared(&mut self, rule: Arc<dyn ValidationRule>) -> Result<()> {
        if self.contains(rule.id()) {
            return Err(Error::Registry(format!(
                "rule '{}' is already registered",
                rule.id()
            )));
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<dyn ValidationRule>> {
        let idx = self.rules.iter().position(|rule| rule.id() == id)?;
        Some(self.rules.remove(idx))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rules.iter().any(|rule| rule.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn ValidationRule>> {
        self.rules.iter().find(|rule| rule.id() == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.id()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ValidationRule>> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry").field("rules", &self.ids()).finish()
    }
}
