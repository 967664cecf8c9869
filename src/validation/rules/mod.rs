//! Built-in validation rules.

pub mod assertions;
pub mod isolation;
pub mod structure;

use std::sync::Arc;

pub use assertions::{count_assertions, MinimumAssertions};
pub use isolation::{NoCrossTestDependency, NoSleep};
pub use structure::{ArrangeActAssert, AsyncWithoutAwait, DeclaresImports, DefinesTest};

use super::rule::ValidationRule;
use crate::config::ValidationConfig;

/// Every built-in rule, in registration order.
pub fn builtin_rules(config: &ValidationConfig) -> Vec<Arc<dyn ValidationRule>> {
    vec![
        Arc::new(MinimumAssertions::new(config.min_assertions)),
        Arc::new(NoCrossTestDependency),
        Arc::new(AsyncWithoutAwait),
        Arc::new(ArrangeActAssert::default()),
        Arc::new(DeclaresImports),
        Arc::new(DefinesTest),
        Arc::new(NoSleep),
    ]
}
