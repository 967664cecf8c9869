//! Configuration for the analysis engine.
//!
//! Settings live in `.testgap.toml`, discovered by walking up from the
//! working directory. Every section is optional and falls back to defaults.

mod core;
mod loader;
mod sections;

pub use self::core::TestgapConfig;
pub use loader::{
    directory_ancestors, load_config, load_config_from, load_config_from_path,
    parse_and_validate_config, CONFIG_FILE_NAME,
};
pub use sections::{
    default_dependency_weight, default_low_coverage_threshold, default_min_assertions,
    default_name_weight, default_priority_kinds, default_proximity_weight,
    default_reference_weight, default_test_dirs, default_test_prefixes, default_test_suffixes,
    CoverageConfig, MappingConfig, PriorityConfig, ValidationConfig,
};
