//! Shared value types for units, tests and languages.

pub mod language;
pub mod types;

pub use language::Language;
pub use types::{
    normalize_path, simple_name, LineRange, SourceFile, TestId, TestUnit, UnitDescriptor, UnitId,
    UnitKind,
};
