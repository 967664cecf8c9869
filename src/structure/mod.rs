//! Hierarchical model of repository units: repository → module → class → function/method.
//!
//! The model is rebuilt for every analysis run from the scanner's flat
//! descriptors and is immutable afterwards. Every later stage (mapping,
//! aggregation, prioritization) reads it through [`StructuralModel`].

pub mod builder;
pub mod model;

pub use builder::{
    build_structural_model, build_structural_model_with_cancel, module_qualified_name,
    StructuralBuild,
};
pub use model::{StructuralModel, UnitNode};
