//! Ranking of implementation units by testing urgency.

pub mod dependency;
pub mod prioritizer;

pub use dependency::{DependencyMap, DependencyProvider};
pub use prioritizer::{
    prioritize, priority_order, FactorKind, PriorityFactor, PriorityList, PriorityScore,
};
