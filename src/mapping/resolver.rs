use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info_span};

use super::overrides::OverrideTable;
use super::signals::{same_directory, score_pair, Signal, TestProfile, UnitProfile};
use crate::cancel::CancellationToken;
use crate::config::MappingConfig;
use crate::core::{TestId, TestUnit, UnitId, UnitKind};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::structure::{StructuralModel, UnitNode};

/// A scored test → unit association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEdge {
    pub test: TestId,
    pub unit: UnitId,
    pub confidence: f64,
    pub signals: Vec<Signal>,
    /// Set for user-provided overrides, which are never recomputed.
    pub manual: bool,
}

impl MappingEdge {
    fn manual(test: TestId, unit: UnitId) -> Self {
        Self {
            test,
            unit,
            confidence: 1.0,
            signals: vec![Signal::ManualOverride],
            manual: true,
        }
    }
}

/// Resolution output for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingReport {
    /// Exactly one edge per mapped test.
    pub resolved: BTreeMap<TestId, MappingEdge>,
    /// Every candidate per test, in resolution order.
    pub candidates: BTreeMap<TestId, Vec<MappingEdge>>,
    pub unmapped: Vec<TestId>,
}

impl MappingReport {
    pub fn resolved_for(&self, test: &TestId) -> Option<&MappingEdge> {
        self.resolved.get(test)
    }

    pub fn edges_to<'a>(&'a self, unit: &'a UnitId) -> impl Iterator<Item = &'a MappingEdge> + 'a {
        self.resolved.values().filter(move |edge| &edge.unit == unit)
    }

    /// Units with a resolved inbound edge on themselves or on a descendant.
    pub fn tested_units(&self, model: &StructuralModel) -> BTreeSet<UnitId> {
        let mut tested = BTreeSet::new();
        for edge in self.resolved.values() {
            for node in model.ancestors(&edge.unit) {
                if !tested.insert(node.id.clone()) {
                    break;
                }
            }
        }
        tested
    }

    /// Implementation units no resolved edge reaches. Independent of line coverage.
    pub fn untested_units<'m>(&self, model: &'m StructuralModel) -> Vec<&'m UnitNode> {
        let tested = self.tested_units(model);
        model
            .implementation_units()
            .filter(|node| !tested.contains(&node.id))
            .collect()
    }

    pub fn untested_of_kind<'m>(
        &self,
        model: &'m StructuralModel,
        kind: UnitKind,
    ) -> Vec<&'m UnitNode> {
        self.untested_units(model)
            .into_iter()
            .filter(|node| node.kind == kind)
            .collect()
    }

    pub fn untested_modules<'m>(&self, model: &'m StructuralModel) -> Vec<&'m UnitNode> {
        self.untested_of_kind(model, UnitKind::Module)
    }

    pub fn untested_functions<'m>(&self, model: &'m StructuralModel) -> Vec<&'m UnitNode> {
        self.untested_of_kind(model, UnitKind::Function)
    }

    pub fn untested_methods<'m>(&self, model: &'m StructuralModel) -> Vec<&'m UnitNode> {
        self.untested_of_kind(model, UnitKind::Method)
    }
}

#[derive(Debug)]
pub struct MappingRun {
    pub report: MappingReport,
    pub diagnostics: Diagnostics,
    pub complete: bool,
}

struct Scored<'m> {
    node: &'m UnitNode,
    confidence: f64,
    signals: Vec<Signal>,
    same_directory: bool,
}

/// Resolution order: confidence, then same directory, then qualified name, then id.
fn resolution_order(a: &Scored<'_>, b: &Scored<'_>) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.same_directory.cmp(&a.same_directory))
        .then_with(|| a.node.qualified_name.cmp(&b.node.qualified_name))
        .then_with(|| a.node.id.cmp(&b.node.id))
}

/// A reference to a unit that is only the path to a more specific referenced
/// unit (`billing` in `billing.calculate_total`) does not count for the container.
fn drop_subsumed_references(model: &StructuralModel, scored: &mut [Scored<'_>], config: &MappingConfig) {
    let referenced: BTreeSet<&UnitId> = scored
        .iter()
        .filter(|s| s.signals.contains(&Signal::DeclaredReference))
        .map(|s| &s.node.id)
        .collect();

    let subsumed: BTreeSet<UnitId> = referenced
        .iter()
        .flat_map(|id| model.ancestors(id).skip(1))
        .filter(|ancestor| referenced.contains(&ancestor.id))
        .map(|ancestor| ancestor.id.clone())
        .collect();

    for entry in scored.iter_mut().filter(|s| subsumed.contains(&s.node.id)) {
        entry.signals.retain(|signal| *signal != Signal::DeclaredReference);
        entry.confidence = f64::max(entry.confidence - config.reference_weight, 0.0);
    }
}

fn score_candidates<'m>(
    model: &StructuralModel,
    units: &[UnitProfile<'m>],
    test: &TestProfile<'_>,
    config: &MappingConfig,
) -> Vec<Scored<'m>> {
    let mut scored: Vec<Scored<'m>> = units
        .iter()
        .filter_map(|unit| {
            let (confidence, signals) = score_pair(test, unit, config);
            (!signals.is_empty()).then(|| Scored {
                node: unit.node,
                confidence,
                signals,
                same_directory: same_directory(test, unit),
            })
        })
        .collect();

    drop_subsumed_references(model, &mut scored, config);
    scored.retain(|s| s.confidence > 0.0 && !s.signals.is_empty());
    scored.sort_by(resolution_order);
    scored
}

fn to_edge(test: &TestId, scored: &Scored<'_>) -> MappingEdge {
    MappingEdge {
        test: test.clone(),
        unit: scored.node.id.clone(),
        confidence: scored.confidence,
        signals: scored.signals.clone(),
        manual: false,
    }
}

fn unit_profiles(model: &StructuralModel) -> Vec<UnitProfile<'_>> {
    model
        .nodes()
        .filter(|node| UnitProfile::is_candidate(node))
        .map(UnitProfile::new)
        .collect()
}

/// Candidate edges for a single test, best first.
pub fn candidates_for(
    model: &StructuralModel,
    test: &TestUnit,
    config: &MappingConfig,
) -> Vec<MappingEdge> {
    let units = unit_profiles(model);
    let profile = TestProfile::new(test, config);
    score_candidates(model, &units, &profile, config)
        .iter()
        .map(|scored| to_edge(&test.id, scored))
        .collect()
}

pub fn resolve_mappings(
    model: &StructuralModel,
    tests: &[TestUnit],
    overrides: &OverrideTable,
    config: &MappingConfig,
) -> MappingRun {
    resolve_mappings_with_cancel(model, tests, overrides, config, &CancellationToken::new())
}

/// Resolve one edge per test. Output is independent of the order of `tests`.
pub fn resolve_mappings_with_cancel(
    model: &StructuralModel,
    tests: &[TestUnit],
    overrides: &OverrideTable,
    config: &MappingConfig,
    cancel: &CancellationToken,
) -> MappingRun {
    let _span = info_span!("test_mapping", tests = tests.len()).entered();

    let mut ordered: Vec<&TestUnit> = tests.iter().collect();
    ordered.sort_by(|a, b| {
        a.id.cmp(&b.id)
            .then_with(|| a.file.cmp(&b.file))
            .then_with(|| a.range.cmp(&b.range))
            .then_with(|| a.source.cmp(&b.source))
    });
    ordered.dedup_by(|later, earlier| later.id == earlier.id);

    let units = unit_profiles(model);
    let per_test: Vec<(TestId, Vec<MappingEdge>)> = ordered
        .par_iter()
        .filter(|_| !cancel.is_cancelled())
        .map(|test| {
            let profile = TestProfile::new(test, config);
            let edges = score_candidates(model, &units, &profile, config)
                .iter()
                .map(|scored| to_edge(&test.id, scored))
                .collect();
            (test.id.clone(), edges)
        })
        .collect();

    let complete = per_test.len() == ordered.len();
    let mut report = MappingReport::default();
    let mut diagnostics = Diagnostics::new();

    for (test, candidates) in per_test {
        let manual = match overrides.get(&test) {
            Some(unit) if model.contains(unit) && unit.as_str() != UnitId::REPOSITORY => {
                Some(MappingEdge::manual(test.clone(), unit.clone()))
            }
            Some(unit) => {
                diagnostics.push(Diagnostic::InvalidOverride {
                    test: test.clone(),
                    unit: unit.clone(),
                });
                None
            }
            None => None,
        };

        match manual.or_else(|| candidates.first().cloned()) {
            Some(edge) => {
                report.resolved.insert(test.clone(), edge);
            }
            None => {
                diagnostics.push(Diagnostic::UnmappedTest { test: test.clone() });
                report.unmapped.push(test.clone());
            }
        }
        report.candidates.insert(test, candidates);
    }

    debug!(
        resolved = report.resolved.len(),
        unmapped = report.unmapped.len(),
        "resolved test mappings"
    );

    MappingRun {
        report,
        diagnostics,
        complete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LineRange, SourceFile, UnitDescriptor};
    use crate::structure::build_structural_model;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn billing_model() -> StructuralModel {
        build_structural_model(
            &[SourceFile::new("billing.py", 40)],
            &[
                UnitDescriptor::new(
                    UnitKind::Function,
                    "billing.calculate_total",
                    "billing.py",
                    LineRange::new(1, 10),
                ),
                UnitDescriptor::new(
                    UnitKind::Function,
                    "billing.apply_discount",
                    "billing.py",
                    LineRange::new(12, 20),
                ),
                UnitDescriptor::new(UnitKind::Class, "billing.Cart", "billing.py", LineRange::new(22, 40)),
                UnitDescriptor::new(
                    UnitKind::Method,
                    "billing.Cart.add",
                    "billing.py",
                    LineRange::new(24, 30),
                ),
            ],
        )
        .model
    }

    fn id(qn: &str) -> UnitId {
        UnitId::unit(Path::new("billing.py"), qn)
    }

    #[test]
    fn test_name_and_reference_beat_reference_only() {
        let model = billing_model();
        let test = TestUnit::new(
            "test_calculate_total",
            "tests/test_checkout.py",
            LineRange::new(1, 4),
            "from billing import calculate_total, apply_discount\n",
        );

        let run = resolve_mappings(&model, &[test.clone()], &OverrideTable::new(), &MappingConfig::default());
        let edge = &run.report.resolved[&test.id];

        assert_eq!(edge.unit, id("billing.calculate_total"));
        assert!((edge.confidence - 0.8).abs() < 1e-9);
        assert_eq!(run.report.candidates[&test.id].len(), 2);
        assert!(run.diagnostics.is_empty());
    }

    #[test]
    fn test_tie_breaks_on_qualified_name() {
        let model = billing_model();
        let test = TestUnit::new(
            "check_both",
            "tests/test_checkout.py",
            LineRange::new(1, 4),
            "from billing import calculate_total, apply_discount\n",
        );

        let run = resolve_mappings(&model, &[test.clone()], &OverrideTable::new(), &MappingConfig::default());
        assert_eq!(run.report.resolved[&test.id].unit, id("billing.apply_discount"));
    }

    #[test]
    fn test_tie_prefers_same_directory_over_name_order() {
        let function = |name: &str, file: &str| {
            UnitDescriptor::new(UnitKind::Function, name, file, LineRange::new(1, 5))
        };
        let model = build_structural_model(
            &[SourceFile::new("a/util.py", 10), SourceFile::new("shop/util.py", 10)],
            &[function("a.util.total", "a/util.py"), function("shop.util.total", "shop/util.py")],
        )
        .model;
        let test = TestUnit::new("test_total", "tests/shop/test_other.py", LineRange::new(1, 3), "");

        let run = resolve_mappings(&model, &[test.clone()], &OverrideTable::new(), &MappingConfig::default());
        let candidates = &run.report.candidates[&test.id];

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].confidence, candidates[1].confidence);
        assert_eq!(
            run.report.resolved[&test.id].unit,
            UnitId::unit(Path::new("shop/util.py"), "shop.util.total")
        );
    }

    #[test]
    fn test_container_reference_is_subsumed() {
        let model = billing_model();
        let test = TestUnit::new(
            "check_add",
            "tests/test_checkout.py",
            LineRange::new(1, 4),
            "from billing import Cart\nbilling.Cart.add(cart, item)\n",
        );

        let run = resolve_mappings(&model, &[test.clone()], &OverrideTable::new(), &MappingConfig::default());
        assert_eq!(run.report.resolved[&test.id].unit, id("billing.Cart.add"));
        assert_eq!(run.report.candidates[&test.id].len(), 1);
    }

    #[test]
    fn test_unmapped_test_is_reported() {
        let model = billing_model();
        let test = TestUnit::new("test_nothing", "tests/test_misc.py", LineRange::new(1, 2), "pass");

        let run = resolve_mappings(&model, &[test.clone()], &OverrideTable::new(), &MappingConfig::default());

        assert_eq!(run.report.unmapped, vec![test.id.clone()]);
        assert_eq!(run.diagnostics.count_of("UnmappedTest"), 1);
        assert!(!run.diagnostics.has_warnings());
    }

    #[test]
    fn test_manual_override_wins() {
        let model = billing_model();
        let test = TestUnit::new(
            "test_calculate_total",
            "tests/test_billing.py",
            LineRange::new(1, 4),
            "from billing import calculate_total",
        );
        let mut overrides = OverrideTable::new();
        overrides
            .add(test.id.clone(), id("billing.Cart.add"), &model)
            .unwrap();

        let run = resolve_mappings(&model, &[test.clone()], &overrides, &MappingConfig::default());
        let edge = &run.report.resolved[&test.id];

        assert!(edge.manual);
        assert_eq!(edge.unit, id("billing.Cart.add"));
        assert_eq!(edge.confidence, 1.0);
    }

    #[test]
    fn test_stale_override_falls_back() {
        let model = billing_model();
        let test = TestUnit::new(
            "test_calculate_total",
            "tests/test_billing.py",
            LineRange::new(1, 4),
            "",
        );
        let mut overrides = OverrideTable::new();
        overrides.add(test.id.clone(), id("billing.Cart.add"), &model).unwrap();

        let smaller = build_structural_model(
            &[SourceFile::new("billing.py", 40)],
            &[UnitDescriptor::new(
                UnitKind::Function,
                "billing.calculate_total",
                "billing.py",
                LineRange::new(1, 10),
            )],
        )
        .model;

        let run = resolve_mappings(&smaller, &[test.clone()], &overrides, &MappingConfig::default());

        assert_eq!(run.diagnostics.count_of("InvalidOverride"), 1);
        assert!(!run.report.resolved[&test.id].manual);
        assert_eq!(overrides.len(), 1);
    }

    #[test]
    fn test_untested_queries() {
        let model = billing_model();
        let test = TestUnit::new(
            "test_add",
            "tests/test_cart.py",
            LineRange::new(1, 4),
            "from billing import Cart",
        );
        let run = resolve_mappings(&model, &[test], &OverrideTable::new(), &MappingConfig::default());
        let report = &run.report;

        let untested: Vec<&str> = report
            .untested_units(&model)
            .iter()
            .map(|n| n.qualified_name.as_str())
            .collect();
        assert_eq!(untested, vec!["billing.apply_discount", "billing.calculate_total"]);
        assert!(report.untested_modules(&model).is_empty());
        assert!(report.untested_methods(&model).is_empty());
        assert_eq!(report.untested_functions(&model).len(), 2);
    }

    #[test]
    fn test_order_independent() {
        let model = billing_model();
        let a = TestUnit::new("test_add", "tests/test_cart.py", LineRange::new(1, 4), "");
        let b = TestUnit::new(
            "test_apply_discount",
            "tests/test_billing.py",
            LineRange::new(1, 4),
            "",
        );
        let config = MappingConfig::default();

        let forward = resolve_mappings(&model, &[a.clone(), b.clone()], &OverrideTable::new(), &config);
        let backward = resolve_mappings(&model, &[b, a], &OverrideTable::new(), &config);
        assert_eq!(forward.report, backward.report);
    }
}
