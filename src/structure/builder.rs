//! Structural model construction.
//!
//! Descriptors are grouped by file; each file is nested independently (and in
//! parallel) by line-range containment, then the per-file trees are attached
//! to the repository root in path order.

use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, debug_span};

use super::model::{StructuralModel, UnitNode};
use crate::cancel::CancellationToken;
use crate::core::{normalize_path, LineRange, SourceFile, UnitDescriptor, UnitId, UnitKind};
use crate::diagnostics::{Diagnostic, Diagnostics};

/// Output of a structural build: the tree plus every anomaly encountered.
#[derive(Debug, Clone)]
pub struct StructuralBuild {
    pub model: StructuralModel,
    pub diagnostics: Diagnostics,
    /// False when cancellation stopped some files from being processed.
    pub complete: bool,
}

/// Build the structural model from scanner output.
pub fn build_structural_model(files: &[SourceFile], units: &[UnitDescriptor]) -> StructuralBuild {
    build_structural_model_with_cancel(files, units, &CancellationToken::new())
}

pub fn build_structural_model_with_cancel(
    files: &[SourceFile],
    units: &[UnitDescriptor],
    cancel: &CancellationToken,
) -> StructuralBuild {
    let _span = debug_span!("structural_build", units = units.len()).entered();

    let groups = group_by_file(files, units);
    let total = groups.len();

    let built: Vec<FileBuild> = groups
        .into_par_iter()
        .filter(|_| !cancel.is_cancelled())
        .map(build_file)
        .collect();

    let complete = built.len() == total;
    let mut diagnostics = Diagnostics::new();
    let mut nodes = Vec::new();
    let mut module_ids = Vec::with_capacity(built.len());
    let mut max_end = 1;

    for file in built {
        diagnostics.extend(file.diagnostics);
        module_ids.push(file.module_id);
        max_end = max_end.max(file.module_end);
        nodes.extend(file.nodes);
    }

    let root_id = UnitId::repository();
    for node in nodes.iter_mut().filter(|n| n.kind == UnitKind::Module) {
        node.parent = Some(root_id.clone());
    }
    let root_complexity = nodes
        .iter()
        .filter(|n| n.kind == UnitKind::Module)
        .fold(0u32, |sum, n| sum.saturating_add(n.complexity))
        .max(1);

    let root = UnitNode {
        id: root_id,
        kind: UnitKind::Repository,
        qualified_name: UnitId::REPOSITORY.to_string(),
        file: PathBuf::new(),
        range: LineRange::new(1, max_end),
        complexity: root_complexity,
        children: module_ids,
        parent: None,
        owning_class: None,
    };

    debug!(
        modules = root.children.len(),
        nodes = nodes.len(),
        diagnostics = diagnostics.len(),
        "structural model built"
    );

    StructuralBuild {
        model: StructuralModel::from_parts(root, nodes),
        diagnostics,
        complete,
    }
}

struct FileGroup<'a> {
    path: PathBuf,
    line_count: Option<usize>,
    descriptors: Vec<(usize, &'a UnitDescriptor)>,
}

struct FileBuild {
    module_id: UnitId,
    module_end: usize,
    nodes: Vec<UnitNode>,
    diagnostics: Diagnostics,
}

fn group_by_file<'a>(files: &[SourceFile], units: &'a [UnitDescriptor]) -> Vec<FileGroup<'a>> {
    let mut groups: BTreeMap<PathBuf, FileGroup<'a>> = BTreeMap::new();

    for file in files {
        let path = PathBuf::from(normalize_path(&file.path));
        let entry = groups.entry(path.clone()).or_insert_with(|| FileGroup {
            path,
            line_count: None,
            descriptors: Vec::new(),
        });
        entry.line_count = file.line_count.or(entry.line_count);
    }

    for (index, unit) in units.iter().enumerate() {
        let path = PathBuf::from(normalize_path(&unit.file));
        groups
            .entry(path.clone())
            .or_insert_with(|| FileGroup {
                path,
                line_count: None,
                descriptors: Vec::new(),
            })
            .descriptors
            .push((index, unit));
    }

    groups.into_values().collect()
}

/// Module qualified name: the file path without extension, dotted, with a
/// leading `src`/`lib` segment removed.
pub fn module_qualified_name(path: &Path) -> String {
    let without_ext = path.with_extension("");
    let mut segments: Vec<String> = without_ext
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .filter(|c| c != ".")
        .collect();
    if segments.len() > 1 && matches!(segments[0].as_str(), "src" | "lib") {
        segments.remove(0);
    }
    segments.join(".")
}

/// Working node used while nesting one file.
struct Draft<'a> {
    descriptor: Option<&'a UnitDescriptor>,
    node: UnitNode,
    children: Vec<usize>,
}

fn validate_descriptor(descriptor: &UnitDescriptor, line_count: Option<usize>) -> Result<(), String> {
    if matches!(descriptor.kind, UnitKind::Repository | UnitKind::Module) {
        return Err(format!(
            "{} nodes are derived from files and cannot be declared",
            descriptor.kind
        ));
    }
    if descriptor.qualified_name.trim().is_empty() {
        return Err("empty qualified name".to_string());
    }
    if !descriptor.range.is_valid() {
        return Err("start line must be at least 1 and not after the end line".to_string());
    }
    if let Some(count) = line_count {
        if descriptor.range.end > count {
            return Err(format!("range extends past end of file ({} lines)", count));
        }
    }
    Ok(())
}

fn build_file(group: FileGroup<'_>) -> FileBuild {
    let FileGroup {
        path,
        line_count,
        descriptors,
    } = group;
    let mut diagnostics = Diagnostics::new();

    // Validation and duplicate detection run in input order so "later" means later in the scan.
    let mut seen = HashSet::new();
    let mut accepted = Vec::with_capacity(descriptors.len());
    for (index, descriptor) in descriptors {
        if let Err(reason) = validate_descriptor(descriptor, line_count) {
            diagnostics.push(Diagnostic::MalformedUnit {
                file: path.clone(),
                qualified_name: descriptor.qualified_name.clone(),
                range: descriptor.range,
                reason,
            });
            continue;
        }
        if !seen.insert(descriptor.qualified_name.as_str()) {
            diagnostics.push(Diagnostic::StructuralConflict {
                file: path.clone(),
                kept: descriptor.qualified_name.clone(),
                dropped: descriptor.qualified_name.clone(),
                reason: "duplicate qualified name".to_string(),
            });
            continue;
        }
        accepted.push((index, descriptor));
    }

    accepted.sort_by(|(ia, a), (ib, b)| {
        a.range
            .start
            .cmp(&b.range.start)
            .then(b.range.end.cmp(&a.range.end))
            .then(b.kind.containment_rank().cmp(&a.kind.containment_rank()))
            .then(ia.cmp(ib))
    });

    let module_end = accepted
        .iter()
        .map(|(_, d)| d.range.end)
        .chain(line_count)
        .max()
        .unwrap_or(1)
        .max(1);
    let module_id = UnitId::module(&path);

    let mut drafts = vec![Draft {
        descriptor: None,
        node: UnitNode {
            id: module_id.clone(),
            kind: UnitKind::Module,
            qualified_name: module_qualified_name(&path),
            file: path.clone(),
            range: LineRange::new(1, module_end),
            complexity: 1,
            children: Vec::new(),
            parent: None,
            owning_class: None,
        },
        children: Vec::new(),
    }];
    let mut stack: Vec<usize> = vec![0];

    for (_, descriptor) in accepted {
        let depth = stack
            .iter()
            .rposition(|&i| drafts[i].node.range.contains(&descriptor.range))
            .unwrap_or(0);
        let parent = stack[depth];

        if let Err(reason) = check_placement(&drafts, parent, descriptor) {
            diagnostics.push(Diagnostic::StructuralConflict {
                file: path.clone(),
                kept: drafts[parent].node.qualified_name.clone(),
                dropped: descriptor.qualified_name.clone(),
                reason,
            });
            continue;
        }

        let parent_id = drafts[parent].node.id.clone();
        let owning_class = (drafts[parent].node.kind == UnitKind::Class)
            .then(|| drafts[parent].node.qualified_name.clone());
        let index = drafts.len();
        drafts.push(Draft {
            descriptor: Some(descriptor),
            node: UnitNode {
                id: UnitId::unit(&path, &descriptor.qualified_name),
                kind: descriptor.kind,
                qualified_name: descriptor.qualified_name.clone(),
                file: path.clone(),
                range: descriptor.range,
                complexity: descriptor.complexity.unwrap_or(1),
                children: Vec::new(),
                parent: Some(parent_id),
                owning_class,
            },
            children: Vec::new(),
        });
        drafts[parent].children.push(index);
        stack.truncate(depth + 1);
        stack.push(index);
    }

    derive_internal_complexity(&mut drafts, 0);

    let ids: Vec<UnitId> = drafts.iter().map(|d| d.node.id.clone()).collect();
    let nodes = drafts
        .into_iter()
        .map(|draft| {
            let mut node = draft.node;
            node.children = draft.children.iter().map(|&c| ids[c].clone()).collect();
            node
        })
        .collect();

    FileBuild {
        module_id,
        module_end,
        nodes,
        diagnostics,
    }
}

/// Decide whether `descriptor` may become a child of `drafts[parent]`.
fn check_placement(
    drafts: &[Draft<'_>],
    parent: usize,
    descriptor: &UnitDescriptor,
) -> Result<(), String> {
    let container = &drafts[parent];

    if let Some(existing) = container.descriptor {
        if existing.range == descriptor.range {
            let outranks =
                existing.kind.containment_rank() > descriptor.kind.containment_rank();
            let hinted = descriptor.parent_hint.as_deref() == Some(existing.qualified_name.as_str());
            if !outranks && !hinted {
                return Err(format!(
                    "identical line range {} with equal containment rank",
                    descriptor.range
                ));
            }
        }
    }

    if let Some(&previous) = container.children.last() {
        let sibling = &drafts[previous].node;
        if sibling.range.overlaps(&descriptor.range) {
            return Err(format!(
                "range {} overlaps sibling {} ({})",
                descriptor.range, sibling.qualified_name, sibling.range
            ));
        }
    }

    Ok(())
}

/// Containers without a declared complexity take the sum of their children's.
fn derive_internal_complexity(drafts: &mut [Draft<'_>], index: usize) -> u32 {
    let children = drafts[index].children.clone();
    let child_sum: u32 = children
        .into_iter()
        .fold(0, |sum, child| sum.saturating_add(derive_internal_complexity(drafts, child)));

    let declared = drafts[index].descriptor.and_then(|d| d.complexity);
    let draft = &mut drafts[index];
    if declared.is_none() && !draft.children.is_empty() {
        draft.node.complexity = child_sum.max(1);
    }
    draft.node.complexity
}
