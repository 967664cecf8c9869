use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::{normalize_path, LineRange, UnitId, UnitKind};

/// One node of the structural tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitNode {
    pub id: UnitId,
    pub kind: UnitKind,
    pub qualified_name: String,
    /// Containing file; empty for the repository root.
    pub file: PathBuf,
    pub range: LineRange,
    pub complexity: u32,
    /// Children ordered by starting line.
    pub children: Vec<UnitId>,
    pub parent: Option<UnitId>,
    /// Qualified name of the class that owns this function or method.
    pub owning_class: Option<String>,
}

impl UnitNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Rooted tree of repository units with identifier and line lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralModel {
    root: UnitId,
    nodes: BTreeMap<UnitId, UnitNode>,
    modules: BTreeMap<PathBuf, UnitId>,
}

impl StructuralModel {
    pub(crate) fn from_parts(
        root: UnitNode,
        nodes: impl IntoIterator<Item = UnitNode>,
    ) -> Self {
        let mut map = BTreeMap::new();
        let mut modules = BTreeMap::new();
        let root_id = root.id.clone();
        map.insert(root_id.clone(), root);
        for node in nodes {
            if node.kind == UnitKind::Module {
                modules.insert(node.file.clone(), node.id.clone());
            }
            map.insert(node.id.clone(), node);
        }
        Self {
            root: root_id,
            nodes: map,
            modules,
        }
    }

    pub fn root(&self) -> &UnitNode {
        &self.nodes[&self.root]
    }

    pub fn get(&self, id: &UnitId) -> Option<&UnitNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &UnitId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// All nodes in identifier order.
    pub fn nodes(&self) -> impl Iterator<Item = &UnitNode> {
        self.nodes.values()
    }

    /// Every node except the repository root.
    pub fn implementation_units(&self) -> impl Iterator<Item = &UnitNode> {
        self.nodes
            .values()
            .filter(|node| node.kind != UnitKind::Repository)
    }

    pub fn modules(&self) -> impl Iterator<Item = &UnitNode> {
        self.modules.values().filter_map(|id| self.nodes.get(id))
    }

    pub fn module_for(&self, file: &Path) -> Option<&UnitNode> {
        let key = PathBuf::from(normalize_path(file));
        self.modules.get(&key).and_then(|id| self.nodes.get(id))
    }

    pub fn children(&self, id: &UnitId) -> impl Iterator<Item = &UnitNode> {
        self.nodes
            .get(id)
            .into_iter()
            .flat_map(|node| node.children.iter())
            .filter_map(|child| self.nodes.get(child))
    }

    pub fn parent(&self, id: &UnitId) -> Option<&UnitNode> {
        self.nodes
            .get(id)
            .and_then(|node| node.parent.as_ref())
            .and_then(|parent| self.nodes.get(parent))
    }

    /// Innermost unit whose range contains `line` in `file`.
    pub fn innermost_at(&self, file: &Path, line: usize) -> Option<&UnitNode> {
        let mut current = self.module_for(file)?;
        if !current.range.contains_line(line) {
            return None;
        }

        loop {
            let idx = current.children.partition_point(|child| {
                self.nodes
                    .get(child)
                    .map(|node| node.range.start <= line)
                    .unwrap_or(false)
            });
            let next = idx
                .checked_sub(1)
                .and_then(|i| self.nodes.get(&current.children[i]))
                .filter(|child| child.range.contains_line(line));

            match next {
                Some(child) => current = child,
                None => return Some(current),
            }
        }
    }

    /// Identifiers of `id` and all its descendants, children before parents.
    pub fn post_order(&self, id: &UnitId) -> Vec<UnitId> {
        let mut order = Vec::new();
        let mut stack = vec![(id.clone(), false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                order.push(current);
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                stack.push((current.clone(), true));
                for child in node.children.iter().rev() {
                    stack.push((child.clone(), false));
                }
            }
        }
        order
    }

    /// `id` and every node beneath it.
    pub fn subtree(&self, id: &UnitId) -> Vec<&UnitNode> {
        self.post_order(id)
            .iter()
            .filter_map(|unit| self.nodes.get(unit))
            .collect()
    }

    /// Walk from `id` up to the root, starting with `id` itself.
    pub fn ancestors<'a>(&'a self, id: &UnitId) -> impl Iterator<Item = &'a UnitNode> + 'a {
        std::iter::successors(self.nodes.get(id), move |node| {
            node.parent.as_ref().and_then(|parent| self.nodes.get(parent))
        })
    }

    /// Check the tree invariants, returning a description of each violation.
    ///
    /// Line ranges are file-relative, so range checks only apply below module nodes.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for node in self.nodes.values() {
            match (&node.parent, node.kind) {
                (None, UnitKind::Repository) => {}
                (None, _) => violations.push(format!("{} has no parent", node.id)),
                (Some(_), UnitKind::Repository) => {
                    violations.push(format!("{} is a repository with a parent", node.id))
                }
                (Some(parent), _) => {
                    let listed = self
                        .nodes
                        .get(parent)
                        .map(|p| p.children.iter().filter(|c| *c == &node.id).count())
                        .unwrap_or(0);
                    if listed != 1 {
                        violations.push(format!(
                            "{} listed {} times under parent {}",
                            node.id, listed, parent
                        ));
                    }
                }
            }

            if node.kind == UnitKind::Repository {
                continue;
            }

            let children: Vec<&UnitNode> = self.children(&node.id).collect();
            for child in &children {
                if !node.range.contains(&child.range) {
                    violations.push(format!(
                        "{} ({}) does not contain child {} ({})",
                        node.id, node.range, child.id, child.range
                    ));
                }
            }
            for pair in children.windows(2) {
                if pair[0].range.overlaps(&pair[1].range) {
                    violations.push(format!(
                        "siblings {} and {} overlap",
                        pair[0].id, pair[1].id
                    ));
                }
            }
        }

        violations
    }
}
