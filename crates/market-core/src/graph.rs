//! Read-only walks over a resolved [`DependencyTree`].

use std::collections::{BTreeSet, HashSet};

use crate::package::Package;
use crate::resolver::{DependencyNode, DependencyTree};

/// Install order for `tree`: post-order, first occurrence of each id wins.
///
/// Every package appears after all of its dependencies. The root comes
/// last.
pub fn flatten_dependency_tree(tree: &DependencyTree) -> Vec<Package> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    flatten_into(&tree.package, &tree.dependencies, &mut seen, &mut order);
    order
}

fn flatten_into(
    package: &Package,
    dependencies: &[DependencyNode],
    seen: &mut HashSet<String>,
    order: &mut Vec<Package>,
) {
    if !seen.insert(package.id.clone()) {
        return;
    }
    for node in dependencies {
        flatten_into(&node.package, &node.dependencies, seen, order);
    }
    order.push(package.clone());
}

/// Every cycle in `tree`, each reported as the id path that closes it.
///
/// `A -> B -> A` is reported as `["A", "B", "A"]`. Fully explored nodes
/// are not walked again when reached through another branch.
pub fn detect_circular_dependencies(tree: &DependencyTree) -> Vec<Vec<String>> {
    let mut walk = CycleWalk::default();
    walk.visit(&tree.package.id, &tree.dependencies);
    walk.cycles
}

#[derive(Default)]
struct CycleWalk {
    stack: Vec<String>,
    done: HashSet<String>,
    cycles: Vec<Vec<String>>,
}

impl CycleWalk {
    fn visit(&mut self, id: &str, dependencies: &[DependencyNode]) {
        if let Some(start) = self.stack.iter().position(|s| s == id) {
            let mut cycle = self.stack[start..].to_vec();
            cycle.push(id.to_string());
            self.cycles.push(cycle);
            return;
        }
        if self.done.contains(id) {
            return;
        }

        self.stack.push(id.to_string());
        for node in dependencies {
            self.visit(&node.package.id, &node.dependencies);
        }
        self.stack.pop();
        self.done.insert(id.to_string());
    }
}

/// All package ids reachable in `tree`, root included.
pub fn get_unique_dependencies(tree: &DependencyTree) -> BTreeSet<String> {
    fn collect(nodes: &[DependencyNode], ids: &mut BTreeSet<String>) {
        for node in nodes {
            ids.insert(node.package.id.clone());
            collect(&node.dependencies, ids);
        }
    }

    let mut ids = BTreeSet::from([tree.package.id.clone()]);
    collect(&tree.dependencies, &mut ids);
    ids
}
