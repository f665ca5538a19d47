//! `market tree`.

use std::fmt::Write;

use market_core::{DependencyNode, DependencyTree, PackageInstaller, detect_circular_dependencies};

use crate::error::Result;

/// Handle `market tree <id>`
pub async fn handle_tree(installer: &PackageInstaller, id: &str) -> Result<()> {
    let tree = installer.resolve(id).await?;
    print!("{}", render_tree(&tree));
    Ok(())
}

/// Box-drawing rendering of a resolved tree, with a summary footer.
pub fn render_tree(tree: &DependencyTree) -> String {
    let mut out = format!("{}\n", tree.package.spec());
    render_nodes(&tree.dependencies, "", &mut out);

    let noun = if tree.total_count == 1 { "dependency" } else { "dependencies" };
    let _ = writeln!(out, "\n{} {noun}", tree.total_count);
    for cycle in detect_circular_dependencies(tree) {
        let _ = writeln!(out, "circular: {}", cycle.join(" -> "));
    }
    out
}

fn render_nodes(nodes: &[DependencyNode], prefix: &str, out: &mut String) {
    for (i, node) in nodes.iter().enumerate() {
        let last = i + 1 == nodes.len();
        let (branch, indent) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
        let back_edge = node.circular && node.dependencies.is_empty();
        let _ = writeln!(
            out,
            "{prefix}{branch}{} ({}){}",
            node.package.spec(),
            node.version_range,
            if back_edge { " [circular]" } else { "" }
        );
        render_nodes(&node.dependencies, &format!("{prefix}{indent}"), out);
    }
}
