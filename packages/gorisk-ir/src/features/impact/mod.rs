//! Impact (blast-radius) analysis
//!
//! Removing a module: reverse-BFS over the package edge map from the
//! module's own packages, recording every dependent with its depth,
//! non-blank LOC and whether an entry package is affected.

use crate::errors::{GoriskError, Result};
use crate::shared::models::DependencyGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedPackage {
    pub import_path: String,
    pub depth: u32,
    pub loc: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactReport {
    pub module: String,
    pub version: String,
    pub affected_packages: Vec<AffectedPackage>,
    /// Entry packages (binaries) among removed + affected.
    pub affected_mains: Vec<String>,
    /// Non-blank lines across removed + affected packages.
    pub loc_touched: usize,
    /// Deepest BFS level reached.
    pub depth: u32,
}

/// Blast radius of removing `module_path`.
pub fn analyze(graph: &DependencyGraph, module_path: &str) -> Result<ImpactReport> {
    let module = graph
        .modules
        .get(module_path)
        .ok_or_else(|| GoriskError::analysis(format!("module not in graph: {module_path}")))?;

    let removed: BTreeSet<&str> = module.packages.iter().map(String::as_str).collect();
    let reverse = graph.reverse_edges();

    // Reverse BFS; the removed set is never revisited.
    let mut affected: Vec<(String, u32)> = Vec::new();
    let mut seen: BTreeSet<&str> = removed.clone();
    let mut queue: VecDeque<(&str, u32)> = removed.iter().map(|p| (*p, 0)).collect();
    let mut max_depth = 0u32;
    while let Some((pkg, depth)) = queue.pop_front() {
        if let Some(parents) = reverse.get(pkg) {
            for parent in parents {
                if seen.insert(*parent) {
                    affected.push((parent.to_string(), depth + 1));
                    max_depth = max_depth.max(depth + 1);
                    queue.push_back((*parent, depth + 1));
                }
            }
        }
    }
    affected.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    let mut loc_touched = 0usize;
    let mut affected_mains = BTreeSet::new();
    for pkg_path in removed.iter().copied().chain(affected.iter().map(|(p, _)| p.as_str())) {
        if let Some(pkg) = graph.packages.get(pkg_path) {
            loc_touched += package_loc(pkg);
            if pkg.is_entry_point() {
                affected_mains.insert(pkg_path.to_string());
            }
        }
    }

    let affected_packages = affected
        .into_iter()
        .map(|(import_path, depth)| {
            let loc = graph
                .packages
                .get(&import_path)
                .map(package_loc)
                .unwrap_or(0);
            AffectedPackage {
                import_path,
                depth,
                loc,
            }
        })
        .collect();

    Ok(ImpactReport {
        module: module.path.clone(),
        version: module.version.clone(),
        affected_packages,
        affected_mains: affected_mains.into_iter().collect(),
        loc_touched,
        depth: max_depth,
    })
}

/// Non-blank lines across a package's declared source files.
fn package_loc(pkg: &crate::shared::models::Package) -> usize {
    pkg.source_files
        .iter()
        .filter_map(|f| std::fs::read_to_string(f).ok())
        .map(|content| content.lines().filter(|l| !l.trim().is_empty()).count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{Language, Module, Package};

    fn fixture() -> DependencyGraph {
        // main -> mid -> leaf ; removing leaf affects mid and main
        let main = Module {
            path: "app".into(),
            is_main: true,
            packages: vec!["app".into()],
            ..Default::default()
        };
        let mut graph = DependencyGraph::new(Language::Go, main);
        graph.packages.insert(
            "app".into(),
            Package {
                import_path: "app".into(),
                name: "main".into(),
                module_ref: "app".into(),
                ..Default::default()
            },
        );
        for path in ["mid", "leaf"] {
            graph.modules.insert(
                path.into(),
                Module {
                    path: path.into(),
                    version: "v1".into(),
                    packages: vec![path.into()],
                    ..Default::default()
                },
            );
            graph.packages.insert(
                path.into(),
                Package {
                    import_path: path.into(),
                    name: path.into(),
                    module_ref: path.into(),
                    ..Default::default()
                },
            );
        }
        graph.edges.insert("app".into(), vec!["mid".into()]);
        graph.edges.insert("mid".into(), vec!["leaf".into()]);
        graph
    }

    #[test]
    fn test_blast_radius() {
        let graph = fixture();
        let report = analyze(&graph, "leaf").unwrap();
        assert_eq!(report.module, "leaf");
        assert_eq!(report.depth, 2);
        let paths: Vec<&str> = report
            .affected_packages
            .iter()
            .map(|p| p.import_path.as_str())
            .collect();
        assert_eq!(paths, vec!["mid", "app"]);
        assert_eq!(report.affected_mains, vec!["app"]);
    }

    #[test]
    fn test_leaf_with_no_dependents() {
        let mut graph = fixture();
        graph.edges.clear();
        let report = analyze(&graph, "leaf").unwrap();
        assert!(report.affected_packages.is_empty());
        assert_eq!(report.depth, 0);
        assert!(report.affected_mains.is_empty());
    }

    #[test]
    fn test_unknown_module_errors() {
        let graph = fixture();
        assert!(analyze(&graph, "nope").is_err());
    }

    #[test]
    fn test_removed_set_never_revisited() {
        let mut graph = fixture();
        // pathological back-edge into the removed set
        graph.edges.insert("leaf".into(), vec!["mid".into()]);
        let report = analyze(&graph, "mid").unwrap();
        assert!(report
            .affected_packages
            .iter()
            .all(|p| p.import_path != "mid"));
    }
}
