//! Reachability analysis
//!
//! Answers "does the project actually reach this dependency?". For Go the
//! analyzer walks the IR call graph from `main`/`init` roots; for
//! dynamically-resolved ecosystems it falls back to a BFS over the
//! package import DAG, which over-approximates — the report says so
//! instead of silently claiming unreachable.

use crate::features::ir_builder::IrGraph;
use crate::shared::models::{DependencyGraph, Language, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::path::Path;

/// How reachability was computed.
pub const APPROX_CALL_GRAPH: &str = "call-graph";
pub const APPROX_IMPORT_GRAPH: &str = "import-graph";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReachabilityReport {
    pub package: String,
    pub reachable: bool,
    /// Capability names reachable through this package (its own set when
    /// reachable, empty otherwise).
    pub reachable_caps: Vec<String>,
    /// `call-graph` (precise roots) or `import-graph` (over-approximate).
    pub approximation: String,
}

/// Per-dependency reachability, sorted by package path.
///
/// `entry_file` restricts the roots to the package that declares it.
pub fn analyze(
    graph: &DependencyGraph,
    ir: &IrGraph,
    entry_file: Option<&Path>,
) -> Vec<ReachabilityReport> {
    let (reached_packages, approximation) = match graph.language {
        Language::Go => (call_graph_walk(graph, ir, entry_file), APPROX_CALL_GRAPH),
        Language::JavaScript => (import_graph_walk(graph, entry_file), APPROX_IMPORT_GRAPH),
    };

    let main_paths: BTreeSet<&str> = graph
        .modules
        .values()
        .filter(|m| m.is_main)
        .flat_map(|m| m.packages.iter().map(String::as_str))
        .collect();

    let mut reports = Vec::new();
    for (path, pkg) in &graph.packages {
        if main_paths.contains(path.as_str()) || pkg.capabilities.is_empty() {
            continue;
        }
        let reachable = reached_packages.contains(path.as_str());
        reports.push(ReachabilityReport {
            package: path.clone(),
            reachable,
            reachable_caps: if reachable {
                pkg.capabilities.names().into_iter().map(String::from).collect()
            } else {
                Vec::new()
            },
            approximation: approximation.to_string(),
        });
    }
    reports
}

/// Packages whose `main`/`init` functions transitively reach a symbol.
fn call_graph_walk(
    graph: &DependencyGraph,
    ir: &IrGraph,
    entry_file: Option<&Path>,
) -> BTreeSet<String> {
    let root_packages = entry_packages(graph, entry_file);

    let mut queue: VecDeque<&Symbol> = ir
        .functions
        .keys()
        .filter(|s| {
            root_packages.contains(s.package.as_str())
                && (s.name == "main" || s.name == "init" || s.name == "<toplevel>")
        })
        .collect();
    let mut seen: BTreeSet<&Symbol> = queue.iter().copied().collect();

    // Unresolved (synthetic) edges are still followed: they mark the
    // target package as touched even without a function body to enter.
    let mut reached: BTreeSet<String> = root_packages.iter().cloned().collect();
    while let Some(symbol) = queue.pop_front() {
        reached.insert(symbol.package.clone());
        for edge in ir.calls.iter().filter(|e| e.caller == *symbol) {
            reached.insert(edge.callee.package.clone());
            if !edge.synthetic {
                if let Some((callee, _)) = ir.functions.get_key_value(&edge.callee) {
                    if seen.insert(callee) {
                        queue.push_back(callee);
                    }
                }
            }
        }
    }
    reached
}

/// BFS over the package import DAG from the main packages.
fn import_graph_walk(graph: &DependencyGraph, entry_file: Option<&Path>) -> BTreeSet<String> {
    let roots = entry_packages(graph, entry_file);
    let mut reached: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<&str> = roots.iter().map(String::as_str).collect();
    while let Some(pkg) = queue.pop_front() {
        if !reached.insert(pkg.to_string()) {
            continue;
        }
        if let Some(targets) = graph.edges.get(pkg) {
            for target in targets {
                if !reached.contains(target.as_str()) {
                    queue.push_back(target);
                }
            }
        }
    }
    reached
}

/// Root packages: all main-module packages, or just the one declaring the
/// entry file when a restriction is given.
fn entry_packages(graph: &DependencyGraph, entry_file: Option<&Path>) -> BTreeSet<String> {
    let mains = graph
        .modules
        .values()
        .filter(|m| m.is_main)
        .flat_map(|m| m.packages.iter());

    match entry_file {
        None => mains.cloned().collect(),
        Some(entry) => mains
            .filter(|p| {
                graph.packages.get(*p).map_or(false, |pkg| {
                    pkg.source_files
                        .iter()
                        .any(|f| f == entry || f.ends_with(entry))
                })
            })
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{
        CallEdge, Capability, CapabilitySet, Evidence, EvidenceVia, FunctionCaps, Module, Package,
    };

    fn caps(cap: Capability) -> CapabilitySet {
        let mut set = CapabilitySet::new();
        set.add(cap, Evidence::new("f.go", 1, "x", EvidenceVia::Import, 0.9));
        set
    }

    fn go_fixture(reachable_dep: bool) -> (DependencyGraph, IrGraph) {
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
        graph.modules.insert(
            "dep".into(),
            Module {
                path: "dep".into(),
                version: "v1".into(),
                packages: vec!["dep".into()],
                ..Default::default()
            },
        );
        graph.packages.insert(
            "dep".into(),
            Package {
                import_path: "dep".into(),
                name: "dep".into(),
                module_ref: "dep".into(),
                capabilities: caps(Capability::Exec),
                ..Default::default()
            },
        );

        let main_fn = Symbol::func("app", "main");
        let dep_fn = Symbol::func("dep", "Run");
        let mut ir = IrGraph::default();
        ir.functions
            .insert(main_fn.clone(), FunctionCaps::new(main_fn.clone()));
        ir.functions
            .insert(dep_fn.clone(), FunctionCaps::new(dep_fn.clone()));
        if reachable_dep {
            ir.calls
                .push(CallEdge::new(main_fn, dep_fn, "main.go", 3));
        }
        (graph, ir)
    }

    #[test]
    fn test_reachable_dependency() {
        let (graph, ir) = go_fixture(true);
        let reports = analyze(&graph, &ir, None);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].reachable);
        assert_eq!(reports[0].reachable_caps, vec!["exec"]);
        assert_eq!(reports[0].approximation, APPROX_CALL_GRAPH);
    }

    #[test]
    fn test_unreachable_dependency() {
        let (graph, ir) = go_fixture(false);
        let reports = analyze(&graph, &ir, None);
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].reachable);
        assert!(reports[0].reachable_caps.is_empty());
    }

    #[test]
    fn test_import_graph_over_approximates() {
        let (mut graph, ir) = go_fixture(false);
        graph.language = Language::JavaScript;
        graph.edges.insert("app".into(), vec!["dep".into()]);
        let reports = analyze(&graph, &ir, None);
        assert!(reports[0].reachable);
        assert_eq!(reports[0].approximation, APPROX_IMPORT_GRAPH);
    }

    #[test]
    fn test_packages_without_caps_skipped() {
        let (mut graph, ir) = go_fixture(true);
        graph.packages.get_mut("dep").unwrap().capabilities = CapabilitySet::new();
        assert!(analyze(&graph, &ir, None).is_empty());
    }
}
