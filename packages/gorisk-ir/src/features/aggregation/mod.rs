//! Transitive module risk aggregation
//!
//! Rolls package capability scores up to modules over the module-level
//! DAG with depth-weighted decay: each direct dependency contributes its
//! own and its subtree's score divided by `depth_index + 2`.

use crate::shared::models::{DependencyGraph, RiskLevel};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRisk {
    pub module: String,
    pub version: String,
    pub direct_score: u32,
    pub transitive_score: f64,
    pub effective_score: f64,
    pub depth: u32,
    pub risk_level: RiskLevel,
    /// Union of capability names across the module's packages.
    pub capabilities: Vec<String>,
}

/// Module-level DAG projected from package edges, deduplicated.
fn module_edges(graph: &DependencyGraph) -> BTreeMap<&str, BTreeSet<&str>> {
    let mut edges: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (from_pkg, targets) in &graph.edges {
        let Some(from_mod) = graph.module_of(from_pkg) else {
            continue;
        };
        for to_pkg in targets {
            let Some(to_mod) = graph.module_of(to_pkg) else {
                continue;
            };
            if from_mod.path != to_mod.path {
                edges
                    .entry(from_mod.path.as_str())
                    .or_default()
                    .insert(to_mod.path.as_str());
            }
        }
    }
    edges
}

/// Max package capability score within one module.
fn direct_score(graph: &DependencyGraph, module_path: &str) -> u32 {
    graph
        .modules
        .get(module_path)
        .map(|m| {
            m.packages
                .iter()
                .filter_map(|p| graph.packages.get(p))
                .map(|p| p.capabilities.score())
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0)
}

fn transitive_score(
    graph: &DependencyGraph,
    edges: &BTreeMap<&str, BTreeSet<&str>>,
    module_path: &str,
    visited: &mut BTreeSet<String>,
    memo: &mut BTreeMap<String, f64>,
) -> f64 {
    if let Some(cached) = memo.get(module_path) {
        return *cached;
    }
    if !visited.insert(module_path.to_string()) {
        // Cycle: this module is already on the recursion path.
        return 0.0;
    }
    let mut total = 0.0;
    if let Some(deps) = edges.get(module_path) {
        // BTreeSet iteration gives the deterministic dependency order.
        for (depth_index, dep) in deps.iter().enumerate() {
            let dep_score = direct_score(graph, dep) as f64;
            let dep_transitive = transitive_score(graph, edges, dep, visited, memo);
            total += (dep_score + dep_transitive) / (depth_index as f64 + 2.0);
        }
    }
    visited.remove(module_path);
    memo.insert(module_path.to_string(), total);
    total
}

/// Aggregate every non-main module, sorted by risk descending then path.
pub fn aggregate_modules(graph: &DependencyGraph) -> Vec<ModuleRisk> {
    let edges = module_edges(graph);
    let mut memo = BTreeMap::new();

    let mut out: Vec<ModuleRisk> = graph
        .dependency_modules()
        .map(|module| {
            let direct = direct_score(graph, &module.path);
            let transitive = transitive_score(
                graph,
                &edges,
                &module.path,
                &mut BTreeSet::new(),
                &mut memo,
            );
            let effective = (direct as f64 + transitive / 2.0).min(100.0);

            let mut caps: BTreeSet<&'static str> = BTreeSet::new();
            for pkg_path in &module.packages {
                if let Some(pkg) = graph.packages.get(pkg_path) {
                    caps.extend(pkg.capabilities.names());
                }
            }

            ModuleRisk {
                module: module.path.clone(),
                version: module.version.clone(),
                direct_score: direct,
                transitive_score: transitive,
                effective_score: effective,
                depth: graph.module_depth(&module.path),
                risk_level: RiskLevel::from_composite(effective),
                capabilities: caps.into_iter().map(String::from).collect(),
            }
        })
        .collect();

    out.sort_by(|a, b| {
        b.risk_level
            .cmp(&a.risk_level)
            .then_with(|| a.module.cmp(&b.module))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{
        Capability, CapabilitySet, Evidence, EvidenceVia, Language, Module, Package,
    };

    fn cap_set(caps: &[Capability]) -> CapabilitySet {
        let mut set = CapabilitySet::new();
        for cap in caps {
            set.add(
                *cap,
                Evidence::new("f.go", 1, "x", EvidenceVia::Import, 0.9),
            );
        }
        set
    }

    fn module(graph: &mut DependencyGraph, path: &str, caps: &[Capability]) {
        graph.modules.insert(
            path.into(),
            Module {
                path: path.into(),
                version: "v1.0.0".into(),
                packages: vec![path.into()],
                ..Default::default()
            },
        );
        graph.packages.insert(
            path.into(),
            Package {
                import_path: path.into(),
                name: path.rsplit('/').next().unwrap().into(),
                module_ref: path.into(),
                capabilities: cap_set(caps),
                ..Default::default()
            },
        );
    }

    fn fixture() -> DependencyGraph {
        // app -> a -> b ; a has network (15), b has exec (20)
        let mut main = Module {
            path: "app".into(),
            is_main: true,
            packages: vec!["app".into()],
            ..Default::default()
        };
        main.version = String::new();
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
        module(&mut graph, "dep/a", &[Capability::Network]);
        module(&mut graph, "dep/b", &[Capability::Exec]);
        graph.edges.insert("app".into(), vec!["dep/a".into()]);
        graph.edges.insert("dep/a".into(), vec!["dep/b".into()]);
        graph
    }

    #[test]
    fn test_direct_and_transitive_scores() {
        let graph = fixture();
        let risks = aggregate_modules(&graph);
        let a = risks.iter().find(|r| r.module == "dep/a").unwrap();
        let b = risks.iter().find(|r| r.module == "dep/b").unwrap();

        assert_eq!(b.direct_score, 20);
        assert_eq!(b.transitive_score, 0.0);
        assert_eq!(b.effective_score, 20.0);

        assert_eq!(a.direct_score, 15);
        // one dep at depth_index 0: (20 + 0) / 2 = 10
        assert!((a.transitive_score - 10.0).abs() < 1e-9);
        assert!((a.effective_score - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_effective_score_capped() {
        let mut graph = fixture();
        // give a an absurd direct set
        let caps: Vec<Capability> = Capability::ALL.to_vec();
        graph.packages.get_mut("dep/a").unwrap().capabilities = cap_set(&caps);
        let risks = aggregate_modules(&graph);
        let a = risks.iter().find(|r| r.module == "dep/a").unwrap();
        assert_eq!(a.direct_score, 110);
        assert_eq!(a.effective_score, 100.0);
    }

    #[test]
    fn test_cycle_broken() {
        let mut graph = fixture();
        graph.edges.insert("dep/b".into(), vec!["dep/a".into()]);
        // must terminate
        let risks = aggregate_modules(&graph);
        assert_eq!(risks.len(), 2);
    }

    #[test]
    fn test_sorted_risk_desc_then_path() {
        let graph = fixture();
        let risks = aggregate_modules(&graph);
        for pair in risks.windows(2) {
            let ge = pair[0].risk_level > pair[1].risk_level
                || (pair[0].risk_level == pair[1].risk_level
                    && pair[0].module <= pair[1].module);
            assert!(ge);
        }
    }

    #[test]
    fn test_depth() {
        let graph = fixture();
        let risks = aggregate_modules(&graph);
        assert_eq!(risks.iter().find(|r| r.module == "dep/a").unwrap().depth, 1);
        assert_eq!(risks.iter().find(|r| r.module == "dep/b").unwrap().depth, 2);
    }
}
