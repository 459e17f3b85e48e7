//! IR builder
//!
//! Combines per-package scanner output into one `IrGraph` for the whole
//! analysis. Guarantee: every call-edge endpoint is either present in
//! `functions` or flagged `synthetic` (stdlib / unresolved external).

use crate::features::scanner::PackageScan;
use crate::shared::models::{CallEdge, DependencyGraph, FunctionCaps, Symbol};
use std::collections::BTreeMap;
use tracing::info;

/// The normalized intermediate representation: function capability nodes
/// plus call edges.
#[derive(Debug, Clone, Default)]
pub struct IrGraph {
    pub functions: BTreeMap<Symbol, FunctionCaps>,
    pub calls: Vec<CallEdge>,
}

impl IrGraph {
    /// Functions belonging to one package, in symbol order.
    pub fn functions_of<'a>(&'a self, import_path: &'a str) -> impl Iterator<Item = &'a FunctionCaps> {
        self.functions
            .values()
            .filter(move |f| f.symbol.package == import_path)
    }

    /// Edges usable for propagation: both endpoints known.
    pub fn propagation_edges(&self) -> impl Iterator<Item = &CallEdge> {
        self.calls.iter().filter(|e| !e.synthetic)
    }
}

/// Build the IR from scans. Cross-package edges stay real when the callee
/// package was scanned and defines the callee symbol (the loader's type
/// information already resolved the import path); everything else is
/// marked synthetic but retained for reachability.
pub fn build_ir(_graph: &DependencyGraph, scans: &BTreeMap<String, PackageScan>) -> IrGraph {
    let mut functions: BTreeMap<Symbol, FunctionCaps> = BTreeMap::new();
    for scan in scans.values() {
        for (symbol, caps) in &scan.functions {
            let entry = functions
                .entry(symbol.clone())
                .or_insert_with(|| FunctionCaps::new(symbol.clone()));
            entry.direct.merge(caps);
        }
    }

    let mut calls = Vec::new();
    for scan in scans.values() {
        for edge in &scan.calls {
            let mut edge = edge.clone();
            let known = functions.contains_key(&edge.callee)
                || matching_method(&functions, &edge.callee).is_some();
            if let Some(resolved) = matching_method(&functions, &edge.callee) {
                edge.callee = resolved;
            }
            edge.synthetic = !known;
            calls.push(edge);
        }
    }
    calls.sort_by(|a, b| {
        (&a.file, a.line, &a.caller, &a.callee).cmp(&(&b.file, b.line, &b.caller, &b.callee))
    });

    let resolved = calls.iter().filter(|e| !e.synthetic).count();
    info!(
        functions = functions.len(),
        edges = calls.len(),
        resolved,
        "IR assembled"
    );
    IrGraph { functions, calls }
}

/// A scanner emits callee symbols with `kind = Func`; the definition may
/// be a method of the same name in the same package.
fn matching_method(
    functions: &BTreeMap<Symbol, FunctionCaps>,
    callee: &Symbol,
) -> Option<Symbol> {
    let as_method = Symbol::method(&callee.package, &callee.name);
    functions.contains_key(&as_method).then_some(as_method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{CapabilitySet, Language, Module};

    fn scan_with(
        import_path: &str,
        funcs: Vec<Symbol>,
        calls: Vec<CallEdge>,
    ) -> (String, PackageScan) {
        let mut scan = PackageScan {
            import_path: import_path.to_string(),
            ..Default::default()
        };
        for f in funcs {
            scan.functions.insert(f, CapabilitySet::new());
        }
        scan.calls = calls;
        (import_path.to_string(), scan)
    }

    fn empty_graph() -> DependencyGraph {
        DependencyGraph::new(
            Language::Go,
            Module {
                path: "m".into(),
                is_main: true,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_endpoints_known_or_synthetic() {
        let a = Symbol::func("p", "a");
        let b = Symbol::func("p", "b");
        let stdlib = Symbol::func("os/exec", "Command");

        let mut scans = BTreeMap::new();
        let (k, v) = scan_with(
            "p",
            vec![a.clone(), b.clone()],
            vec![
                CallEdge::new(a.clone(), b.clone(), "f.go", 3),
                CallEdge::new(a.clone(), stdlib.clone(), "f.go", 4),
            ],
        );
        scans.insert(k, v);

        let ir = build_ir(&empty_graph(), &scans);
        for edge in &ir.calls {
            assert!(ir.functions.contains_key(&edge.callee) || edge.synthetic);
        }
        assert_eq!(ir.propagation_edges().count(), 1);
    }

    #[test]
    fn test_cross_package_edge_resolves() {
        let caller = Symbol::func("app", "main");
        let callee = Symbol::func("dep", "Helper");

        let mut scans = BTreeMap::new();
        let (k, v) = scan_with(
            "app",
            vec![caller.clone()],
            vec![CallEdge::new(caller.clone(), callee.clone(), "main.go", 5)],
        );
        scans.insert(k, v);
        let (k, v) = scan_with("dep", vec![callee.clone()], vec![]);
        scans.insert(k, v);

        let ir = build_ir(&empty_graph(), &scans);
        assert_eq!(ir.propagation_edges().count(), 1);
    }

    #[test]
    fn test_method_fallback_resolution() {
        let caller = Symbol::func("p", "a");
        let method = Symbol::method("p", "Run");

        let mut scans = BTreeMap::new();
        let (k, mut v) = scan_with("p", vec![caller.clone()], vec![]);
        v.functions.insert(method.clone(), CapabilitySet::new());
        v.calls = vec![CallEdge::new(
            caller.clone(),
            Symbol::func("p", "Run"),
            "f.go",
            2,
        )];
        scans.insert(k, v);

        let ir = build_ir(&empty_graph(), &scans);
        assert_eq!(ir.calls[0].callee, method);
        assert!(!ir.calls[0].synthetic);
    }
}
