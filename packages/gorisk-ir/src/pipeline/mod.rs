//! Pipeline orchestration
//!
//! The driver runs the stages in order — load → scan → IR → propagate →
//! aggregate → reachability → taint → composite — each consuming the
//! previous stage's immutable output. Cancellation yields partial results
//! flagged `cancelled = true` instead of an error.

use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::features::aggregation::{aggregate_modules, ModuleRisk};
use crate::features::ir_builder::{build_ir, IrGraph};
use crate::features::loader::load_project;
use crate::features::propagation::{propagate, FunctionSummary, PropagationState};
use crate::features::reachability::{self, ReachabilityReport};
use crate::features::scanner::scan_graph;
use crate::features::scoring::{composite_score, CompositeScore, CveProvider};
use crate::features::taint::{self, TaintFinding};
use crate::shared::models::{DependencyGraph, Language};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Everything one analysis invocation produces. Downstream consumers
/// (rendering, policy, CI gating) borrow this read-only.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub graph: DependencyGraph,
    pub ir: IrGraph,
    pub modules: Vec<ModuleRisk>,
    pub reachability: Vec<ReachabilityReport>,
    pub taint: Vec<TaintFinding>,
    /// Module path → composite score.
    pub composite: BTreeMap<String, CompositeScore>,
    /// Context-node canonical string → summary (feeds `explain`).
    pub summaries: BTreeMap<String, FunctionSummary>,
    /// Per-function propagation states.
    pub states: BTreeMap<crate::shared::models::Symbol, PropagationState>,
    pub checksum: String,
    pub passes: u32,
    pub converged: bool,
    pub cancelled: bool,
}

pub struct AnalysisPipeline {
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    pub fn new(config: AnalysisConfig) -> Result<AnalysisPipeline> {
        config.validate()?;
        Ok(AnalysisPipeline { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the full pipeline over the project at `dir`.
    pub fn analyze(
        &self,
        dir: &Path,
        lang: Option<Language>,
        entry_file: Option<&Path>,
        cves: &dyn CveProvider,
    ) -> Result<AnalysisReport> {
        let mut graph = load_project(dir, lang)?;
        info!(
            language = %graph.language,
            modules = graph.modules.len(),
            packages = graph.packages.len(),
            "dependency graph loaded"
        );

        let scans = scan_graph(&graph, &self.config)?;
        let ir = build_ir(&graph, &scans);
        let propagation = propagate(&ir, &self.config);

        // Project function results onto packages: scan evidence plus the
        // propagated transitive capabilities of the package's functions.
        for (path, package) in graph.packages.iter_mut() {
            let mut caps = scans
                .get(path)
                .map(|s| s.caps.clone())
                .unwrap_or_default();
            for function in propagation
                .functions
                .values()
                .filter(|f| f.symbol.package == *path)
            {
                caps.merge(&function.transitive);
            }
            package.capabilities = caps;
        }

        let modules = aggregate_modules(&graph);
        let reach = reachability::analyze(&graph, &ir, entry_file);
        let taint_findings = taint::analyze(&propagation);

        let mut composite = BTreeMap::new();
        for module_risk in &modules {
            let module = &graph.modules[&module_risk.module];
            let reachable = module_reachability(module, &reach);
            let module_taint: Vec<TaintFinding> = taint_findings
                .iter()
                .filter(|t| {
                    graph
                        .module_of(&t.package)
                        .map_or(false, |m| m.path == module.path)
                })
                .cloned()
                .collect();
            composite.insert(
                module.path.clone(),
                composite_score(
                    module_risk.direct_score,
                    reachable,
                    cves.cve_count(&module.path, &module.version),
                    &module_taint,
                ),
            );
        }

        let checksum = graph.checksum();
        let cancelled = self.config.cancel.is_cancelled();
        Ok(AnalysisReport {
            graph,
            ir,
            modules,
            reachability: reach,
            taint: taint_findings,
            composite,
            summaries: propagation.summaries,
            states: propagation.states,
            checksum,
            passes: propagation.passes,
            converged: propagation.converged,
            cancelled,
        })
    }
}

/// Module reachability: `Some(true)` when any package is reachable,
/// `Some(false)` when all reported unreachable, `None` when the module
/// never appears in the reports (no capabilities to reach).
fn module_reachability(
    module: &crate::shared::models::Module,
    reports: &[ReachabilityReport],
) -> Option<bool> {
    let mut saw = false;
    for report in reports {
        if module.packages.iter().any(|p| *p == report.package) {
            if report.reachable {
                return Some(true);
            }
            saw = true;
        }
    }
    saw.then_some(false)
}
