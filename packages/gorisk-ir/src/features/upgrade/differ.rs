//! Upgrade differ
//!
//! Materializes a module at two versions, runs the loader → scanner → IR
//! → propagator stack on each, and reports the capability delta, the
//! exported-API breaking changes (Go) and the new transitive
//! dependencies.
//!
//! State machine: Idle → Fetching → ScanningOld → ScanningNew → Diffing →
//! Done, with Failed reachable from any state; a failure keeps whatever
//! partial results exist.

use super::api_diff::{self, BreakingChange};
use super::materialize::{materialize, module_deps, CommandRunner};
use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::features::ir_builder::build_ir;
use crate::features::propagation::propagate;
use crate::features::scanner::scan_graph;
use crate::shared::models::{
    Capability, CapabilitySet, DependencyGraph, Language, Module, RiskLevel,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

/// Capabilities whose appearance always counts as an escalation.
const ESCALATION_PRIMITIVES: [Capability; 4] = [
    Capability::Exec,
    Capability::Network,
    Capability::Unsafe,
    Capability::Plugin,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferState {
    Idle,
    Fetching,
    ScanningOld,
    ScanningNew,
    Diffing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapDiff {
    pub package: String,
    pub added: Vec<Capability>,
    pub removed: Vec<Capability>,
    pub escalated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeReport {
    pub module: String,
    pub old_version: String,
    pub new_version: String,
    pub diffs: Vec<CapDiff>,
    pub breaking_changes: Vec<BreakingChange>,
    pub new_transitive_deps: Vec<String>,
    pub risk: RiskLevel,
    pub state: DifferState,
    pub warnings: Vec<String>,
}

impl UpgradeReport {
    fn empty(module: &str, old: &str, new: &str) -> UpgradeReport {
        UpgradeReport {
            module: module.to_string(),
            old_version: old.to_string(),
            new_version: new.to_string(),
            diffs: Vec::new(),
            breaking_changes: Vec::new(),
            new_transitive_deps: Vec::new(),
            risk: RiskLevel::Low,
            state: DifferState::Idle,
            warnings: Vec::new(),
        }
    }

    pub fn escalated(&self) -> bool {
        self.diffs.iter().any(|d| d.escalated)
    }
}

pub struct UpgradeDiffer<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a AnalysisConfig,
}

impl<'a> UpgradeDiffer<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a AnalysisConfig) -> UpgradeDiffer<'a> {
        UpgradeDiffer { runner, config }
    }

    /// Diff `module` between two pinned versions.
    pub fn diff(
        &self,
        language: Language,
        module: &str,
        old_version: &str,
        new_version: &str,
    ) -> UpgradeReport {
        let mut report = UpgradeReport::empty(module, old_version, new_version);

        // ── Fetching (both versions, bounded concurrency) ───────────────
        report.state = DifferState::Fetching;
        let (old_scratch, new_scratch) = match (tempfile::tempdir(), tempfile::tempdir()) {
            (Ok(a), Ok(b)) => (a, b),
            _ => {
                report.state = DifferState::Failed;
                report.warnings.push("cannot create scratch workspace".into());
                return report;
            }
        };

        let timeout = self.config.network_timeout;
        let (old_dir, new_dir) = std::thread::scope(|scope| {
            let old = scope.spawn(|| {
                materialize(self.runner, language, module, old_version, old_scratch.path(), timeout)
            });
            let new = scope.spawn(|| {
                materialize(self.runner, language, module, new_version, new_scratch.path(), timeout)
            });
            (old.join(), new.join())
        });
        let old_dir = match old_dir {
            Ok(Ok(dir)) => Some(dir),
            Ok(Err(e)) => {
                report.warnings.push(format!("{module}@{old_version}: {e}"));
                None
            }
            Err(_) => {
                report.warnings.push("materialization thread panicked".into());
                None
            }
        };
        let new_dir = match new_dir {
            Ok(Ok(dir)) => Some(dir),
            Ok(Err(e)) => {
                report.warnings.push(format!("{module}@{new_version}: {e}"));
                None
            }
            Err(_) => {
                report.warnings.push("materialization thread panicked".into());
                None
            }
        };
        let (Some(old_dir), Some(new_dir)) = (old_dir, new_dir) else {
            report.state = DifferState::Failed;
            return report;
        };

        // ── Scanning ────────────────────────────────────────────────────
        report.state = DifferState::ScanningOld;
        let old_caps = match self.capabilities_of(language, module, old_version, &old_dir) {
            Ok(caps) => caps,
            Err(e) => {
                report.state = DifferState::Failed;
                report.warnings.push(format!("scan old: {e}"));
                return report;
            }
        };
        report.state = DifferState::ScanningNew;
        let new_caps = match self.capabilities_of(language, module, new_version, &new_dir) {
            Ok(caps) => caps,
            Err(e) => {
                report.state = DifferState::Failed;
                report.warnings.push(format!("scan new: {e}"));
                return report;
            }
        };

        // ── Diffing ─────────────────────────────────────────────────────
        report.state = DifferState::Diffing;
        report.diffs = diff_capabilities(&old_caps, &new_caps);

        report.breaking_changes = api_diff::diff_signatures(
            &api_diff::exported_signatures(language, &old_dir),
            &api_diff::exported_signatures(language, &new_dir),
        );

        let old_deps: BTreeSet<String> = module_deps(language, &old_dir).into_iter().collect();
        report.new_transitive_deps = module_deps(language, &new_dir)
            .into_iter()
            .filter(|d| !old_deps.contains(d))
            .collect();

        report.risk = if !report.breaking_changes.is_empty() || report.escalated() {
            RiskLevel::High
        } else if !report.new_transitive_deps.is_empty() {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
        report.state = DifferState::Done;
        info!(
            %module,
            old = %old_version,
            new = %new_version,
            risk = %report.risk,
            "upgrade diff complete"
        );
        report
    }

    /// Per-subpackage effective capability sets for one materialized
    /// version: scan evidence plus propagated transitive capabilities.
    fn capabilities_of(
        &self,
        language: Language,
        module: &str,
        version: &str,
        dir: &Path,
    ) -> Result<BTreeMap<String, CapabilitySet>> {
        let mut graph = DependencyGraph::new(
            language,
            Module {
                path: "gorisk.scratch/materialize".into(),
                is_main: true,
                ..Default::default()
            },
        );
        let target = Module {
            path: module.to_string(),
            version: version.to_string(),
            dir: Some(dir.to_path_buf()),
            is_main: false,
            is_indirect: false,
            packages: Vec::new(),
        };
        graph.modules.insert(module.to_string(), target);
        let packages = super::discover_module_packages(language, module, dir);
        if let Some(owner) = graph.modules.get_mut(module) {
            owner.packages = packages.iter().map(|p| p.import_path.clone()).collect();
        }
        for pkg in packages {
            graph.packages.insert(pkg.import_path.clone(), pkg);
        }

        let scans = scan_graph(&graph, self.config)?;
        let ir = build_ir(&graph, &scans);
        let propagation = propagate(&ir, self.config);

        let mut out = BTreeMap::new();
        for (path, _) in &graph.packages {
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
            out.insert(path.clone(), caps);
        }
        Ok(out)
    }
}

/// Per-package added/removed capabilities; escalation when a high-weight
/// primitive appears or the score strictly increases.
fn diff_capabilities(
    old: &BTreeMap<String, CapabilitySet>,
    new: &BTreeMap<String, CapabilitySet>,
) -> Vec<CapDiff> {
    let empty = CapabilitySet::new();
    let packages: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

    let mut diffs = Vec::new();
    for package in packages {
        let old_caps = old.get(package).unwrap_or(&empty);
        let new_caps = new.get(package).unwrap_or(&empty);

        let added: Vec<Capability> = new_caps
            .capabilities()
            .filter(|c| !old_caps.contains(*c))
            .collect();
        let removed: Vec<Capability> = old_caps
            .capabilities()
            .filter(|c| !new_caps.contains(*c))
            .collect();
        if added.is_empty() && removed.is_empty() {
            continue;
        }

        let escalated = added.iter().any(|c| ESCALATION_PRIMITIVES.contains(c))
            || new_caps.score() > old_caps.score();
        if escalated {
            warn!(%package, ?added, "capability escalation");
        }
        diffs.push(CapDiff {
            package: package.clone(),
            added,
            removed,
            escalated,
        });
    }
    diffs
}
