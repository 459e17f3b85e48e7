//! `gorisk scan` — aggregated report and CI gate

use super::{load_cves, print_json, App, EXIT_OK, EXIT_THRESHOLD};
use crate::cli::{OutputOpts, RiskArg};
use crate::output::{sarif, Table};
use gorisk_ir::features::aggregation::aggregate_modules;
use gorisk_ir::features::policy::{Policy, PolicyStats};
use gorisk_ir::features::reachability::ReachabilityReport;
use gorisk_ir::features::scoring::composite_score;
use gorisk_ir::features::taint::TaintFinding;
use gorisk_ir::{Capability, CapabilitySet, DependencyGraph, Result, RiskLevel};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanOutput {
    checksum: String,
    cancelled: bool,
    modules: Vec<ModuleRow>,
    taint: Vec<TaintFinding>,
    policy: PolicyStats,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModuleRow {
    module: String,
    version: String,
    effective_score: f64,
    composite: f64,
    risk_level: RiskLevel,
    capabilities: Vec<String>,
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    app: &App,
    output: &OutputOpts,
    sarif_out: bool,
    fail_on: Option<RiskArg>,
    policy_path: Option<&Path>,
    cves_path: Option<&Path>,
) -> Result<i32> {
    let policy = match policy_path {
        Some(path) => Policy::load(path)?,
        None => Policy::default(),
    };
    let cves = load_cves(cves_path)?;
    let report = app.analyze_with(cves.as_ref())?;

    // Policy application over package-level capability findings.
    let mut package_caps: BTreeMap<String, Vec<Capability>> = report
        .graph
        .packages
        .iter()
        .filter(|(_, p)| !p.capabilities.is_empty())
        .map(|(path, p)| (path.clone(), p.capabilities.capabilities().collect()))
        .collect();
    let mut taint = report.taint.clone();
    let today = chrono::Utc::now().date_naive();
    let stats = policy.apply(&mut package_caps, &mut taint, today);

    // Exceptions apply before output assembly: rebuild the package
    // capability sets from the surviving {package → capability} pairs and
    // re-aggregate, so the displayed levels, the SARIF results and the
    // threshold gate all see the filtered findings.
    let mut filtered_graph = report.graph.clone();
    for (path, package) in filtered_graph.packages.iter_mut() {
        let survivors = package_caps.get(path);
        let mut caps = CapabilitySet::new();
        for (cap, evidence) in package.capabilities.iter() {
            if survivors.map_or(false, |kept| kept.contains(&cap)) {
                for ev in evidence {
                    caps.add(cap, ev.clone());
                }
            }
        }
        package.capabilities = caps;
    }
    let filtered_modules = aggregate_modules(&filtered_graph);

    let modules: Vec<ModuleRow> = filtered_modules
        .iter()
        .map(|m| {
            let module_taint: Vec<TaintFinding> = taint
                .iter()
                .filter(|t| {
                    filtered_graph
                        .module_of(&t.package)
                        .map_or(false, |owner| owner.path == m.module)
                })
                .cloned()
                .collect();
            let reachable = module_reachability(&filtered_graph, &m.module, &report.reachability);
            let composite = composite_score(
                m.direct_score,
                reachable,
                cves.cve_count(&m.module, &m.version),
                &module_taint,
            );
            ModuleRow {
                module: m.module.clone(),
                version: m.version.clone(),
                effective_score: m.effective_score,
                composite: composite.composite,
                risk_level: m.risk_level,
                capabilities: m.capabilities.clone(),
            }
        })
        .collect();

    if sarif_out {
        println!(
            "{}",
            serde_json::to_string_pretty(&sarif::render(&filtered_graph))?
        );
    } else if output.json {
        print_json(&ScanOutput {
            checksum: report.checksum.clone(),
            cancelled: report.cancelled,
            modules,
            taint: taint.clone(),
            policy: stats,
        })?;
    } else {
        let mut table = Table::new(vec!["MODULE", "VERSION", "COMPOSITE", "RISK", "CAPABILITIES"]);
        for row in &modules {
            table.row(vec![
                row.module.clone(),
                row.version.clone(),
                format!("{:.1}", row.composite),
                row.risk_level.to_string(),
                row.capabilities.join(","),
            ]);
        }
        if table.is_empty() {
            println!("no dependency modules");
        } else {
            print!("{}", table.render());
        }
        if !taint.is_empty() {
            println!();
            let mut taint_table = Table::new(vec!["PACKAGE", "FLOW", "RISK"]);
            for finding in &taint {
                taint_table.row(vec![
                    finding.package.clone(),
                    format!("{}→{}", finding.source, finding.sink),
                    finding.risk.to_string(),
                ]);
            }
            print!("{}", taint_table.render());
        }
        if stats.applied > 0 || stats.expired > 0 {
            println!(
                "policy: {} applied, {} expired, {} taint findings suppressed",
                stats.applied, stats.expired, stats.taint_suppressed
            );
        }
    }

    // Gate on the post-policy levels; the flag wins over the policy file.
    let threshold = fail_on.map(|r| r.to_level()).or(policy.fail_on);
    if let Some(threshold) = threshold {
        let breached = filtered_modules
            .iter()
            .filter(|m| m.risk_level >= threshold)
            .count();
        if breached > 0 {
            eprintln!(
                "risk threshold {threshold} breached by {breached} module(s)"
            );
            return Ok(EXIT_THRESHOLD);
        }
    }
    Ok(EXIT_OK)
}

/// `Some(true)` when any of the module's packages is reachable,
/// `Some(false)` when all its packages reported unreachable, `None` when
/// the module never appears in the reachability reports.
fn module_reachability(
    graph: &DependencyGraph,
    module_path: &str,
    reports: &[ReachabilityReport],
) -> Option<bool> {
    let module = graph.modules.get(module_path)?;
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
