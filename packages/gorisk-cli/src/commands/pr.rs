//! `gorisk pr` — dependency changes between two git refs

use super::{print_json, App, EXIT_OK, EXIT_THRESHOLD};
use crate::cli::OutputOpts;
use crate::output::Table;
use crate::prdiff::{self, PrReport};
use gorisk_ir::features::loader::load_project;
use gorisk_ir::{Result, RiskLevel};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrOutput {
    #[serde(flatten)]
    report: PrReport,
    /// Risk of added dependencies resolved against the current analysis.
    added_risk: Vec<(String, RiskLevel)>,
}

pub fn run(app: &App, base: &str, head: &str, output: &OutputOpts) -> Result<i32> {
    let graph = load_project(&app.dir, app.lang)?;
    let report = prdiff::diff_refs(&app.dir, graph.language, base, head)?;

    // Resolve the risk of newly-added deps with a full analysis of the
    // working tree (assumed to match `head`).
    let analysis = app.analyze()?;
    let added_risk: Vec<(String, RiskLevel)> = report
        .added
        .iter()
        .map(|change| {
            let level = analysis
                .modules
                .iter()
                .find(|m| m.module == change.module)
                .map(|m| m.risk_level)
                .unwrap_or(RiskLevel::Low);
            (change.module.clone(), level)
        })
        .collect();

    if output.json {
        print_json(&PrOutput {
            report: report.clone(),
            added_risk: added_risk.clone(),
        })?;
    } else {
        println!("dependency changes {} → {}", report.base, report.head);
        let mut table = Table::new(vec!["CHANGE", "MODULE", "OLD", "NEW"]);
        for change in &report.added {
            table.row(vec![
                "added".to_string(),
                change.module.clone(),
                "-".to_string(),
                change.new_version.clone().unwrap_or_default(),
            ]);
        }
        for change in &report.removed {
            table.row(vec![
                "removed".to_string(),
                change.module.clone(),
                change.old_version.clone().unwrap_or_default(),
                "-".to_string(),
            ]);
        }
        for change in &report.updated {
            table.row(vec![
                "updated".to_string(),
                change.module.clone(),
                change.old_version.clone().unwrap_or_default(),
                change.new_version.clone().unwrap_or_default(),
            ]);
        }
        if table.is_empty() {
            println!("no dependency changes");
        } else {
            print!("{}", table.render());
        }
    }

    let new_high: Vec<&str> = added_risk
        .iter()
        .filter(|(_, level)| *level == RiskLevel::High)
        .map(|(module, _)| module.as_str())
        .collect();
    if new_high.is_empty() {
        Ok(EXIT_OK)
    } else {
        eprintln!("new HIGH-risk dependencies: {}", new_high.join(", "));
        Ok(EXIT_THRESHOLD)
    }
}
