//! `gorisk capabilities` — per-package capability sets

use super::{print_json, App, EXIT_OK};
use crate::cli::OutputOpts;
use crate::output::Table;
use gorisk_ir::{Result, RiskLevel};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Row {
    package: String,
    module: String,
    capabilities: Vec<String>,
    score: u32,
    risk_level: RiskLevel,
}

pub fn run(app: &App, output: &OutputOpts) -> Result<i32> {
    let report = app.analyze()?;
    let min_risk = output.min_risk.map(|r| r.to_level()).unwrap_or(RiskLevel::Low);

    let mut rows: Vec<Row> = report
        .graph
        .packages
        .values()
        .filter(|p| !p.capabilities.is_empty())
        .map(|p| Row {
            package: p.import_path.clone(),
            module: p.module_ref.clone(),
            capabilities: p.capabilities.names().into_iter().map(String::from).collect(),
            score: p.capabilities.score(),
            risk_level: p.capabilities.risk_level(),
        })
        .filter(|r| r.risk_level >= min_risk)
        .collect();
    rows.sort_by(|a, b| {
        b.risk_level
            .cmp(&a.risk_level)
            .then_with(|| a.module.cmp(&b.module))
            .then_with(|| a.package.cmp(&b.package))
    });

    if output.json {
        print_json(&rows)?;
    } else {
        let mut table = Table::new(vec!["PACKAGE", "CAPABILITIES", "SCORE", "RISK"]);
        for row in &rows {
            table.row(vec![
                row.package.clone(),
                row.capabilities.join(","),
                row.score.to_string(),
                row.risk_level.to_string(),
            ]);
        }
        if table.is_empty() {
            println!("no capabilities detected");
        } else {
            print!("{}", table.render());
        }
    }
    Ok(EXIT_OK)
}
