//! `gorisk graph` — module-level transitive and composite risk

use super::{print_json, App, EXIT_OK};
use crate::cli::OutputOpts;
use crate::output::Table;
use gorisk_ir::{Result, RiskLevel};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Row {
    module: String,
    version: String,
    direct_score: u32,
    transitive_score: f64,
    effective_score: f64,
    composite: Option<f64>,
    depth: u32,
    risk_level: RiskLevel,
    capabilities: Vec<String>,
}

pub fn run(app: &App, output: &OutputOpts) -> Result<i32> {
    let report = app.analyze()?;
    let min_risk = output.min_risk.map(|r| r.to_level()).unwrap_or(RiskLevel::Low);

    let rows: Vec<Row> = report
        .modules
        .iter()
        .filter(|m| m.risk_level >= min_risk)
        .map(|m| Row {
            module: m.module.clone(),
            version: m.version.clone(),
            direct_score: m.direct_score,
            transitive_score: m.transitive_score,
            effective_score: m.effective_score,
            composite: report.composite.get(&m.module).map(|c| c.composite),
            depth: m.depth,
            risk_level: m.risk_level,
            capabilities: m.capabilities.clone(),
        })
        .collect();

    if output.json {
        print_json(&rows)?;
    } else {
        let mut table = Table::new(vec![
            "MODULE", "VERSION", "DIRECT", "TRANSITIVE", "EFFECTIVE", "COMPOSITE", "DEPTH", "RISK",
        ]);
        for row in &rows {
            table.row(vec![
                row.module.clone(),
                row.version.clone(),
                row.direct_score.to_string(),
                format!("{:.1}", row.transitive_score),
                format!("{:.1}", row.effective_score),
                row.composite
                    .map(|c| format!("{c:.1}"))
                    .unwrap_or_else(|| "-".into()),
                row.depth.to_string(),
                row.risk_level.to_string(),
            ]);
        }
        if table.is_empty() {
            println!("no dependency modules");
        } else {
            print!("{}", table.render());
        }
    }
    Ok(EXIT_OK)
}
