//! `gorisk reachability` — is the dependency actually reached?

use super::{print_json, App, EXIT_OK};
use crate::cli::OutputOpts;
use crate::output::Table;
use gorisk_ir::{Result, RiskLevel};
use std::path::Path;

pub fn run(app: &App, output: &OutputOpts, entry: Option<&Path>) -> Result<i32> {
    let report = app.analyze_with_entry(entry)?;
    let min_risk = output.min_risk.map(|r| r.to_level()).unwrap_or(RiskLevel::Low);

    let rows: Vec<_> = report
        .reachability
        .iter()
        .filter(|r| {
            report
                .graph
                .packages
                .get(&r.package)
                .map(|p| p.capabilities.risk_level() >= min_risk)
                .unwrap_or(false)
        })
        .collect();

    if output.json {
        print_json(&rows)?;
    } else {
        let mut table = Table::new(vec!["PACKAGE", "REACHABLE", "CAPABILITIES", "METHOD"]);
        for row in &rows {
            table.row(vec![
                row.package.clone(),
                if row.reachable { "yes" } else { "no" }.to_string(),
                row.reachable_caps.join(","),
                row.approximation.clone(),
            ]);
        }
        if table.is_empty() {
            println!("no capability-carrying dependencies");
        } else {
            print!("{}", table.render());
            if rows.iter().any(|r| r.approximation == "import-graph") {
                println!("note: import-graph reachability over-approximates; unreached code may be included");
            }
        }
    }
    Ok(EXIT_OK)
}
