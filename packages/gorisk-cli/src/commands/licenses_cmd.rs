//! `gorisk licenses` — license per module

use super::{print_json, App, EXIT_OK, EXIT_THRESHOLD};
use crate::cli::OutputOpts;
use crate::licenses::{self, ReqwestFetcher, GITHUB_TOKEN_ENV};
use crate::output::Table;
use gorisk_ir::features::loader::load_project;
use gorisk_ir::Result;

pub fn run(app: &App, output: &OutputOpts, fail_on_risky: bool) -> Result<i32> {
    let graph = load_project(&app.dir, app.lang)?;

    // Online lookup only when a token is configured; offline heuristics
    // otherwise.
    let fetcher = ReqwestFetcher;
    let online = std::env::var(GITHUB_TOKEN_ENV).is_ok();
    let reports = licenses::analyze(
        &graph,
        online.then_some(&fetcher as &dyn licenses::HttpFetcher),
        app.config.network_timeout,
    );

    if output.json {
        print_json(&reports)?;
    } else {
        let mut table = Table::new(vec!["MODULE", "VERSION", "LICENSE", "RISKY"]);
        for report in &reports {
            table.row(vec![
                report.module.clone(),
                report.version.clone(),
                report.license.clone(),
                if report.risky { "yes" } else { "no" }.to_string(),
            ]);
        }
        if table.is_empty() {
            println!("no dependency modules");
        } else {
            print!("{}", table.render());
        }
    }

    let risky = reports.iter().filter(|r| r.risky).count();
    if fail_on_risky && risky > 0 {
        eprintln!("{risky} module(s) with risky or unknown licenses");
        return Ok(EXIT_THRESHOLD);
    }
    Ok(EXIT_OK)
}
