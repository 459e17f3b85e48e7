//! `gorisk impact` — blast radius of removing a module

use super::{print_json, split_module_spec, App, EXIT_OK, EXIT_THRESHOLD};
use crate::cli::OutputOpts;
use crate::output::Table;
use gorisk_ir::features::impact;
use gorisk_ir::features::loader::load_project;
use gorisk_ir::Result;

pub fn run(app: &App, spec: &str, output: &OutputOpts) -> Result<i32> {
    let (module, _version) = split_module_spec(spec);
    let graph = load_project(&app.dir, app.lang)?;
    let report = impact::analyze(&graph, &module)?;

    if output.json {
        print_json(&report)?;
    } else {
        println!(
            "removing {}@{} touches {} package(s), {} non-blank line(s), depth {}",
            report.module,
            if report.version.is_empty() { "-" } else { &report.version },
            report.affected_packages.len(),
            report.loc_touched,
            report.depth
        );
        if !report.affected_packages.is_empty() {
            let mut table = Table::new(vec!["PACKAGE", "DEPTH", "LOC"]);
            for pkg in &report.affected_packages {
                table.row(vec![
                    pkg.import_path.clone(),
                    pkg.depth.to_string(),
                    pkg.loc.to_string(),
                ]);
            }
            print!("{}", table.render());
        }
        if !report.affected_mains.is_empty() {
            println!("entry points affected: {}", report.affected_mains.join(", "));
        }
    }

    if report.affected_mains.is_empty() {
        Ok(EXIT_OK)
    } else {
        eprintln!(
            "{} entry point(s) affected by removing {}",
            report.affected_mains.len(),
            report.module
        );
        Ok(EXIT_THRESHOLD)
    }
}
