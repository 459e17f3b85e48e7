//! `gorisk upgrade` and `gorisk diff` — two-version capability deltas

use super::{print_json, split_module_spec, App, EXIT_OK, EXIT_THRESHOLD, EXIT_USAGE};
use crate::cli::OutputOpts;
use crate::output::Table;
use gorisk_ir::features::loader::load_project;
use gorisk_ir::features::upgrade::{SystemRunner, UpgradeDiffer, UpgradeReport};
use gorisk_ir::{GoriskError, Language, Result, RiskLevel};

/// `upgrade <module@newVersion>`: old version comes from the lockfile.
pub fn run_upgrade(app: &App, spec: &str, output: &OutputOpts) -> Result<i32> {
    let (module, new_version) = split_module_spec(spec);
    let Some(new_version) = new_version else {
        return Err(GoriskError::config("upgrade target must be module@version"));
    };

    let graph = load_project(&app.dir, app.lang)?;
    let Some(current) = graph.modules.get(&module) else {
        eprintln!("module {module} is not a dependency of this project");
        return Ok(EXIT_USAGE);
    };
    let old_version = current.version.clone();

    let report = diff_versions(app, graph.language, &module, &old_version, &new_version);
    render(&report, output)?;
    // Upgrade gate: exit 1 on HIGH risk.
    if report.risk == RiskLevel::High {
        eprintln!(
            "upgrade {}: {} → {} is HIGH risk",
            module, old_version, new_version
        );
        return Ok(EXIT_THRESHOLD);
    }
    Ok(EXIT_OK)
}

/// `diff <module@old> <module@new>`.
pub fn run_diff(app: &App, old_spec: &str, new_spec: &str, output: &OutputOpts) -> Result<i32> {
    let (old_module, old_version) = split_module_spec(old_spec);
    let (new_module, new_version) = split_module_spec(new_spec);
    let (Some(old_version), Some(new_version)) = (old_version, new_version) else {
        return Err(GoriskError::config("diff arguments must be module@version"));
    };
    if old_module != new_module {
        return Err(GoriskError::config("diff arguments must name the same module"));
    }

    let language = match app.lang {
        Some(lang) => lang,
        None => load_project(&app.dir, None)?.language,
    };
    let report = diff_versions(app, language, &old_module, &old_version, &new_version);
    render(&report, output)?;
    // Diff gate: exit 1 on escalation.
    if report.escalated() {
        eprintln!(
            "capability escalation in {}: {} → {}",
            old_module, old_version, new_version
        );
        return Ok(EXIT_THRESHOLD);
    }
    Ok(EXIT_OK)
}

fn diff_versions(
    app: &App,
    language: Language,
    module: &str,
    old_version: &str,
    new_version: &str,
) -> UpgradeReport {
    let runner = SystemRunner;
    UpgradeDiffer::new(&runner, &app.config).diff(language, module, old_version, new_version)
}

fn render(report: &UpgradeReport, output: &OutputOpts) -> Result<()> {
    if output.json {
        return print_json(report);
    }

    println!(
        "{}: {} → {}  risk: {}",
        report.module, report.old_version, report.new_version, report.risk
    );
    if !report.diffs.is_empty() {
        let mut table = Table::new(vec!["PACKAGE", "ADDED", "REMOVED", "ESCALATED"]);
        for diff in &report.diffs {
            table.row(vec![
                diff.package.clone(),
                diff.added
                    .iter()
                    .map(|c| c.name())
                    .collect::<Vec<_>>()
                    .join(","),
                diff.removed
                    .iter()
                    .map(|c| c.name())
                    .collect::<Vec<_>>()
                    .join(","),
                if diff.escalated { "yes" } else { "no" }.to_string(),
            ]);
        }
        print!("{}", table.render());
    } else {
        println!("no capability changes");
    }
    for change in &report.breaking_changes {
        println!(
            "breaking: {:?} {} {} -> {}",
            change.kind,
            change.symbol,
            change.old_sig.as_deref().unwrap_or("-"),
            change.new_sig.as_deref().unwrap_or("-")
        );
    }
    if !report.new_transitive_deps.is_empty() {
        println!("new transitive deps: {}", report.new_transitive_deps.join(", "));
    }
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}
