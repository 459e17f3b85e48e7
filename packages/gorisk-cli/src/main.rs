//! gorisk — dependency capability and risk analysis
//!
//! Exit codes: 0 ok, 1 risk threshold exceeded, 2 invocation error.

use clap::Parser;
use gorisk_cli::cli::{Cli, Command};
use gorisk_cli::commands::{self, App, EXIT_USAGE};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::new(cli.dir.clone(), cli.lang.to_language());

    let result = match &cli.command {
        Command::Capabilities { output } => commands::capabilities::run(&app, output),
        Command::Graph { output } => commands::graph::run(&app, output),
        Command::Scan {
            output,
            sarif,
            fail_on,
            policy,
            cves,
        } => commands::scan::run(
            &app,
            output,
            *sarif,
            *fail_on,
            policy.as_deref(),
            cves.as_deref(),
        ),
        Command::Reachability { output, entry } => {
            commands::reachability::run(&app, output, entry.as_deref())
        }
        Command::Impact { module, output } => commands::impact::run(&app, module, output),
        Command::Upgrade { module, output } => commands::upgrade::run_upgrade(&app, module, output),
        Command::Diff { old, new, output } => commands::upgrade::run_diff(&app, old, new, output),
        Command::Pr { base, head, output } => commands::pr::run(&app, base, head, output),
        Command::History { action } => commands::history_cmd::run(&app, action),
        Command::Sbom { format } => commands::sbom::run(&app, format),
        Command::Licenses {
            output,
            fail_on_risky,
        } => commands::licenses_cmd::run(&app, output, *fail_on_risky),
        Command::Explain { cap, output } => {
            commands::explain::run(&app, cap.as_deref(), output)
        }
    };

    match result {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("gorisk: {err}");
            ExitCode::from(EXIT_USAGE as u8)
        }
    }
}
