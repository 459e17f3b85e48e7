//! `gorisk history` — snapshot record / diff / show / trend

use super::{print_json, App, EXIT_OK, EXIT_USAGE};
use crate::cli::{HistoryAction, OutputOpts};
use crate::history::{diff_snapshots, HistoryStore, Snapshot};
use crate::output::{sparkline, Table};
use gorisk_ir::Result;
use std::collections::BTreeMap;

pub fn run(app: &App, action: &HistoryAction) -> Result<i32> {
    match action {
        HistoryAction::Record { output } => record(app, output),
        HistoryAction::Show { index, output } => show(app, *index, output),
        HistoryAction::Diff { old, new, output } => diff(app, *old, *new, output),
        HistoryAction::Trend { module, output } => trend(app, module.as_deref(), output),
    }
}

fn head_commit(app: &App) -> Option<String> {
    git2::Repository::discover(&app.dir)
        .ok()
        .and_then(|repo| repo.head().ok().and_then(|h| h.target()))
        .map(|oid| oid.to_string())
}

fn record(app: &App, output: &OutputOpts) -> Result<i32> {
    let report = app.analyze()?;
    let snapshot = Snapshot::from_report(&report, head_commit(app));
    let mut store = HistoryStore::load(&app.dir)?;
    store.record(&app.dir, snapshot)?;

    if output.json {
        print_json(&serde_json::json!({ "recorded": true, "snapshots": store.len() }))?;
    } else {
        println!("snapshot {} recorded", store.len() - 1);
    }
    Ok(EXIT_OK)
}

fn show(app: &App, index: Option<usize>, output: &OutputOpts) -> Result<i32> {
    let store = HistoryStore::load(&app.dir)?;
    let snapshot = match index {
        Some(i) => store.get(i),
        None => store.latest(),
    };
    let Some(snapshot) = snapshot else {
        eprintln!("no such snapshot");
        return Ok(EXIT_USAGE);
    };

    if output.json {
        print_json(snapshot)?;
    } else {
        println!(
            "snapshot at {}{}",
            snapshot.timestamp.to_rfc3339(),
            snapshot
                .commit
                .as_deref()
                .map(|c| format!(" (commit {c})"))
                .unwrap_or_default()
        );
        let mut table = Table::new(vec!["MODULE", "VERSION", "SCORE", "RISK", "CAPABILITIES"]);
        for module in &snapshot.modules {
            table.row(vec![
                module.path.clone(),
                module.version.clone(),
                format!("{:.1}", module.effective_score),
                module.risk_level.to_string(),
                module.capabilities.join(","),
            ]);
        }
        print!("{}", table.render());
    }
    Ok(EXIT_OK)
}

fn diff(app: &App, old: Option<usize>, new: Option<usize>, output: &OutputOpts) -> Result<i32> {
    let store = HistoryStore::load(&app.dir)?;
    if store.len() < 2 && (old.is_none() || new.is_none()) {
        eprintln!("need at least two snapshots to diff");
        return Ok(EXIT_USAGE);
    }
    let old_idx = old.unwrap_or(store.len().saturating_sub(2));
    let new_idx = new.unwrap_or(store.len() - 1);
    let (Some(old_snap), Some(new_snap)) = (store.get(old_idx), store.get(new_idx)) else {
        eprintln!("no such snapshot");
        return Ok(EXIT_USAGE);
    };

    let result = diff_snapshots(old_snap, new_snap);
    if output.json {
        print_json(&result)?;
    } else {
        for module in &result.added {
            println!("+ {} {} ({})", module.path, module.version, module.risk_level);
        }
        for module in &result.removed {
            println!("- {} {}", module.path, module.version);
        }
        for (before, after) in &result.changed {
            println!(
                "~ {} {} {} → {} {}",
                before.path, before.version, before.risk_level, after.version, after.risk_level
            );
        }
        if result.added.is_empty() && result.removed.is_empty() && result.changed.is_empty() {
            println!("no changes between snapshots {old_idx} and {new_idx}");
        }
    }
    Ok(EXIT_OK)
}

fn trend(app: &App, filter: Option<&str>, output: &OutputOpts) -> Result<i32> {
    let store = HistoryStore::load(&app.dir)?;
    if store.is_empty() {
        eprintln!("no snapshots recorded");
        return Ok(EXIT_USAGE);
    }

    // module → score series across snapshots, in module order.
    let mut series: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for snapshot in &store.snapshots {
        for module in &snapshot.modules {
            if filter.map_or(true, |f| module.path.contains(f)) {
                series.entry(module.path.clone()).or_default();
            }
        }
    }
    for snapshot in &store.snapshots {
        for (path, scores) in series.iter_mut() {
            let value = snapshot
                .modules
                .iter()
                .find(|m| m.path == *path)
                .map(|m| m.effective_score)
                .unwrap_or(0.0);
            scores.push(value);
        }
    }

    if output.json {
        print_json(&series)?;
    } else {
        let mut table = Table::new(vec!["MODULE", "TREND", "LATEST"]);
        for (path, scores) in &series {
            table.row(vec![
                path.clone(),
                sparkline::render(scores),
                format!("{:.1}", scores.last().copied().unwrap_or(0.0)),
            ]);
        }
        if table.is_empty() {
            println!("no modules match the filter");
        } else {
            print!("{}", table.render());
        }
    }
    Ok(EXIT_OK)
}
