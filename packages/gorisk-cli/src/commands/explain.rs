//! `gorisk explain` — grouped evidence listing

use super::{print_json, App, EXIT_OK};
use crate::cli::OutputOpts;
use gorisk_ir::{Capability, GoriskError, Result};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvidenceRow {
    file: String,
    line: u32,
    via: String,
    confidence: f64,
    context: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CapabilityGroup {
    capability: String,
    avg_confidence: f64,
    evidence: Vec<EvidenceRow>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PackageGroup {
    package: String,
    capabilities: Vec<CapabilityGroup>,
}

pub fn run(app: &App, cap_filter: Option<&str>, output: &OutputOpts) -> Result<i32> {
    let filter = match cap_filter {
        Some(name) => Some(
            Capability::parse(name)
                .ok_or_else(|| GoriskError::config(format!("unknown capability: {name}")))?,
        ),
        None => None,
    };

    let report = app.analyze()?;
    let mut groups: Vec<PackageGroup> = Vec::new();
    for (path, package) in &report.graph.packages {
        let capabilities: Vec<CapabilityGroup> = package
            .capabilities
            .iter()
            .filter(|(cap, _)| filter.map_or(true, |f| *cap == f))
            .map(|(cap, evidence)| CapabilityGroup {
                capability: cap.name().to_string(),
                avg_confidence: package.capabilities.avg_confidence(cap),
                evidence: evidence
                    .iter()
                    .map(|ev| EvidenceRow {
                        file: ev.file.clone(),
                        line: ev.line,
                        via: ev.via.as_str().to_string(),
                        confidence: ev.confidence,
                        context: ev.context.clone(),
                    })
                    .collect(),
            })
            .collect();
        if !capabilities.is_empty() {
            groups.push(PackageGroup {
                package: path.clone(),
                capabilities,
            });
        }
    }

    if output.json {
        print_json(&groups)?;
    } else if groups.is_empty() {
        println!("no matching evidence");
    } else {
        for group in &groups {
            println!("{}", group.package);
            for cap in &group.capabilities {
                println!(
                    "  {} (avg confidence {:.2})",
                    cap.capability, cap.avg_confidence
                );
                for ev in &cap.evidence {
                    println!(
                        "    {}:{} [{} {:.2}] {}",
                        ev.file, ev.line, ev.via, ev.confidence, ev.context
                    );
                }
            }
        }
    }
    Ok(EXIT_OK)
}
