//! SARIF 2.1 output
//!
//! One result per (package, capability) finding, rule ids
//! `gorisk.capability.<name>`, locations from the first evidence record.
//! Callers pass the graph after policy filtering so suppressed findings
//! never surface as results.

use gorisk_ir::{DependencyGraph, RiskLevel};
use serde_json::{json, Value};
use std::collections::BTreeSet;

fn sarif_level(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::High => "error",
        RiskLevel::Medium => "warning",
        RiskLevel::Low => "note",
    }
}

pub fn render(graph: &DependencyGraph) -> Value {
    let mut rules: BTreeSet<String> = BTreeSet::new();
    let mut results = Vec::new();

    for (path, package) in &graph.packages {
        let risk = package.capabilities.risk_level();
        for (cap, evidence) in package.capabilities.iter() {
            let rule_id = format!("gorisk.capability.{}", cap.name());
            rules.insert(rule_id.clone());

            let mut result = json!({
                "ruleId": rule_id,
                "level": sarif_level(risk),
                "message": {
                    "text": format!(
                        "package {} exercises capability {} ({} evidence record{})",
                        path,
                        cap.name(),
                        evidence.len(),
                        if evidence.len() == 1 { "" } else { "s" }
                    )
                },
            });
            if let Some(first) = evidence.first() {
                result["locations"] = json!([{
                    "physicalLocation": {
                        "artifactLocation": { "uri": first.file.clone() },
                        "region": { "startLine": first.line.max(1) }
                    }
                }]);
            }
            results.push(result);
        }
    }

    let rules: Vec<Value> = rules
        .into_iter()
        .map(|id| {
            json!({
                "id": id,
                "shortDescription": { "text": id.replace("gorisk.capability.", "capability: ") }
            })
        })
        .collect();

    json!({
        "$schema": "https://json.schemastore.org/sarif-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "gorisk",
                    "informationUri": "https://github.com/gorisk/gorisk",
                    "rules": rules
                }
            },
            "results": results
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gorisk_ir::features::scoring::NoCves;
    use gorisk_ir::{AnalysisConfig, AnalysisPipeline, Language};

    #[test]
    fn test_sarif_shape() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("go.mod"), "module m\n\ngo 1.21\n").unwrap();
        std::fs::write(
            tmp.path().join("main.go"),
            "package main\n\nimport \"os/exec\"\n\nfunc main() { exec.Command(\"ls\") }\n",
        )
        .unwrap();
        let report = AnalysisPipeline::new(AnalysisConfig::default())
            .unwrap()
            .analyze(tmp.path(), Some(Language::Go), None, &NoCves)
            .unwrap();

        let sarif = render(&report.graph);
        assert_eq!(sarif["version"], "2.1.0");
        let results = sarif["runs"][0]["results"].as_array().unwrap();
        assert!(results
            .iter()
            .any(|r| r["ruleId"] == "gorisk.capability.exec"));
    }
}
