//! CycloneDX 1.4 SBOM output
//!
//! One component per dependency module. Components carry the gorisk
//! findings as properties: `gorisk:capabilities` (comma-joined),
//! `gorisk:risk_level`, `gorisk:health_score`.

use gorisk_ir::pipeline::AnalysisReport;
use serde_json::{json, Value};

pub fn render(report: &AnalysisReport) -> Value {
    let graph = &report.graph;
    let purl_type = graph.language.purl_type();

    let components: Vec<Value> = report
        .modules
        .iter()
        .map(|module| {
            let purl = format!("pkg:{}/{}@{}", purl_type, module.module, module.version);
            let health = report
                .composite
                .get(&module.module)
                .map(|c| c.composite)
                .unwrap_or(module.effective_score);
            json!({
                "type": "library",
                "name": module.module.clone(),
                "version": module.version.clone(),
                "purl": purl,
                "properties": [
                    {
                        "name": "gorisk:capabilities",
                        "value": module.capabilities.join(",")
                    },
                    {
                        "name": "gorisk:risk_level",
                        "value": module.risk_level.to_string()
                    },
                    {
                        "name": "gorisk:health_score",
                        "value": format!("{health:.1}")
                    }
                ]
            })
        })
        .collect();

    json!({
        "bomFormat": "CycloneDX",
        "specVersion": "1.4",
        "version": 1,
        "metadata": {
            "tools": [{ "vendor": "gorisk", "name": "gorisk" }],
            "component": {
                "type": "application",
                "name": graph.main.clone(),
            }
        },
        "components": components
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gorisk_ir::features::scoring::NoCves;
    use gorisk_ir::{AnalysisConfig, AnalysisPipeline, Language};

    #[test]
    fn test_sbom_shape() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("go.mod"),
            "module example.com/app\n\ngo 1.21\n\nrequire github.com/acme/lib v1.2.3\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("main.go"), "package main\n\nfunc main() {}\n").unwrap();
        let report = AnalysisPipeline::new(AnalysisConfig::default())
            .unwrap()
            .analyze(tmp.path(), Some(Language::Go), None, &NoCves)
            .unwrap();

        let sbom = render(&report);
        assert_eq!(sbom["bomFormat"], "CycloneDX");
        assert_eq!(sbom["specVersion"], "1.4");
        let components = sbom["components"].as_array().unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(
            components[0]["purl"],
            "pkg:golang/github.com/acme/lib@v1.2.3"
        );
        let props = components[0]["properties"].as_array().unwrap();
        assert!(props.iter().any(|p| p["name"] == "gorisk:risk_level"));
    }
}
