//! Subcommand implementations
//!
//! Every command returns the process exit code: 0 ok, 1 threshold
//! exceeded, 2 invocation error (mapped from `GoriskError` in main).

pub mod capabilities;
pub mod explain;
pub mod graph;
pub mod history_cmd;
pub mod impact;
pub mod licenses_cmd;
pub mod pr;
pub mod reachability;
pub mod sbom;
pub mod scan;
pub mod upgrade;

use gorisk_ir::features::scoring::{CveProvider, NoCves, StaticCves};
use gorisk_ir::pipeline::AnalysisReport;
use gorisk_ir::{AnalysisConfig, AnalysisPipeline, GoriskError, Language, Result, RiskLevel};
use std::path::{Path, PathBuf};

pub const EXIT_OK: i32 = 0;
pub const EXIT_THRESHOLD: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Shared invocation state for all commands.
pub struct App {
    pub dir: PathBuf,
    pub lang: Option<Language>,
    pub config: AnalysisConfig,
}

impl App {
    pub fn new(dir: PathBuf, lang: Option<Language>) -> App {
        App {
            dir,
            lang,
            config: AnalysisConfig::default(),
        }
    }

    /// Run the full pipeline with no CVE data.
    pub fn analyze(&self) -> Result<AnalysisReport> {
        self.analyze_with(&NoCves)
    }

    pub fn analyze_with(&self, cves: &dyn CveProvider) -> Result<AnalysisReport> {
        AnalysisPipeline::new(self.config.clone())?.analyze(&self.dir, self.lang, None, cves)
    }

    pub fn analyze_with_entry(&self, entry: Option<&Path>) -> Result<AnalysisReport> {
        AnalysisPipeline::new(self.config.clone())?.analyze(&self.dir, self.lang, entry, &NoCves)
    }
}

/// Load a `module → CVE count` JSON file when given.
pub fn load_cves(path: Option<&Path>) -> Result<Box<dyn CveProvider>> {
    match path {
        None => Ok(Box::new(NoCves)),
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| GoriskError::config(format!("cannot read {}: {e}", path.display())))?;
            Ok(Box::new(StaticCves::from_json(&content)?))
        }
    }
}

/// `module[@version]` → (module, Some(version)).
pub fn split_module_spec(spec: &str) -> (String, Option<String>) {
    // npm scopes start with '@'; split on the last separator.
    match spec.rfind('@') {
        Some(idx) if idx > 0 => (
            spec[..idx].to_string(),
            Some(spec[idx + 1..].to_string()),
        ),
        _ => (spec.to_string(), None),
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Threshold check shared by gating commands.
pub fn meets(level: RiskLevel, threshold: RiskLevel) -> bool {
    level >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_module_spec() {
        assert_eq!(
            split_module_spec("github.com/acme/lib@v1.2.3"),
            ("github.com/acme/lib".into(), Some("v1.2.3".into()))
        );
        assert_eq!(
            split_module_spec("github.com/acme/lib"),
            ("github.com/acme/lib".into(), None)
        );
        // scoped npm package without version
        assert_eq!(
            split_module_spec("@scope/pkg"),
            ("@scope/pkg".into(), None)
        );
        // scoped npm package with version
        assert_eq!(
            split_module_spec("@scope/pkg@1.0.0"),
            ("@scope/pkg".into(), Some("1.0.0".into()))
        );
    }

    #[test]
    fn test_meets() {
        assert!(meets(RiskLevel::High, RiskLevel::Medium));
        assert!(meets(RiskLevel::Medium, RiskLevel::Medium));
        assert!(!meets(RiskLevel::Low, RiskLevel::Medium));
    }
}
