//! Composite scoring
//!
//! Combines the capability score with reachability, known-CVE and taint
//! modifiers into a single priority value. Each modifier is monotone, so
//! the composite is monotone in every input.

use crate::features::taint::TaintFinding;
use crate::shared::models::RiskLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeScore {
    pub capability_score: u32,
    pub reachability_mod: f64,
    pub cve_mod: f64,
    pub taint_mod: f64,
    pub composite: f64,
    pub level: RiskLevel,
}

/// Known-vulnerability counts per module. The default implementation
/// knows nothing; CI feeds counts from a file.
pub trait CveProvider {
    fn cve_count(&self, module: &str, version: &str) -> u32;
}

/// No vulnerability data available.
pub struct NoCves;

impl CveProvider for NoCves {
    fn cve_count(&self, _module: &str, _version: &str) -> u32 {
        0
    }
}

/// Counts loaded from a `module → count` JSON map.
pub struct StaticCves(BTreeMap<String, u32>);

impl StaticCves {
    pub fn new(counts: BTreeMap<String, u32>) -> StaticCves {
        StaticCves(counts)
    }

    pub fn from_json(content: &str) -> crate::errors::Result<StaticCves> {
        Ok(StaticCves(serde_json::from_str(content)?))
    }
}

impl CveProvider for StaticCves {
    fn cve_count(&self, module: &str, _version: &str) -> u32 {
        self.0.get(module).copied().unwrap_or(0)
    }
}

/// Score one module.
///
/// `reachable = None` means reachability was not computed (neutral 1.0).
pub fn composite_score(
    capability_score: u32,
    reachable: Option<bool>,
    cve_count: u32,
    taint: &[TaintFinding],
) -> CompositeScore {
    let reachability_mod = match reachable {
        None => 1.0,
        Some(true) => 1.3,
        Some(false) => 0.5,
    };
    let cve_mod = (1.0 + 0.3 * cve_count as f64).min(2.0);

    let high = taint.iter().filter(|t| t.risk == RiskLevel::High).count() as f64;
    let medium = taint.iter().filter(|t| t.risk == RiskLevel::Medium).count() as f64;
    let taint_mod = 1.0 + 0.25 * high + 0.15 * medium;

    let composite =
        (capability_score as f64 * reachability_mod * cve_mod * taint_mod).min(100.0);

    CompositeScore {
        capability_score,
        reachability_mod,
        cve_mod,
        taint_mod,
        composite,
        level: RiskLevel::from_composite(composite),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::Capability;

    fn taint_finding(risk: RiskLevel) -> TaintFinding {
        TaintFinding {
            package: "p".into(),
            source: Capability::Network,
            sink: Capability::Exec,
            risk,
            path: Vec::new(),
        }
    }

    #[test]
    fn test_reference_scenario() {
        // score 60, reachable, one CVE, one HIGH taint finding
        let score = composite_score(60, Some(true), 1, &[taint_finding(RiskLevel::High)]);
        assert_eq!(score.capability_score, 60);
        assert!((score.reachability_mod - 1.3).abs() < 1e-9);
        assert!((score.cve_mod - 1.3).abs() < 1e-9);
        assert!((score.taint_mod - 1.25).abs() < 1e-9);
        assert_eq!(score.composite, 100.0);
        assert_eq!(score.level, RiskLevel::High);
    }

    #[test]
    fn test_unreachable_halves() {
        let score = composite_score(40, Some(false), 0, &[]);
        assert!((score.composite - 20.0).abs() < 1e-9);
        assert_eq!(score.level, RiskLevel::Medium);
    }

    #[test]
    fn test_unknown_reachability_neutral() {
        let score = composite_score(40, None, 0, &[]);
        assert!((score.composite - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_cve_mod_capped() {
        let score = composite_score(10, None, 50, &[]);
        assert!((score.cve_mod - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_monotone_in_each_modifier() {
        let base = composite_score(20, None, 0, &[]);
        assert!(composite_score(25, None, 0, &[]).composite >= base.composite);
        assert!(composite_score(20, Some(true), 0, &[]).composite >= base.composite);
        assert!(composite_score(20, None, 1, &[]).composite >= base.composite);
        assert!(
            composite_score(20, None, 0, &[taint_finding(RiskLevel::Medium)]).composite
                >= base.composite
        );
    }

    #[test]
    fn test_low_taint_does_not_modify() {
        let score = composite_score(20, None, 0, &[taint_finding(RiskLevel::Low)]);
        assert!((score.taint_mod - 1.0).abs() < 1e-9);
    }
}
