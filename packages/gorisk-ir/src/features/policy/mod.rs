//! Policy & exception filter
//!
//! Operator-supplied allow-lists applied just before output assembly. A
//! capability exception removes matched `package → capability` pairs from
//! the findings (evidence stays available to `explain`); a taint
//! exception removes matched `(package, source→sink)` findings. Expired
//! exceptions are counted, never applied.

use crate::errors::{GoriskError, Result};
use crate::features::taint::TaintFinding;
use crate::shared::models::{Capability, RiskLevel};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    /// Risk level at or above which `scan` exits 1.
    #[serde(default)]
    pub fail_on: Option<RiskLevel>,

    #[serde(default)]
    pub allow_exceptions: Vec<PolicyException>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyException {
    pub package: String,

    /// Capability names to allow for this package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,

    /// Taint pairs to allow, written `source→sink` (or `source->sink`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taint: Option<Vec<String>>,

    /// Last day the exception is valid (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
}

impl PolicyException {
    fn is_expired(&self, today: NaiveDate) -> bool {
        self.expires.map_or(false, |d| d < today)
    }

    fn allows_capability(&self, package: &str, cap: Capability) -> bool {
        if self.package != package {
            return false;
        }
        match &self.capabilities {
            Some(names) => names.iter().any(|n| n == cap.name()),
            None => false,
        }
    }

    fn allows_taint(&self, finding: &TaintFinding) -> bool {
        if self.package != finding.package {
            return false;
        }
        match &self.taint {
            Some(pairs) => pairs.iter().any(|p| {
                parse_taint_pair(p)
                    .map(|(src, snk)| src == finding.source && snk == finding.sink)
                    .unwrap_or(false)
            }),
            None => false,
        }
    }
}

/// `"network→exec"` / `"network->exec"` → (network, exec).
pub fn parse_taint_pair(pair: &str) -> Option<(Capability, Capability)> {
    let (src, snk) = pair
        .split_once('→')
        .or_else(|| pair.split_once("->"))?;
    Some((
        Capability::parse(src.trim())?,
        Capability::parse(snk.trim())?,
    ))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStats {
    /// Exceptions that matched at least one finding.
    pub applied: u32,
    /// Exceptions skipped because they expired.
    pub expired: u32,
    /// Taint findings removed.
    pub taint_suppressed: u32,
}

impl Policy {
    pub fn load(path: &Path) -> Result<Policy> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GoriskError::policy(format!("cannot read {}: {e}", path.display())))?;
        let policy: Policy = serde_json::from_str(&content)
            .map_err(|e| GoriskError::policy(format!("cannot parse {}: {e}", path.display())))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Unknown capability names in a policy are an invocation error.
    pub fn validate(&self) -> Result<()> {
        for exception in &self.allow_exceptions {
            if let Some(names) = &exception.capabilities {
                for name in names {
                    if Capability::parse(name).is_none() {
                        return Err(GoriskError::policy(format!(
                            "unknown capability in policy: {name}"
                        )));
                    }
                }
            }
            if let Some(pairs) = &exception.taint {
                for pair in pairs {
                    if parse_taint_pair(pair).is_none() {
                        return Err(GoriskError::policy(format!(
                            "unparsable taint pair in policy: {pair}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply unexpired exceptions to the per-package capability findings
    /// and the taint findings.
    pub fn apply(
        &self,
        package_caps: &mut BTreeMap<String, Vec<Capability>>,
        taint: &mut Vec<TaintFinding>,
        today: NaiveDate,
    ) -> PolicyStats {
        let mut stats = PolicyStats::default();

        for exception in &self.allow_exceptions {
            if exception.is_expired(today) {
                stats.expired += 1;
                continue;
            }
            let mut matched = false;

            if exception.capabilities.is_some() {
                if let Some(caps) = package_caps.get_mut(&exception.package) {
                    let before = caps.len();
                    caps.retain(|c| !exception.allows_capability(&exception.package, *c));
                    matched |= caps.len() != before;
                }
            }

            if exception.taint.is_some() {
                let before = taint.len();
                taint.retain(|t| !exception.allows_taint(t));
                let removed = (before - taint.len()) as u32;
                stats.taint_suppressed += removed;
                matched |= removed > 0;
            }

            if matched {
                stats.applied += 1;
            }
        }

        package_caps.retain(|_, caps| !caps.is_empty());
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::Symbol;

    fn finding() -> TaintFinding {
        TaintFinding {
            package: "acme".into(),
            source: Capability::Network,
            sink: Capability::Exec,
            risk: RiskLevel::High,
            path: vec![Symbol::func("acme", "f")],
        }
    }

    fn taint_policy(expires: Option<NaiveDate>) -> Policy {
        Policy {
            fail_on: None,
            allow_exceptions: vec![PolicyException {
                package: "acme".into(),
                capabilities: None,
                taint: Some(vec!["network→exec".into()]),
                expires,
                justification: Some("reviewed".into()),
                ticket: None,
            }],
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    #[test]
    fn test_taint_suppression() {
        let policy = taint_policy(Some(today() + chrono::Days::new(1)));
        let mut caps = BTreeMap::new();
        let mut findings = vec![finding()];
        let stats = policy.apply(&mut caps, &mut findings, today());

        assert!(findings.is_empty());
        assert_eq!(stats.taint_suppressed, 1);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.expired, 0);
    }

    #[test]
    fn test_expired_exception_ignored() {
        let policy = taint_policy(Some(today() - chrono::Days::new(1)));
        let mut caps = BTreeMap::new();
        let mut findings = vec![finding()];
        let stats = policy.apply(&mut caps, &mut findings, today());

        assert_eq!(findings.len(), 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.taint_suppressed, 0);
    }

    #[test]
    fn test_capability_exception() {
        let policy = Policy {
            fail_on: None,
            allow_exceptions: vec![PolicyException {
                package: "acme".into(),
                capabilities: Some(vec!["exec".into()]),
                taint: None,
                expires: None,
                justification: None,
                ticket: None,
            }],
        };
        let mut caps = BTreeMap::new();
        caps.insert("acme".to_string(), vec![Capability::Exec, Capability::Env]);
        caps.insert("other".to_string(), vec![Capability::Exec]);
        let mut findings = Vec::new();
        let stats = policy.apply(&mut caps, &mut findings, today());

        assert_eq!(stats.applied, 1);
        assert_eq!(caps["acme"], vec![Capability::Env]);
        assert_eq!(caps["other"], vec![Capability::Exec]);
    }

    #[test]
    fn test_ascii_arrow_accepted() {
        assert_eq!(
            parse_taint_pair("network->exec").unwrap(),
            (Capability::Network, Capability::Exec)
        );
        assert!(parse_taint_pair("network exec").is_none());
        assert!(parse_taint_pair("bogus→exec").is_none());
    }

    #[test]
    fn test_validation_rejects_unknown_names() {
        let policy = Policy {
            fail_on: None,
            allow_exceptions: vec![PolicyException {
                package: "p".into(),
                capabilities: Some(vec!["warp".into()]),
                taint: None,
                expires: None,
                justification: None,
                ticket: None,
            }],
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_policy_json_shape() {
        let json = r#"{
            "fail_on": "HIGH",
            "allow_exceptions": [
                {"package": "acme", "capabilities": ["exec"], "expires": "2027-01-01"}
            ]
        }"#;
        let policy: Policy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.fail_on, Some(RiskLevel::High));
        assert_eq!(policy.allow_exceptions.len(), 1);
    }
}
