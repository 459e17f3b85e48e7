//! License detection
//!
//! Offline heuristic over LICENSE files in each module directory, with an
//! optional GitHub lookup behind the `HttpFetcher` trait when
//! `GORISK_GITHUB_TOKEN` is set. A network failure degrades to
//! "unknown", never aborts.

use gorisk_ir::{DependencyGraph, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const GITHUB_TOKEN_ENV: &str = "GORISK_GITHUB_TOKEN";

/// Copyleft or unidentifiable licenses get flagged for review.
const RISKY: &[&str] = &["GPL-2.0", "GPL-3.0", "AGPL-3.0", "LGPL-3.0", "unknown"];

static LICENSE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)GNU AFFERO GENERAL PUBLIC LICENSE", "AGPL-3.0"),
        (r"(?i)GNU LESSER GENERAL PUBLIC LICENSE", "LGPL-3.0"),
        (r"(?i)GNU GENERAL PUBLIC LICENSE\s+Version 3", "GPL-3.0"),
        (r"(?i)GNU GENERAL PUBLIC LICENSE\s+Version 2", "GPL-2.0"),
        (r"(?i)Apache License\s+Version 2\.0", "Apache-2.0"),
        (r"(?i)Mozilla Public License,? [Vv]ersion 2\.0", "MPL-2.0"),
        (r"(?i)Permission is hereby granted, free of charge", "MIT"),
        (r"(?i)Redistribution and use in source and binary forms", "BSD-3-Clause"),
        (r"(?i)Permission to use, copy, modify, and/?or distribute", "ISC"),
        (r"(?i)This is free and unencumbered software", "Unlicense"),
    ]
    .into_iter()
    .map(|(pattern, id)| (Regex::new(pattern).unwrap(), id))
    .collect()
});

const LICENSE_FILENAMES: &[&str] = &[
    "LICENSE",
    "LICENSE.txt",
    "LICENSE.md",
    "LICENCE",
    "COPYING",
    "License",
    "license",
];

/// HTTP abstraction so tests never need the network.
pub trait HttpFetcher {
    /// GET `url` with an optional bearer token; returns the body.
    fn get(&self, url: &str, bearer: Option<&str>, timeout: Duration) -> Result<String>;
}

/// reqwest-backed fetcher with a per-call timeout.
pub struct ReqwestFetcher;

impl HttpFetcher for ReqwestFetcher {
    fn get(&self, url: &str, bearer: Option<&str>, timeout: Duration) -> Result<String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("gorisk")
            .build()
            .map_err(|e| gorisk_ir::GoriskError::external(e.to_string()))?;
        let mut request = client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| gorisk_ir::GoriskError::external(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseReport {
    pub module: String,
    pub version: String,
    pub license: String,
    pub risky: bool,
}

/// Classify the license text of one directory.
pub fn detect_in_dir(dir: &Path) -> Option<&'static str> {
    for name in LICENSE_FILENAMES {
        let path = dir.join(name);
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        let head: String = content.chars().take(4000).collect();
        for (pattern, id) in LICENSE_PATTERNS.iter() {
            if pattern.is_match(&head) {
                return Some(id);
            }
        }
    }
    None
}

/// GitHub license endpoint for `github.com/...` modules.
fn github_lookup(fetcher: &dyn HttpFetcher, module: &str, timeout: Duration) -> Option<String> {
    let rest = module.strip_prefix("github.com/")?;
    let mut parts = rest.splitn(3, '/');
    let (owner, repo) = (parts.next()?, parts.next()?);
    let token = std::env::var(GITHUB_TOKEN_ENV).ok();
    let url = format!("https://api.github.com/repos/{owner}/{repo}/license");

    #[derive(Deserialize)]
    struct LicenseBody {
        license: Option<LicenseId>,
    }
    #[derive(Deserialize)]
    struct LicenseId {
        spdx_id: Option<String>,
    }

    match fetcher.get(&url, token.as_deref(), timeout) {
        Ok(body) => serde_json::from_str::<LicenseBody>(&body)
            .ok()
            .and_then(|b| b.license)
            .and_then(|l| l.spdx_id)
            .filter(|id| id != "NOASSERTION"),
        Err(err) => {
            debug!(%module, %err, "license lookup failed; treating as unknown");
            None
        }
    }
}

/// License per non-main module, sorted by module path.
pub fn analyze(
    graph: &DependencyGraph,
    fetcher: Option<&dyn HttpFetcher>,
    timeout: Duration,
) -> Vec<LicenseReport> {
    let mut reports: Vec<LicenseReport> = graph
        .dependency_modules()
        .map(|module| {
            let mut license = module
                .dir
                .as_deref()
                .and_then(detect_in_dir)
                .map(String::from);
            if license.is_none() {
                if let Some(fetcher) = fetcher {
                    license = github_lookup(fetcher, &module.path, timeout);
                }
            }
            let license = license.unwrap_or_else(|| "unknown".to_string());
            LicenseReport {
                module: module.path.clone(),
                version: module.version.clone(),
                risky: RISKY.contains(&license.as_str()),
                license,
            }
        })
        .collect();
    reports.sort_by(|a, b| a.module.cmp(&b.module));
    reports
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIT_TEXT: &str = "MIT License\n\nPermission is hereby granted, free of charge, to any person obtaining a copy...";
    const GPL3_TEXT: &str = "GNU GENERAL PUBLIC LICENSE\n                       Version 3, 29 June 2007";

    #[test]
    fn test_detect_mit() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("LICENSE"), MIT_TEXT).unwrap();
        assert_eq!(detect_in_dir(tmp.path()), Some("MIT"));
    }

    #[test]
    fn test_detect_gpl3_is_risky() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("COPYING"), GPL3_TEXT).unwrap();
        let id = detect_in_dir(tmp.path()).unwrap();
        assert_eq!(id, "GPL-3.0");
        assert!(RISKY.contains(&id));
    }

    #[test]
    fn test_missing_license_is_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(detect_in_dir(tmp.path()), None);
    }

    struct FailingFetcher;
    impl HttpFetcher for FailingFetcher {
        fn get(&self, _url: &str, _bearer: Option<&str>, _timeout: Duration) -> Result<String> {
            Err(gorisk_ir::GoriskError::external("offline"))
        }
    }

    #[test]
    fn test_network_failure_degrades_to_unknown() {
        use gorisk_ir::{Language, Module};
        let main = Module {
            path: "app".into(),
            is_main: true,
            ..Default::default()
        };
        let mut graph = DependencyGraph::new(Language::Go, main);
        graph.modules.insert(
            "github.com/acme/lib".into(),
            Module {
                path: "github.com/acme/lib".into(),
                version: "v1".into(),
                ..Default::default()
            },
        );

        let reports = analyze(&graph, Some(&FailingFetcher), Duration::from_secs(1));
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].license, "unknown");
        assert!(reports[0].risky);
    }
}
