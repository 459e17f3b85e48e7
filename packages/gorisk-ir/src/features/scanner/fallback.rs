//! Regex fallback scanner
//!
//! Last resort for files the parser cannot produce a tree for. Every hit
//! is reported at the fallback confidence (0.60) since nothing is
//! actually resolved. No call edges are produced; the file contributes
//! file-level evidence only.

use super::FileScan;
use crate::features::patterns::LanguageRules;
use crate::shared::models::{confidence, CapabilitySet, Evidence, EvidenceVia, Package};

pub(crate) fn regex_scan(
    _pkg: &Package,
    file: &str,
    content: &str,
    rules: &LanguageRules,
) -> FileScan {
    let mut caps = CapabilitySet::new();

    for import_path in sorted(rules.import_paths()) {
        let single = format!("'{import_path}'");
        let double = format!("\"{import_path}\"");
        if let Some(offset) = content.find(&double).or_else(|| content.find(&single)) {
            if let Some(found) = rules.import_caps(import_path) {
                for cap in found {
                    caps.add(
                        *cap,
                        Evidence::new(
                            file,
                            line_of(content, offset),
                            format!("import \"{import_path}\""),
                            EvidenceVia::Import,
                            confidence::REGEX_FALLBACK,
                        ),
                    );
                }
            }
        }
    }

    for key in sorted(rules.call_keys()) {
        let needle = format!("{key}(");
        if let Some(offset) = content.find(&needle) {
            if let Some(found) = rules.call_caps(key) {
                for cap in found {
                    caps.add(
                        *cap,
                        Evidence::new(
                            file,
                            line_of(content, offset),
                            key.to_string(),
                            EvidenceVia::CallSite,
                            confidence::REGEX_FALLBACK,
                        ),
                    );
                }
            }
        }
    }

    FileScan {
        file: file.to_string(),
        file_caps: caps,
        functions: Vec::new(),
        calls: Vec::new(),
    }
}

/// Pattern-table iteration order is a hash map's; sort for determinism.
fn sorted<'a>(iter: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut keys: Vec<&str> = iter.collect();
    keys.sort_unstable();
    keys
}

fn line_of(content: &str, offset: usize) -> u32 {
    content[..offset].bytes().filter(|b| *b == b'\n').count() as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::patterns::registry;
    use crate::shared::models::{Capability, Language};

    #[test]
    fn test_fallback_finds_imports_and_calls() {
        let rules = registry().rules(Language::Go).unwrap();
        let pkg = Package::default();
        let content = "package main\n\nimport \"os/exec\"\n\nfunc x() { exec.Command(\"ls\") }\n";
        let scan = regex_scan(&pkg, "broken.go", content, rules);

        let evs = scan.file_caps.evidence(Capability::Exec);
        assert_eq!(evs.len(), 2);
        assert!(evs.iter().all(|e| (e.confidence - 0.60).abs() < 1e-9));
        assert_eq!(evs[0].via, EvidenceVia::Import);
        assert_eq!(evs[1].via, EvidenceVia::CallSite);
        assert_eq!(evs[1].line, 5);
    }

    #[test]
    fn test_fallback_clean_file() {
        let rules = registry().rules(Language::Go).unwrap();
        let scan = regex_scan(&Package::default(), "ok.go", "package main\n", rules);
        assert!(scan.file_caps.is_empty());
    }
}
