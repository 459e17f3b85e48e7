//! Exported-API diffing (Go)
//!
//! Compares the exported function/method surface of two versions of a
//! module: a symbol present before and gone now is `removed`; a symbol
//! whose normalized signature differs is `type_changed`. Other languages
//! do not expose enough static type information for this comparison.

use crate::shared::models::Language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;
use tree_sitter::{Node, Parser};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    Removed,
    TypeChanged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakingChange {
    pub kind: BreakKind,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_sig: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_sig: Option<String>,
}

/// Exported symbol → normalized signature for one module directory.
pub fn exported_signatures(language: Language, dir: &Path) -> BTreeMap<String, String> {
    match language {
        Language::Go => go_signatures(dir),
        // No static export surface to compare.
        Language::JavaScript => BTreeMap::new(),
    }
}

/// Breaking changes from `old` to `new` exported surfaces.
pub fn diff_signatures(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> Vec<BreakingChange> {
    let mut changes = Vec::new();
    for (symbol, old_sig) in old {
        match new.get(symbol) {
            None => changes.push(BreakingChange {
                kind: BreakKind::Removed,
                symbol: symbol.clone(),
                old_sig: Some(old_sig.clone()),
                new_sig: None,
            }),
            Some(new_sig) if new_sig != old_sig => changes.push(BreakingChange {
                kind: BreakKind::TypeChanged,
                symbol: symbol.clone(),
                old_sig: Some(old_sig.clone()),
                new_sig: Some(new_sig.clone()),
            }),
            Some(_) => {}
        }
    }
    changes
}

fn go_signatures(dir: &Path) -> BTreeMap<String, String> {
    let mut signatures = BTreeMap::new();
    let mut parser = Parser::new();
    if parser.set_language(&tree_sitter_go::language()).is_err() {
        return signatures;
    }

    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !(name == "vendor" || name == "testdata" || name.starts_with('.'))
        })
    {
        let Ok(entry) = entry else { continue };
        let name = entry.file_name().to_string_lossy();
        if !entry.file_type().is_file() || !name.ends_with(".go") || name.ends_with("_test.go") {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let Some(tree) = parser.parse(&content, None) else {
            debug!(file = %entry.path().display(), "api diff parse failed");
            continue;
        };
        collect_exported(tree.root_node(), content.as_bytes(), &mut signatures);
    }
    signatures
}

fn collect_exported(root: Node, src: &[u8], out: &mut BTreeMap<String, String>) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "function_declaration" | "method_declaration" => {
                let Some(name_node) = node.child_by_field_name("name") else {
                    continue;
                };
                let name = name_node.utf8_text(src).unwrap_or("");
                if !name.chars().next().map_or(false, |c| c.is_uppercase()) {
                    continue;
                }
                let params = node
                    .child_by_field_name("parameters")
                    .and_then(|n| n.utf8_text(src).ok())
                    .unwrap_or("()");
                let result = node
                    .child_by_field_name("result")
                    .and_then(|n| n.utf8_text(src).ok())
                    .unwrap_or("");
                let receiver = node
                    .child_by_field_name("receiver")
                    .and_then(|n| n.utf8_text(src).ok());
                let symbol = match receiver {
                    Some(recv) => format!("{}{}", normalize(recv), name),
                    None => name.to_string(),
                };
                out.insert(symbol, normalize(&format!("{params} {result}")));
            }
            _ => {
                for i in (0..node.child_count()).rev() {
                    if let Some(child) = node.child(i) {
                        stack.push(child);
                    }
                }
            }
        }
    }
}

/// Collapse whitespace so formatting differences are not API changes.
fn normalize(sig: &str) -> String {
    sig.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_version(src: &str) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("lib.go"), src).unwrap();
        tmp
    }

    #[test]
    fn test_exported_only() {
        let dir = write_version(
            "package lib\n\nfunc Public(x int) error { return nil }\n\nfunc private() {}\n",
        );
        let sigs = exported_signatures(Language::Go, dir.path());
        assert!(sigs.contains_key("Public"));
        assert!(!sigs.contains_key("private"));
    }

    #[test]
    fn test_removed_symbol() {
        let old = write_version("package lib\n\nfunc Gone() {}\n\nfunc Kept() {}\n");
        let new = write_version("package lib\n\nfunc Kept() {}\n");
        let changes = diff_signatures(
            &exported_signatures(Language::Go, old.path()),
            &exported_signatures(Language::Go, new.path()),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, BreakKind::Removed);
        assert_eq!(changes[0].symbol, "Gone");
    }

    #[test]
    fn test_type_changed() {
        let old = write_version("package lib\n\nfunc Do(x int) {}\n");
        let new = write_version("package lib\n\nfunc Do(x string) {}\n");
        let changes = diff_signatures(
            &exported_signatures(Language::Go, old.path()),
            &exported_signatures(Language::Go, new.path()),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, BreakKind::TypeChanged);
        assert!(changes[0].old_sig.as_deref().unwrap().contains("int"));
        assert!(changes[0].new_sig.as_deref().unwrap().contains("string"));
    }

    #[test]
    fn test_whitespace_is_not_a_change() {
        let old = write_version("package lib\n\nfunc Do(x int,  y int) {}\n");
        let new = write_version("package lib\n\nfunc Do(x int, y int) {}\n");
        let changes = diff_signatures(
            &exported_signatures(Language::Go, old.path()),
            &exported_signatures(Language::Go, new.path()),
        );
        assert!(changes.is_empty());
    }

    #[test]
    fn test_method_receiver_in_symbol() {
        let dir = write_version(
            "package lib\n\ntype T struct{}\n\nfunc (t *T) Run() error { return nil }\n",
        );
        let sigs = exported_signatures(Language::Go, dir.path());
        assert!(sigs.keys().any(|k| k.contains("Run") && k.contains("*T")));
    }
}
