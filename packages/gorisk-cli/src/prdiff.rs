//! Pull-request manifest diffing
//!
//! Reads the dependency manifest (go.mod / package.json) at two git refs
//! and reports added, removed and version-changed dependencies without
//! touching the working tree.

use git2::Repository;
use gorisk_ir::{GoriskError, Language, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepChange {
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrReport {
    pub base: String,
    pub head: String,
    pub added: Vec<DepChange>,
    pub removed: Vec<DepChange>,
    pub updated: Vec<DepChange>,
}

fn manifest_name(language: Language) -> &'static str {
    match language {
        Language::Go => "go.mod",
        Language::JavaScript => "package.json",
    }
}

/// Manifest content at `rev` (the blob, not the working tree).
fn manifest_at(repo: &Repository, rev: &str, name: &str) -> Result<String> {
    let object = repo
        .revparse_single(rev)
        .map_err(|e| GoriskError::external(format!("cannot resolve {rev}: {e}")))?;
    let commit = object
        .peel_to_commit()
        .map_err(|e| GoriskError::external(format!("{rev} is not a commit: {e}")))?;
    let tree = commit
        .tree()
        .map_err(|e| GoriskError::external(e.to_string()))?;
    let entry = tree
        .get_name(name)
        .ok_or_else(|| GoriskError::external(format!("{name} not present at {rev}")))?;
    let blob = entry
        .to_object(repo)
        .and_then(|o| o.peel_to_blob())
        .map_err(|e| GoriskError::external(e.to_string()))?;
    String::from_utf8(blob.content().to_vec())
        .map_err(|_| GoriskError::external(format!("{name} at {rev} is not UTF-8")))
}

/// `module → version` pairs out of a manifest.
fn parse_deps(language: Language, content: &str) -> BTreeMap<String, String> {
    match language {
        Language::Go => {
            let mut deps = BTreeMap::new();
            let mut in_block = false;
            for raw in content.lines() {
                let line = raw.split("//").next().unwrap_or("").trim();
                if line.starts_with("require (") {
                    in_block = true;
                } else if in_block && line.starts_with(')') {
                    in_block = false;
                } else if in_block || line.starts_with("require ") {
                    let body = line.strip_prefix("require ").unwrap_or(line);
                    let mut parts = body.split_whitespace();
                    if let (Some(path), Some(version)) = (parts.next(), parts.next()) {
                        if path.contains('.') {
                            deps.insert(path.to_string(), version.to_string());
                        }
                    }
                }
            }
            deps
        }
        Language::JavaScript => {
            #[derive(Deserialize)]
            struct Manifest {
                #[serde(default)]
                dependencies: BTreeMap<String, String>,
            }
            serde_json::from_str::<Manifest>(content)
                .map(|m| m.dependencies)
                .unwrap_or_default()
        }
    }
}

/// Diff the manifest between two refs of the repository at `dir`.
pub fn diff_refs(dir: &Path, language: Language, base: &str, head: &str) -> Result<PrReport> {
    let repo = Repository::discover(dir)
        .map_err(|e| GoriskError::external(format!("not a git repository: {e}")))?;
    let name = manifest_name(language);
    let old = parse_deps(language, &manifest_at(&repo, base, name)?);
    let new = parse_deps(language, &manifest_at(&repo, head, name)?);

    let mut report = PrReport {
        base: base.to_string(),
        head: head.to_string(),
        added: Vec::new(),
        removed: Vec::new(),
        updated: Vec::new(),
    };
    for (module, version) in &new {
        match old.get(module) {
            None => report.added.push(DepChange {
                module: module.clone(),
                old_version: None,
                new_version: Some(version.clone()),
            }),
            Some(old_version) if old_version != version => report.updated.push(DepChange {
                module: module.clone(),
                old_version: Some(old_version.clone()),
                new_version: Some(version.clone()),
            }),
            Some(_) => {}
        }
    }
    for (module, version) in &old {
        if !new.contains_key(module) {
            report.removed.push(DepChange {
                module: module.clone(),
                old_version: Some(version.clone()),
                new_version: None,
            });
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_go_deps() {
        let deps = parse_deps(
            Language::Go,
            "module m\n\nrequire (\n\tgithub.com/a/b v1.0.0\n\tgithub.com/c/d v2.1.0 // indirect\n)\n",
        );
        assert_eq!(deps["github.com/a/b"], "v1.0.0");
        assert_eq!(deps["github.com/c/d"], "v2.1.0");
    }

    #[test]
    fn test_parse_npm_deps() {
        let deps = parse_deps(
            Language::JavaScript,
            r#"{ "name": "x", "dependencies": { "left-pad": "^1.3.0" } }"#,
        );
        assert_eq!(deps["left-pad"], "^1.3.0");
    }

    #[test]
    fn test_diff_refs_on_fixture_repo() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let sig = git2::Signature::now("test", "test@example.com").unwrap();

        let commit_manifest = |content: &str, parent: Option<git2::Oid>| -> git2::Oid {
            std::fs::write(tmp.path().join("go.mod"), content).unwrap();
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("go.mod")).unwrap();
            index.write().unwrap();
            let tree_id = index.write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            let parents: Vec<git2::Commit> = parent
                .map(|oid| vec![repo.find_commit(oid).unwrap()])
                .unwrap_or_default();
            let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
            repo.commit(Some("HEAD"), &sig, &sig, "m", &tree, &parent_refs)
                .unwrap()
        };

        let base = commit_manifest(
            "module m\n\nrequire github.com/a/b v1.0.0\n",
            None,
        );
        let head = commit_manifest(
            "module m\n\nrequire (\n\tgithub.com/a/b v1.1.0\n\tgithub.com/new/dep v0.1.0\n)\n",
            Some(base),
        );

        let report = diff_refs(
            tmp.path(),
            Language::Go,
            &base.to_string(),
            &head.to_string(),
        )
        .unwrap();
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.added[0].module, "github.com/new/dep");
        assert_eq!(report.updated.len(), 1);
        assert_eq!(
            report.updated[0].new_version.as_deref(),
            Some("v1.1.0")
        );
        assert!(report.removed.is_empty());
    }
}
