//! Go module loader
//!
//! Reads `go.mod` + `go.sum` (and `go.work` for workspaces), resolves
//! dependency source directories through the module cache, and walks
//! source trees to produce packages and package-level import edges.
//!
//! Version strings come verbatim from `go.sum` when present, falling back
//! to the `require` directive. A dependency missing from the module cache
//! keeps its module/package nodes with `dir = None`.

use super::EcosystemLoader;
use crate::errors::{GoriskError, Result};
use crate::shared::models::{DependencyGraph, Language, Module, Package};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

static PACKAGE_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^package\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static IMPORT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)import\s*\((.*?)\)").unwrap());
static IMPORT_SINGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*import\s+(?:[\w.]+\s+)?"([^"]+)""#).unwrap());
static IMPORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:[\w.]+\s+)?"([^"]+)""#).unwrap());

/// A `require` directive.
#[derive(Debug, Clone)]
struct Require {
    path: String,
    version: String,
    indirect: bool,
}

/// Parsed `go.mod`.
#[derive(Debug, Clone, Default)]
struct GoModFile {
    module: String,
    requires: Vec<Require>,
}

pub struct GoModLoader {
    /// Module cache root; defaults to `$GOMODCACHE` then `$GOPATH/pkg/mod`
    /// then `~/go/pkg/mod`.
    mod_cache: Option<PathBuf>,
}

impl GoModLoader {
    pub fn new() -> GoModLoader {
        GoModLoader { mod_cache: None }
    }

    /// Override the module cache root (tests inject a fixture tree).
    pub fn with_mod_cache(mod_cache: impl Into<PathBuf>) -> GoModLoader {
        GoModLoader {
            mod_cache: Some(mod_cache.into()),
        }
    }

    fn mod_cache_root(&self) -> Option<PathBuf> {
        if let Some(root) = &self.mod_cache {
            return Some(root.clone());
        }
        if let Ok(cache) = std::env::var("GOMODCACHE") {
            return Some(PathBuf::from(cache));
        }
        if let Ok(gopath) = std::env::var("GOPATH") {
            return Some(PathBuf::from(gopath).join("pkg").join("mod"));
        }
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join("go").join("pkg").join("mod"))
    }

    /// Directory of `module@version` in the module cache, when present.
    fn module_dir(&self, path: &str, version: &str) -> Option<PathBuf> {
        let root = self.mod_cache_root()?;
        let dir = root.join(format!("{}@{}", escape_module_path(path), version));
        dir.is_dir().then_some(dir)
    }
}

impl Default for GoModLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl EcosystemLoader for GoModLoader {
    fn language(&self) -> Language {
        Language::Go
    }

    fn detect(&self, dir: &Path) -> bool {
        dir.join("go.mod").is_file() || dir.join("go.work").is_file()
    }

    fn load(&self, dir: &Path) -> Result<DependencyGraph> {
        let member_dirs = workspace_members(dir)?;
        let root_mod = parse_go_mod(&read_manifest(&member_dirs[0])?)?;

        let main = Module {
            path: root_mod.module.clone(),
            version: String::new(),
            dir: Some(member_dirs[0].clone()),
            is_main: true,
            is_indirect: false,
            packages: Vec::new(),
        };
        let mut graph = DependencyGraph::new(Language::Go, main);

        // go.sum is the lockfile of record for versions.
        let locked = parse_go_sum(dir);

        let mut member_mods: Vec<GoModFile> = Vec::new();
        for member in &member_dirs {
            let parsed = parse_go_mod(&read_manifest(member)?)?;
            if parsed.module != root_mod.module {
                graph.modules.insert(
                    parsed.module.clone(),
                    Module {
                        path: parsed.module.clone(),
                        version: String::new(),
                        dir: Some(member.clone()),
                        is_main: true,
                        is_indirect: false,
                        packages: Vec::new(),
                    },
                );
            }
            member_mods.push(parsed);
        }

        // Dependency modules from the union of member requires.
        for parsed in &member_mods {
            for req in &parsed.requires {
                if graph.modules.contains_key(&req.path) {
                    continue;
                }
                let version = locked
                    .get(&req.path)
                    .cloned()
                    .unwrap_or_else(|| req.version.clone());
                let mod_dir = self.module_dir(&req.path, &version);
                if mod_dir.is_none() {
                    debug!(module = %req.path, %version, "module cache miss; no source evidence");
                }
                graph.modules.insert(
                    req.path.clone(),
                    Module {
                        path: req.path.clone(),
                        version,
                        dir: mod_dir,
                        is_main: false,
                        is_indirect: req.indirect,
                        packages: Vec::new(),
                    },
                );
            }
        }

        // Discover packages per module; one broken module degrades, never aborts.
        let module_paths: Vec<String> = graph.modules.keys().cloned().collect();
        for path in &module_paths {
            let module = graph.modules[path].clone();
            let Some(mod_dir) = module.dir.clone() else {
                continue;
            };
            match discover_packages(path, &mod_dir) {
                Ok(packages) => {
                    let paths: Vec<String> =
                        packages.iter().map(|p| p.import_path.clone()).collect();
                    if let Some(owner) = graph.modules.get_mut(path) {
                        owner.packages.extend(paths);
                    }
                    for pkg in packages {
                        graph.packages.insert(pkg.import_path.clone(), pkg);
                    }
                }
                Err(err) => {
                    warn!(module = %path, %err, "package discovery failed; continuing");
                }
            }
        }

        resolve_edges(&mut graph, &module_paths);
        Ok(graph)
    }
}

fn read_manifest(dir: &Path) -> Result<String> {
    let path = dir.join("go.mod");
    std::fs::read_to_string(&path)
        .map_err(|e| GoriskError::loader(format!("cannot read {}: {e}", path.display())))
}

/// Workspace member directories; the root itself when no `go.work` exists.
fn workspace_members(dir: &Path) -> Result<Vec<PathBuf>> {
    let work = dir.join("go.work");
    if !work.is_file() {
        if !dir.join("go.mod").is_file() {
            return Err(GoriskError::loader(format!(
                "no go.mod in {}",
                dir.display()
            )));
        }
        return Ok(vec![dir.to_path_buf()]);
    }
    let content = std::fs::read_to_string(&work)?;
    let mut members = Vec::new();
    let mut in_block = false;
    for raw in content.lines() {
        let line = strip_comment(raw).trim().to_string();
        if line.starts_with("use") && line.contains('(') {
            in_block = true;
            continue;
        }
        if in_block {
            if line.starts_with(')') {
                in_block = false;
                continue;
            }
            if !line.is_empty() {
                members.push(dir.join(line.trim_matches('"')));
            }
        } else if let Some(rest) = line.strip_prefix("use ") {
            members.push(dir.join(rest.trim().trim_matches('"')));
        }
    }
    if members.is_empty() {
        members.push(dir.to_path_buf());
    }
    Ok(members)
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_go_mod(content: &str) -> Result<GoModFile> {
    let mut parsed = GoModFile::default();
    let mut in_require = false;
    for raw in content.lines() {
        let has_indirect = raw.contains("// indirect");
        let line = strip_comment(raw).trim().to_string();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("module ") {
            parsed.module = rest.trim().trim_matches('"').to_string();
        } else if line.starts_with("require (") {
            in_require = true;
        } else if in_require && line.starts_with(')') {
            in_require = false;
        } else if in_require {
            if let Some(req) = parse_require_line(&line, has_indirect) {
                parsed.requires.push(req);
            }
        } else if let Some(rest) = line.strip_prefix("require ") {
            if let Some(req) = parse_require_line(rest.trim(), has_indirect) {
                parsed.requires.push(req);
            }
        }
    }
    if parsed.module.is_empty() {
        return Err(GoriskError::loader("go.mod missing module directive"));
    }
    Ok(parsed)
}

fn parse_require_line(line: &str, indirect: bool) -> Option<Require> {
    let mut parts = line.split_whitespace();
    let path = parts.next()?.trim_matches('"').to_string();
    let version = parts.next()?.to_string();
    Some(Require {
        path,
        version,
        indirect,
    })
}

/// `go.sum` entries, keyed by module path. `/go.mod` hash lines are
/// skipped; the remaining entries carry the resolved version verbatim.
fn parse_go_sum(dir: &Path) -> BTreeMap<String, String> {
    let mut locked = BTreeMap::new();
    let Ok(content) = std::fs::read_to_string(dir.join("go.sum")) else {
        return locked;
    };
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(path), Some(version)) = (parts.next(), parts.next()) else {
            continue;
        };
        if version.ends_with("/go.mod") {
            continue;
        }
        locked.insert(path.to_string(), version.to_string());
    }
    locked
}

/// Go module cache path escaping: uppercase letters become `!` + lowercase.
fn escape_module_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        if ch.is_ascii_uppercase() {
            out.push('!');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Platform built-in: a stdlib import path has no dot in its first segment.
pub(crate) fn is_go_builtin(import_path: &str) -> bool {
    match import_path.split('/').next() {
        Some(first) => !first.contains('.'),
        None => true,
    }
}

/// Walk a module directory and emit one `Package` per Go source directory.
pub(crate) fn discover_packages(module_path: &str, mod_dir: &Path) -> Result<Vec<Package>> {
    let mut by_dir: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for entry in WalkDir::new(mod_dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if skip_dir(e.file_name().to_string_lossy().as_ref()) {
                return false;
            }
            // Nested modules (workspace members) are walked on their own.
            !(e.file_type().is_dir() && e.depth() > 0 && e.path().join("go.mod").is_file())
        })
    {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                debug!(%err, "walk error; skipping entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(".go") || name.ends_with("_test.go") {
            continue;
        }
        by_dir
            .entry(entry.path().parent().unwrap_or(mod_dir).to_path_buf())
            .or_default()
            .push(entry.path().to_path_buf());
    }

    let mut packages = Vec::new();
    for (pkg_dir, mut files) in by_dir {
        files.sort();
        let rel = pkg_dir.strip_prefix(mod_dir).unwrap_or(Path::new(""));
        let import_path = if rel.as_os_str().is_empty() {
            module_path.to_string()
        } else {
            format!("{}/{}", module_path, rel.to_string_lossy().replace('\\', "/"))
        };

        let mut name = pkg_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".into());
        let mut imports = Vec::new();
        for file in &files {
            let Ok(content) = std::fs::read_to_string(file) else {
                continue;
            };
            if let Some(caps) = PACKAGE_CLAUSE.captures(&content) {
                name = caps[1].to_string();
            }
            imports.extend(extract_go_imports(&content));
        }
        imports.sort_unstable();
        imports.dedup();

        packages.push(Package {
            import_path,
            is_entry: name == "main",
            name,
            module_ref: module_path.to_string(),
            dir: Some(pkg_dir),
            source_files: files,
            direct_imports: imports,
            capabilities: Default::default(),
        });
    }
    Ok(packages)
}

fn skip_dir(name: &str) -> bool {
    name == "vendor" || name == "testdata" || name == "node_modules" || name.starts_with('.')
}

/// Regex-level import extraction; the scanner re-parses with a real AST
/// for evidence, this only shapes the graph.
pub(crate) fn extract_go_imports(content: &str) -> Vec<String> {
    let mut imports = Vec::new();
    for block in IMPORT_BLOCK.captures_iter(content) {
        for line in block[1].lines() {
            let line = strip_comment(line).trim();
            if line.is_empty() {
                continue;
            }
            if let Some(caps) = IMPORT_LINE.captures(line) {
                imports.push(caps[1].to_string());
            }
        }
    }
    for caps in IMPORT_SINGLE.captures_iter(content) {
        imports.push(caps[1].to_string());
    }
    imports
}

/// Build package-level edges. Every retained target is a known package;
/// stdlib targets are filtered, unresolvable ones logged and dropped.
fn resolve_edges(graph: &mut DependencyGraph, module_paths: &[String]) {
    let mut sorted_modules: Vec<&str> = module_paths.iter().map(String::as_str).collect();
    // Longest prefix first so nested module paths win.
    sorted_modules.sort_by_key(|m| std::cmp::Reverse(m.len()));

    let package_list: Vec<(String, Vec<String>)> = graph
        .packages
        .iter()
        .map(|(p, pkg)| (p.clone(), pkg.direct_imports.clone()))
        .collect();

    for (from, imports) in package_list {
        let mut targets = Vec::new();
        for import in imports {
            if is_go_builtin(&import) {
                continue;
            }
            let owner = sorted_modules
                .iter()
                .find(|m| import == **m || import.starts_with(&format!("{}/", m)))
                .map(|m| m.to_string());
            match owner {
                Some(owner) => {
                    if !graph.packages.contains_key(&import) {
                        // Imported subpackage of a known module we could not
                        // walk; keep a stub so the edge invariant holds.
                        graph.packages.insert(
                            import.clone(),
                            Package {
                                import_path: import.clone(),
                                name: import.rsplit('/').next().unwrap_or(&import).to_string(),
                                module_ref: owner.clone(),
                                dir: None,
                                ..Default::default()
                            },
                        );
                        if let Some(module) = graph.modules.get_mut(&owner) {
                            module.packages.push(import.clone());
                        }
                    }
                    targets.push(import);
                }
                None => {
                    debug!(%from, %import, "import does not resolve to a known module; dropped");
                }
            }
        }
        targets.sort_unstable();
        targets.dedup();
        if !targets.is_empty() {
            graph.edges.insert(from, targets);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GO_MOD: &str = r#"
module example.com/app

go 1.21

require (
	github.com/acme/left-pad v1.2.3
	github.com/acme/utils v0.4.0 // indirect
)

require github.com/acme/solo v2.0.0+incompatible
"#;

    #[test]
    fn test_parse_go_mod() {
        let parsed = parse_go_mod(GO_MOD).unwrap();
        assert_eq!(parsed.module, "example.com/app");
        assert_eq!(parsed.requires.len(), 3);
        assert_eq!(parsed.requires[0].path, "github.com/acme/left-pad");
        assert_eq!(parsed.requires[0].version, "v1.2.3");
        assert!(!parsed.requires[0].indirect);
        assert!(parsed.requires[1].indirect);
        assert_eq!(parsed.requires[2].version, "v2.0.0+incompatible");
    }

    #[test]
    fn test_builtin_detection() {
        assert!(is_go_builtin("fmt"));
        assert!(is_go_builtin("os/exec"));
        assert!(is_go_builtin("net/http"));
        assert!(!is_go_builtin("github.com/acme/utils"));
        assert!(!is_go_builtin("example.com/app"));
    }

    #[test]
    fn test_escape_module_path() {
        assert_eq!(
            escape_module_path("github.com/Azure/azure-sdk"),
            "github.com/!azure/azure-sdk"
        );
        assert_eq!(escape_module_path("example.com/app"), "example.com/app");
    }

    #[test]
    fn test_extract_imports() {
        let src = r#"
package main

import (
	"fmt"
	"os/exec"
	u "github.com/acme/utils"
)

import "net/http"
"#;
        let imports = extract_go_imports(src);
        assert_eq!(imports, vec!["fmt", "os/exec", "github.com/acme/utils", "net/http"]);
    }

    #[test]
    fn test_load_fixture_project() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("go.mod"), GO_MOD).unwrap();
        std::fs::write(
            tmp.path().join("go.sum"),
            "github.com/acme/left-pad v1.2.3 h1:abc=\ngithub.com/acme/left-pad v1.2.3/go.mod h1:def=\n",
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("main.go"),
            "package main\n\nimport \"github.com/acme/left-pad\"\n\nfunc main() { leftpad.Pad() }\n",
        )
        .unwrap();

        let loader = GoModLoader::with_mod_cache(tmp.path().join("empty-cache"));
        let graph = loader.load(tmp.path()).unwrap();

        assert_eq!(graph.main, "example.com/app");
        assert!(graph.main_module().is_main);
        assert_eq!(graph.modules.len(), 4);
        let dep = &graph.modules["github.com/acme/left-pad"];
        assert_eq!(dep.version, "v1.2.3");
        assert!(dep.dir.is_none());

        // Main package discovered, marked as entry, edge to the stub dep.
        let main_pkg = &graph.packages["example.com/app"];
        assert!(main_pkg.is_entry_point());
        assert_eq!(
            graph.edges["example.com/app"],
            vec!["github.com/acme/left-pad"]
        );
        // Stub package exists so the edge invariant holds.
        assert!(graph.packages.contains_key("github.com/acme/left-pad"));
    }
}
