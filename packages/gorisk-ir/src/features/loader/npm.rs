//! npm loader
//!
//! Reads `package.json` + `package-lock.json` (v2/v3 `packages` map) and
//! maps each installed dependency to one module + one package. Versions
//! come verbatim from the lockfile; a dependency absent from
//! `node_modules` keeps its nodes with `dir = None`.

use super::EcosystemLoader;
use crate::errors::{GoriskError, Result};
use crate::shared::models::{DependencyGraph, Language, Module, Package};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Node.js built-in modules (import targets filtered from the graph).
const NODE_BUILTINS: &[&str] = &[
    "assert", "buffer", "child_process", "cluster", "console", "constants", "crypto", "dgram",
    "dns", "domain", "events", "fs", "http", "http2", "https", "module", "net", "os", "path",
    "perf_hooks", "process", "punycode", "querystring", "readline", "repl", "stream",
    "string_decoder", "timers", "tls", "tty", "url", "util", "v8", "vm", "worker_threads", "zlib",
];

pub(crate) fn is_node_builtin(specifier: &str) -> bool {
    if let Some(rest) = specifier.strip_prefix("node:") {
        return is_node_builtin(rest);
    }
    let root = specifier.split('/').next().unwrap_or(specifier);
    NODE_BUILTINS.contains(&root)
}

#[derive(Debug, Deserialize)]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    workspaces: Workspaces,
    #[serde(default)]
    bin: Option<serde_json::Value>,
}

/// npm accepts both the array and the `{ "packages": [...] }` object form.
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum Workspaces {
    #[default]
    None,
    List(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

impl Workspaces {
    fn patterns(&self) -> &[String] {
        match self {
            Workspaces::None => &[],
            Workspaces::List(list) => list,
            Workspaces::Object { packages } => packages,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PackageLock {
    #[serde(default)]
    packages: BTreeMap<String, LockEntry>,
}

#[derive(Debug, Deserialize)]
struct LockEntry {
    version: Option<String>,
    #[serde(default)]
    dev: bool,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

pub struct NpmLoader;

impl NpmLoader {
    pub fn new() -> NpmLoader {
        NpmLoader
    }
}

impl Default for NpmLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl EcosystemLoader for NpmLoader {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn detect(&self, dir: &Path) -> bool {
        dir.join("package.json").is_file()
    }

    fn load(&self, dir: &Path) -> Result<DependencyGraph> {
        let manifest: PackageJson = read_json(&dir.join("package.json"))?;
        let root_name = manifest
            .name
            .clone()
            .unwrap_or_else(|| "root".to_string());

        let main = Module {
            path: root_name.clone(),
            version: manifest.version.clone().unwrap_or_default(),
            dir: Some(dir.to_path_buf()),
            is_main: true,
            is_indirect: false,
            packages: Vec::new(),
        };
        let mut graph = DependencyGraph::new(Language::JavaScript, main);

        // Root package: always an entry point.
        let root_pkg = make_package(&root_name, &root_name, dir, true, &manifest.dependencies);
        install_package(&mut graph, root_pkg);

        // Workspace members are additional main modules.
        for pattern in manifest.workspaces.patterns() {
            for member_dir in expand_workspace(dir, pattern) {
                let Ok(member) = read_json::<PackageJson>(&member_dir.join("package.json"))
                else {
                    continue;
                };
                let Some(name) = member.name.clone() else {
                    continue;
                };
                graph.modules.insert(
                    name.clone(),
                    Module {
                        path: name.clone(),
                        version: member.version.clone().unwrap_or_default(),
                        dir: Some(member_dir.clone()),
                        is_main: true,
                        is_indirect: false,
                        packages: Vec::new(),
                    },
                );
                let pkg = make_package(
                    &name,
                    &name,
                    &member_dir,
                    member.bin.is_some(),
                    &member.dependencies,
                );
                install_package(&mut graph, pkg);
            }
        }

        // Lockfile: every installed dependency, version verbatim.
        let lock_path = dir.join("package-lock.json");
        if lock_path.is_file() {
            let lock: PackageLock = read_json(&lock_path)?;
            let direct: Vec<&String> = manifest.dependencies.keys().collect();
            for (lock_key, entry) in &lock.packages {
                let Some(name) = lock_key_to_name(lock_key) else {
                    continue;
                };
                if entry.dev || graph.modules.contains_key(&name) {
                    continue;
                }
                let version = entry.version.clone().unwrap_or_default();
                let dep_dir = dir.join(lock_key);
                let dep_dir = dep_dir.is_dir().then_some(dep_dir);
                if dep_dir.is_none() {
                    debug!(module = %name, "not installed; no source evidence");
                }
                graph.modules.insert(
                    name.clone(),
                    Module {
                        path: name.clone(),
                        version,
                        dir: dep_dir.clone(),
                        is_main: false,
                        is_indirect: !direct.iter().any(|d| **d == name),
                        packages: Vec::new(),
                    },
                );

                let mut dep_manifest_deps = entry.dependencies.clone();
                if dep_manifest_deps.is_empty() {
                    if let Some(d) = &dep_dir {
                        if let Ok(dep_manifest) =
                            read_json::<PackageJson>(&d.join("package.json"))
                        {
                            dep_manifest_deps = dep_manifest.dependencies;
                        }
                    }
                }
                let is_entry = dep_dir
                    .as_deref()
                    .and_then(|d| read_json::<PackageJson>(&d.join("package.json")).ok())
                    .map(|m| m.bin.is_some())
                    .unwrap_or(false);
                let pkg = match &dep_dir {
                    Some(d) => make_package(&name, &name, d, is_entry, &dep_manifest_deps),
                    None => Package {
                        import_path: name.clone(),
                        name: short_name(&name),
                        module_ref: name.clone(),
                        direct_imports: dep_manifest_deps.keys().cloned().collect(),
                        ..Default::default()
                    },
                };
                install_package(&mut graph, pkg);
            }
        } else {
            debug!("no package-lock.json; graph limited to declared dependencies");
        }

        resolve_edges(&mut graph);
        Ok(graph)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| GoriskError::loader(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| GoriskError::loader(format!("cannot parse {}: {e}", path.display())))
}

/// `node_modules/@scope/name` → `@scope/name`; nested installs resolve to
/// the leaf package; the root entry (`""`) is handled by the caller.
fn lock_key_to_name(key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    let idx = key.rfind("node_modules/")?;
    let name = &key[idx + "node_modules/".len()..];
    (!name.is_empty()).then(|| name.to_string())
}

fn short_name(npm_name: &str) -> String {
    npm_name
        .rsplit('/')
        .next()
        .unwrap_or(npm_name)
        .to_string()
}

pub(crate) fn make_package(
    import_path: &str,
    module_ref: &str,
    dir: &Path,
    is_entry: bool,
    deps: &BTreeMap<String, String>,
) -> Package {
    Package {
        import_path: import_path.to_string(),
        name: short_name(import_path),
        module_ref: module_ref.to_string(),
        dir: Some(dir.to_path_buf()),
        source_files: discover_sources(dir),
        direct_imports: deps.keys().cloned().collect(),
        capabilities: Default::default(),
        is_entry,
    }
}

fn install_package(graph: &mut DependencyGraph, pkg: Package) {
    if let Some(module) = graph.modules.get_mut(&pkg.module_ref) {
        if !module.packages.contains(&pkg.import_path) {
            module.packages.push(pkg.import_path.clone());
        }
    }
    graph.packages.insert(pkg.import_path.clone(), pkg);
}

/// JavaScript sources of one package, bounded and deterministic.
fn discover_sources(dir: &Path) -> Vec<PathBuf> {
    const MAX_FILES: usize = 400;
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .max_depth(6)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !(name == "node_modules" || name == "test" || name == "tests" || name.starts_with('.'))
        })
    {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        let is_js = name.ends_with(".js") || name.ends_with(".mjs") || name.ends_with(".cjs");
        if !is_js || name.ends_with(".min.js") {
            continue;
        }
        files.push(entry.path().to_path_buf());
        if files.len() >= MAX_FILES {
            break;
        }
    }
    files.sort();
    files
}

/// Minimal workspace glob: `packages/*` style (one trailing star) or a
/// literal directory.
fn expand_workspace(root: &Path, pattern: &str) -> Vec<PathBuf> {
    if let Some(prefix) = pattern.strip_suffix("/*") {
        let base = root.join(prefix);
        let Ok(entries) = std::fs::read_dir(&base) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir() && p.join("package.json").is_file())
            .collect();
        dirs.sort();
        dirs
    } else {
        let dir = root.join(pattern);
        if dir.join("package.json").is_file() {
            vec![dir]
        } else {
            Vec::new()
        }
    }
}

/// Package edges from declared dependencies; builtins filtered, unknown
/// targets dropped with a debug log.
fn resolve_edges(graph: &mut DependencyGraph) {
    let package_list: Vec<(String, Vec<String>)> = graph
        .packages
        .iter()
        .map(|(p, pkg)| (p.clone(), pkg.direct_imports.clone()))
        .collect();
    for (from, imports) in package_list {
        let mut targets = Vec::new();
        for import in imports {
            if is_node_builtin(&import) {
                continue;
            }
            if graph.packages.contains_key(&import) {
                targets.push(import);
            } else {
                debug!(%from, %import, "declared dependency not in lockfile; dropped");
            }
        }
        targets.sort_unstable();
        targets.dedup();
        if !targets.is_empty() {
            graph.edges.insert(from, targets);
        }
    }
}
