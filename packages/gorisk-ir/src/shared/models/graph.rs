//! Dependency graph model
//!
//! Canonical Package / Module / DependencyGraph produced by the ecosystem
//! loaders and borrowed read-only by every downstream stage. Maps are
//! `BTreeMap` keyed by path so iteration order is deterministic without
//! per-call sorting.

use super::capability::RiskLevel;
use super::capset::CapabilitySet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::path::PathBuf;

/// Supported ecosystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    JavaScript,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::JavaScript => "javascript",
        }
    }

    pub fn parse(s: &str) -> Option<Language> {
        match s.to_ascii_lowercase().as_str() {
            "go" => Some(Language::Go),
            "javascript" | "js" | "npm" | "node" => Some(Language::JavaScript),
            _ => None,
        }
    }

    /// PURL ecosystem component (`pkg:<ecosystem>/...`).
    pub fn purl_type(self) -> &'static str {
        match self {
            Language::Go => "golang",
            Language::JavaScript => "npm",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One importable package inside a module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Unique import path (Go import path, npm package name).
    pub import_path: String,
    /// Short name (`main` marks a binary entry package).
    pub name: String,
    /// Path of the module that owns this package.
    pub module_ref: String,
    /// Source directory, when resolvable. Absent means source-level
    /// evidence cannot be collected for this package.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Declared source files.
    pub source_files: Vec<PathBuf>,
    /// Direct imports (import paths; platform built-ins filtered).
    pub direct_imports: Vec<String>,
    /// Capability set accumulated by the scanner and propagator.
    pub capabilities: CapabilitySet,
    /// Binary entry point: a Go `main` package, or an npm package with a
    /// `bin` stanza (the root package counts).
    #[serde(default)]
    pub is_entry: bool,
}

impl Package {
    /// Entry packages are `main` by name or explicitly marked.
    pub fn is_entry_point(&self) -> bool {
        self.is_entry || self.name == "main"
    }
}

/// One module (Go module / npm package@version).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub path: String,
    /// Version string taken verbatim from the lockfile; empty for main.
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub is_main: bool,
    pub is_indirect: bool,
    /// Import paths of the packages owned by this module. The
    /// `DependencyGraph.packages` map is the single owner of the
    /// `Package` values.
    pub packages: Vec<String>,
}

/// The canonical dependency DAG for one analyzed project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraph {
    pub language: Language,
    /// Path of the main (root) module. Always present and unique.
    pub main: String,
    pub modules: BTreeMap<String, Module>,
    pub packages: BTreeMap<String, Package>,
    /// Package-level import edges. Every target is either a key of
    /// `packages` or was a platform built-in and has been filtered.
    pub edges: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new(language: Language, main: Module) -> DependencyGraph {
        let main_path = main.path.clone();
        let mut modules = BTreeMap::new();
        modules.insert(main_path.clone(), main);
        DependencyGraph {
            language,
            main: main_path,
            modules,
            packages: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }

    pub fn main_module(&self) -> &Module {
        &self.modules[&self.main]
    }

    /// Module owning a package, if the package is known.
    pub fn module_of(&self, import_path: &str) -> Option<&Module> {
        self.packages
            .get(import_path)
            .and_then(|p| self.modules.get(&p.module_ref))
    }

    /// Non-main modules in path order.
    pub fn dependency_modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values().filter(|m| !m.is_main)
    }

    /// Reverse package edge map (`target -> [importers]`), importers sorted.
    pub fn reverse_edges(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut rev: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (from, tos) in &self.edges {
            for to in tos {
                rev.entry(to.as_str()).or_default().push(from.as_str());
            }
        }
        for list in rev.values_mut() {
            list.sort_unstable();
            list.dedup();
        }
        rev
    }

    /// Longest BFS distance from any main-module package to any package of
    /// `module_path`; 0 when unreachable or main itself.
    pub fn module_depth(&self, module_path: &str) -> u32 {
        let Some(target) = self.modules.get(module_path) else {
            return 0;
        };
        let target_pkgs: BTreeSet<&str> =
            target.packages.iter().map(String::as_str).collect();

        // Longest distance via BFS relaxation; the bound caps pathological
        // cycles that a malformed lockfile could introduce.
        let bound = self.packages.len() as u32 + 1;
        let mut best = 0u32;
        let mut dist: BTreeMap<&str, u32> = BTreeMap::new();
        let mut queue = VecDeque::new();
        for root in &self.main_module().packages {
            dist.insert(root.as_str(), 0);
            queue.push_back(root.as_str());
        }
        while let Some(pkg) = queue.pop_front() {
            let d = dist[pkg];
            if target_pkgs.contains(pkg) && d > best {
                best = d;
            }
            if let Some(nexts) = self.edges.get(pkg) {
                for next in nexts {
                    let nd = d + 1;
                    if nd >= bound {
                        continue;
                    }
                    let known = dist.get(next.as_str()).copied();
                    if known.map_or(true, |k| nd > k) {
                        dist.insert(next.as_str(), nd);
                        queue.push_back(next.as_str());
                    }
                }
            }
        }
        best
    }

    /// Deterministic 64-bit identity over sorted modules, their packages,
    /// capability lists and sorted outgoing edges. Used as a cache key;
    /// invariant under map iteration order by construction.
    pub fn checksum(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (path, module) in &self.modules {
            hasher.update(path.as_bytes());
            hasher.update(module.version.as_bytes());
            let mut pkgs = module.packages.clone();
            pkgs.sort_unstable();
            for pkg_path in pkgs {
                hasher.update(pkg_path.as_bytes());
                if let Some(pkg) = self.packages.get(&pkg_path) {
                    for name in pkg.capabilities.names() {
                        hasher.update(name.as_bytes());
                    }
                    if let Some(targets) = self.edges.get(&pkg_path) {
                        let mut sorted = targets.clone();
                        sorted.sort_unstable();
                        for t in sorted {
                            hasher.update(t.as_bytes());
                        }
                    }
                }
            }
        }
        let digest = hasher.finalize();
        let mut id = [0u8; 8];
        id.copy_from_slice(&digest.as_bytes()[..8]);
        format!("{:016x}", u64::from_be_bytes(id))
    }

    /// Max capability risk across a module's packages.
    pub fn module_risk(&self, module: &Module) -> RiskLevel {
        module
            .packages
            .iter()
            .filter_map(|p| self.packages.get(p))
            .map(|p| p.capabilities.risk_level())
            .max()
            .unwrap_or(RiskLevel::Low)
    }
}
