//! Per-file source scanners
//!
//! One scanner per language, all satisfying the same adapter contract:
//! given a file and the pattern rules for its language, emit a file-level
//! capability set (import evidence), per-function direct capability sets
//! (call-site evidence) and intra-file call edges.
//!
//! Scanning is embarrassingly parallel over files; `scan_graph` runs the
//! files through a fixed-size rayon pool and joins results through a
//! concurrent map. A file that fails to parse is scanned by the regex
//! fallback; a file that cannot be read is skipped with a debug log.

mod fallback;
mod go_scanner;
mod install_scripts;
mod js_scanner;

pub use go_scanner::GoScanner;
pub use js_scanner::JsScanner;

use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::features::patterns::{registry, LanguageRules};
use crate::shared::models::{CallEdge, CapabilitySet, DependencyGraph, Language, Package, Symbol};
use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Scanner output for one file.
#[derive(Debug, Clone, Default)]
pub struct FileScan {
    /// Display path used in evidence records.
    pub file: String,
    /// Import-level evidence.
    pub file_caps: CapabilitySet,
    /// Direct capabilities per function defined in this file.
    pub functions: Vec<(Symbol, CapabilitySet)>,
    /// Call edges observed in this file (some unresolved).
    pub calls: Vec<CallEdge>,
}

/// Adapter contract for per-language scanners.
pub trait SourceScanner: Send + Sync {
    fn language(&self) -> Language;

    /// Scan one source file of `pkg`.
    fn scan_file(&self, pkg: &Package, path: &Path, rules: &LanguageRules) -> Result<FileScan>;
}

/// Joined scanner output for one package.
#[derive(Debug, Clone, Default)]
pub struct PackageScan {
    pub import_path: String,
    /// Union of file-level and function-level evidence.
    pub caps: CapabilitySet,
    /// Function symbol → direct capability set.
    pub functions: BTreeMap<Symbol, CapabilitySet>,
    pub calls: Vec<CallEdge>,
}

impl PackageScan {
    fn absorb(&mut self, scan: FileScan) {
        self.caps.merge(&scan.file_caps);
        for (symbol, caps) in scan.functions {
            self.caps.merge(&caps);
            self.functions.entry(symbol).or_default().merge(&caps);
        }
        self.calls.extend(scan.calls);
    }
}

fn scanner_for(language: Language) -> Box<dyn SourceScanner> {
    match language {
        Language::Go => Box::new(GoScanner::new()),
        Language::JavaScript => Box::new(JsScanner::new()),
    }
}

/// Scan every package of the graph that has a source directory.
///
/// Files fan out over a fixed worker pool (`config.workers`, CPU count by
/// default); workers share no mutable state and results join through a
/// concurrent map. Returns packages in path order.
pub fn scan_graph(
    graph: &DependencyGraph,
    config: &AnalysisConfig,
) -> Result<BTreeMap<String, PackageScan>> {
    let rules = registry()
        .rules(graph.language)
        .ok_or_else(|| crate::errors::GoriskError::config("no pattern table for language"))?;
    let scanner = scanner_for(graph.language);

    let jobs: Vec<(&Package, &Path)> = graph
        .packages
        .values()
        .filter(|p| p.dir.is_some())
        .flat_map(|p| p.source_files.iter().map(move |f| (p, f.as_path())))
        .collect();
    info!(files = jobs.len(), "scanning source files");

    // Workers share no mutable state; per-file results land in a
    // concurrent map and are merged afterwards in sorted file order so
    // evidence ordering is a pure function of the inputs, not of thread
    // scheduling.
    let by_file: DashMap<(String, String), FileScan> = DashMap::new();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .map_err(|e| crate::errors::GoriskError::analysis(format!("worker pool: {e}")))?;

    pool.install(|| {
        jobs.par_iter().for_each(|(pkg, path)| {
            if config.cancel.is_cancelled() {
                return;
            }
            match scanner.scan_file(pkg, path, rules) {
                Ok(scan) => {
                    by_file.insert(
                        (pkg.import_path.clone(), scan.file.clone()),
                        scan,
                    );
                }
                Err(err) => {
                    debug!(file = %path.display(), %err, "scan failed; file skipped");
                }
            }
        });
    });

    let mut sorted: Vec<((String, String), FileScan)> = by_file.into_iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out: BTreeMap<String, PackageScan> = BTreeMap::new();
    for ((pkg_path, _), scan) in sorted {
        out.entry(pkg_path.clone())
            .or_insert_with(|| PackageScan {
                import_path: pkg_path,
                ..Default::default()
            })
            .absorb(scan);
    }

    // npm install scripts are package-level, not per-file.
    if graph.language == Language::JavaScript {
        for pkg in graph.packages.values() {
            if let Some(dir) = &pkg.dir {
                let caps = install_scripts::scan_install_scripts(dir);
                if !caps.is_empty() {
                    out.entry(pkg.import_path.clone())
                        .or_insert_with(|| PackageScan {
                            import_path: pkg.import_path.clone(),
                            ..Default::default()
                        })
                        .caps
                        .merge(&caps);
                }
            }
        }
    }
    Ok(out)
}

/// Display path for evidence: relative to the package directory.
pub(crate) fn display_path(pkg: &Package, path: &Path) -> String {
    let rel = pkg
        .dir
        .as_deref()
        .and_then(|d| path.strip_prefix(d).ok())
        .unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path_relative_to_package() {
        let pkg = Package {
            dir: Some("/tmp/mod/util".into()),
            ..Default::default()
        };
        assert_eq!(
            display_path(&pkg, Path::new("/tmp/mod/util/io.go")),
            "io.go"
        );
        assert_eq!(
            display_path(&pkg, Path::new("elsewhere/io.go")),
            "elsewhere/io.go"
        );
    }
}
