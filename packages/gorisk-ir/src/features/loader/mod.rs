//! Dependency-graph loaders
//!
//! One adapter per ecosystem. A loader reads the manifest and lockfile of
//! a project directory and produces the canonical `DependencyGraph`.
//!
//! Contracts every loader honors:
//! - a non-null, unique main module equal to the root project
//! - version strings verbatim from the lockfile
//! - direct dependencies become edges from main packages
//! - platform built-ins are filtered from the emitted packages
//! - workspace members emerge as additional `is_main` modules
//! - a failure on one dependency never aborts the graph; a missing `dir`
//!   only means source-level evidence cannot be collected for it

mod gomod;
mod npm;

pub use gomod::GoModLoader;
pub use npm::NpmLoader;

use crate::shared::models::Package;

/// Discovery reused by the upgrade differ on materialized directories.
pub(crate) fn gomod_discover(module: &str, dir: &Path) -> Result<Vec<Package>> {
    gomod::discover_packages(module, dir)
}

pub(crate) fn npm_package(module: &str, dir: &Path) -> Package {
    let deps = std::collections::BTreeMap::new();
    npm::make_package(module, module, dir, false, &deps)
}

use crate::errors::{GoriskError, Result};
use crate::shared::models::{DependencyGraph, Language};
use std::path::Path;

/// Adapter contract for ecosystem loaders.
pub trait EcosystemLoader {
    fn language(&self) -> Language;

    /// True when `dir` looks like a project of this ecosystem.
    fn detect(&self, dir: &Path) -> bool;

    /// Build the canonical graph for the project at `dir`.
    fn load(&self, dir: &Path) -> Result<DependencyGraph>;
}

/// Pick a loader for `dir`, honoring an explicit language override.
pub fn loader_for(dir: &Path, lang: Option<Language>) -> Result<Box<dyn EcosystemLoader>> {
    let candidates: Vec<Box<dyn EcosystemLoader>> =
        vec![Box::new(GoModLoader::new()), Box::new(NpmLoader::new())];

    match lang {
        Some(lang) => candidates
            .into_iter()
            .find(|l| l.language() == lang)
            .ok_or_else(|| GoriskError::config(format!("unsupported language: {lang}"))),
        None => {
            for loader in candidates {
                if loader.detect(dir) {
                    return Ok(loader);
                }
            }
            Err(GoriskError::loader(format!(
                "no supported manifest found in {}",
                dir.display()
            )))
        }
    }
}

/// Load the project graph, auto-detecting the ecosystem unless overridden.
pub fn load_project(dir: &Path, lang: Option<Language>) -> Result<DependencyGraph> {
    loader_for(dir, lang)?.load(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_fails_on_empty_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(loader_for(tmp.path(), None).is_err());
    }

    #[test]
    fn test_explicit_language_skips_detection() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = loader_for(tmp.path(), Some(Language::Go)).unwrap();
        assert_eq!(loader.language(), Language::Go);
    }
}
