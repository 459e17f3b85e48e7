//! Upgrade differ
//!
//! Two-version capability and API diffing for a single module.

mod api_diff;
mod differ;
mod materialize;

pub use api_diff::{BreakKind, BreakingChange};
pub use differ::{CapDiff, DifferState, UpgradeDiffer, UpgradeReport};
pub use materialize::{CommandOutput, CommandRunner, FakeRunner, SystemRunner};

use crate::shared::models::{Language, Package};
use std::path::Path;

/// Packages of a materialized module directory, reusing the ecosystem
/// loaders' discovery.
pub(crate) fn discover_module_packages(
    language: Language,
    module: &str,
    dir: &Path,
) -> Vec<Package> {
    match language {
        Language::Go => {
            crate::features::loader::gomod_discover(module, dir).unwrap_or_default()
        }
        Language::JavaScript => {
            vec![crate::features::loader::npm_package(module, dir)]
        }
    }
}
