/*
 * gorisk-ir - dependency capability analysis engine
 *
 * Feature-first layout:
 * - shared/   : common models (Capability, Evidence, CapabilitySet, graph)
 * - features/ : vertical slices (patterns → loader → scanner → ir →
 *               propagation → aggregation / reachability / taint /
 *               scoring / upgrade / impact / policy)
 * - pipeline/ : stage orchestration
 *
 * Answers, for every dependency of a project: what can it do, how do we
 * know, and does the project actually reach it.
 */

#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::collapsible_if)]
#![allow(clippy::module_inception)]
#![allow(clippy::new_without_default)]

/// Shared models
pub mod shared;

/// Feature modules
pub mod features;

/// Pipeline orchestration
pub mod pipeline;

/// Analysis configuration
pub mod config;

/// Error types
pub mod errors;

pub use config::{AnalysisConfig, CancelFlag};
pub use errors::{GoriskError, Result};
pub use pipeline::{AnalysisPipeline, AnalysisReport};
pub use shared::models::{
    Capability, CapabilitySet, DependencyGraph, Evidence, EvidenceVia, Language, Module, Package,
    RiskLevel, Symbol,
};
