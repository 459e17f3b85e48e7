//! Function summaries
//!
//! The per-context record every downstream analysis (taint, reachability
//! reporting, explain) consumes. Sources, sinks and sanitizers are the
//! taxonomy-classified subsets of the summary's effects.

use super::context::ContextNode;
use crate::shared::models::{CallEdge, Capability, CapabilitySet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSummary {
    pub node: ContextNode,

    /// Effects classified as taint sources (`env`, `network`, `fs:read`).
    pub sources: BTreeSet<Capability>,

    /// Effects classified as taint sinks (`exec`, `unsafe`).
    pub sinks: BTreeSet<Capability>,

    /// Effects classified as sanitizers (`crypto`).
    pub sanitizers: BTreeSet<Capability>,

    /// All capabilities, direct and transitive.
    pub effects: BTreeSet<Capability>,

    /// Capabilities classified direct at this node.
    pub direct: BTreeSet<Capability>,

    /// Transitive capability set with decayed evidence.
    pub transitive: CapabilitySet,

    /// Deepest hop that contributed a capability.
    pub depth: u32,

    /// Mean evidence confidence across all effects; 1.0 with no evidence.
    pub confidence: f64,

    /// Call edges that delivered transitive capabilities to this node.
    pub call_stack: Vec<CallEdge>,

    /// Fixpoint pass at which this node last changed.
    pub iteration: u32,
}

impl FunctionSummary {
    pub fn new(
        node: ContextNode,
        direct_caps: &CapabilitySet,
        transitive: CapabilitySet,
        depth: u32,
        call_stack: Vec<CallEdge>,
        iteration: u32,
    ) -> FunctionSummary {
        let direct: BTreeSet<Capability> = direct_caps.capabilities().collect();
        let mut effects = direct.clone();
        effects.extend(transitive.capabilities());

        let sources = effects.iter().copied().filter(|c| c.is_source()).collect();
        let sinks = effects.iter().copied().filter(|c| c.is_sink()).collect();
        let sanitizers = effects
            .iter()
            .copied()
            .filter(|c| c.is_sanitizer())
            .collect();

        let mut count = 0usize;
        let mut total = 0.0f64;
        for set in [direct_caps, &transitive] {
            for (_, evidence) in set.iter() {
                for ev in evidence {
                    count += 1;
                    total += ev.confidence;
                }
            }
        }
        let confidence = if count == 0 { 1.0 } else { total / count as f64 };

        FunctionSummary {
            node,
            sources,
            sinks,
            sanitizers,
            effects,
            direct,
            transitive,
            depth,
            confidence,
            call_stack,
            iteration,
        }
    }

    /// A source and a sink coexist in this summary.
    pub fn has_taint_pair(&self) -> bool {
        !self.sources.is_empty() && !self.sinks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{Evidence, EvidenceVia, Symbol};

    #[test]
    fn test_classification() {
        let mut direct = CapabilitySet::new();
        direct.add(
            Capability::Network,
            Evidence::new("a.go", 1, "http.Get", EvidenceVia::CallSite, 0.75),
        );
        let mut transitive = CapabilitySet::new();
        transitive.add(
            Capability::Exec,
            Evidence::new("b.go", 2, "exec.Command (transitive via p.b)", EvidenceVia::Transitive, 0.525),
        );

        let node = ContextNode::insensitive(Symbol::func("p", "a"));
        let summary = FunctionSummary::new(node, &direct, transitive, 1, Vec::new(), 1);

        assert!(summary.sources.contains(&Capability::Network));
        assert!(summary.sinks.contains(&Capability::Exec));
        assert!(summary.sanitizers.is_empty());
        assert!(summary.has_taint_pair());
        assert!((summary.confidence - (0.75 + 0.525) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summary_confidence_is_one() {
        let node = ContextNode::insensitive(Symbol::func("p", "quiet"));
        let summary =
            FunctionSummary::new(node, &CapabilitySet::new(), CapabilitySet::new(), 0, vec![], 0);
        assert_eq!(summary.confidence, 1.0);
        assert!(!summary.has_taint_pair());
    }
}
