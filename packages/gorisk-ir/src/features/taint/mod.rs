//! Taint engine
//!
//! Source → sink flows over the propagation summaries: a finding is a
//! (source, sink) capability pair present in one function summary with no
//! sanitizer on the delivering call path. Findings deduplicate by
//! (package, source, sink), keeping the highest risk.

use crate::features::propagation::PropagationResult;
use crate::shared::models::{Capability, RiskLevel, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaintFinding {
    pub package: String,
    pub source: Capability,
    pub sink: Capability,
    pub risk: RiskLevel,
    /// The function plus the callees that delivered the flow.
    pub path: Vec<Symbol>,
}

/// Detect taint flows across every function summary.
pub fn analyze(propagation: &PropagationResult) -> Vec<TaintFinding> {
    let mut best: BTreeMap<(String, Capability, Capability), TaintFinding> = BTreeMap::new();

    for summary in propagation.summaries.values() {
        if !summary.has_taint_pair() {
            continue;
        }
        // Sanitizer on the path: the function or one of the callees that
        // delivered its capabilities exercises a sanitizer class.
        if !summary.sanitizers.is_empty() {
            continue;
        }

        let package = summary.node.function.package.clone();
        let mut path = vec![summary.node.function.clone()];
        for edge in &summary.call_stack {
            if !path.contains(&edge.callee) {
                path.push(edge.callee.clone());
            }
        }

        for source in &summary.sources {
            for sink in &summary.sinks {
                let source_direct = summary.direct.contains(source);
                let sink_direct = summary.direct.contains(sink);
                let risk = match (source_direct, sink_direct) {
                    (true, true) => RiskLevel::High,
                    (true, false) | (false, true) => RiskLevel::Medium,
                    (false, false) => RiskLevel::Low,
                };

                let key = (package.clone(), *source, *sink);
                let candidate = TaintFinding {
                    package: package.clone(),
                    source: *source,
                    sink: *sink,
                    risk,
                    path: path.clone(),
                };
                match best.get(&key) {
                    Some(existing) if existing.risk >= risk => {}
                    _ => {
                        best.insert(key, candidate);
                    }
                }
            }
        }
    }

    let mut findings: Vec<TaintFinding> = best.into_values().collect();
    findings.sort_by(|a, b| {
        b.risk
            .cmp(&a.risk)
            .then_with(|| a.package.cmp(&b.package))
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.sink.cmp(&b.sink))
    });
    findings
}
