//! Capability sets
//!
//! A `CapabilitySet` is a set of capabilities plus the evidence supporting
//! each one. The score is always derived from the distinct members, never
//! stored, so adding an already-present capability cannot inflate it.
//! Evidence lists are append-only and preserve discovery order.

use super::capability::{Capability, RiskLevel};
use super::evidence::Evidence;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Set of capabilities with supporting evidence.
///
/// Backed by a `BTreeMap` so iteration is always in canonical capability
/// order; no caller ever needs to re-sort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySet {
    caps: BTreeMap<Capability, Vec<Evidence>>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability with one supporting evidence record. Re-adding a
    /// capability appends evidence and leaves the score unchanged.
    pub fn add(&mut self, cap: Capability, evidence: Evidence) {
        self.caps.entry(cap).or_default().push(evidence);
    }

    /// Add a capability with no evidence (used by pattern validation and
    /// synthetic summaries; evidence can still accumulate later).
    pub fn add_bare(&mut self, cap: Capability) {
        self.caps.entry(cap).or_default();
    }

    pub fn contains(&self, cap: Capability) -> bool {
        self.caps.contains_key(&cap)
    }

    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }

    /// Number of distinct capabilities.
    pub fn len(&self) -> usize {
        self.caps.len()
    }

    /// Distinct capabilities in canonical order.
    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.caps.keys().copied()
    }

    /// Canonical names, in order. Handy for report rows.
    pub fn names(&self) -> Vec<&'static str> {
        self.caps.keys().map(|c| c.name()).collect()
    }

    /// Evidence list for one capability (empty slice when absent).
    pub fn evidence(&self, cap: Capability) -> &[Evidence] {
        self.caps.get(&cap).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Iterate `(capability, evidence)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Capability, &[Evidence])> {
        self.caps.iter().map(|(c, e)| (*c, e.as_slice()))
    }

    /// Sum of weights over distinct capabilities. Derived on demand.
    pub fn score(&self) -> u32 {
        self.caps.keys().map(|c| c.weight()).sum()
    }

    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.score())
    }

    /// Arithmetic mean of the evidence confidences for `cap`; 0 when the
    /// capability has no evidence.
    pub fn avg_confidence(&self, cap: Capability) -> f64 {
        match self.caps.get(&cap) {
            Some(list) if !list.is_empty() => {
                list.iter().map(|e| e.confidence).sum::<f64>() / list.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Merge another set in: union of capabilities, evidence lists
    /// concatenated in order (self's first).
    pub fn merge(&mut self, other: &CapabilitySet) {
        for (cap, list) in &other.caps {
            self.caps.entry(*cap).or_default().extend(list.iter().cloned());
        }
    }

    /// Union without mutating either input.
    pub fn merged_with(&self, other: &CapabilitySet) -> CapabilitySet {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// Total number of evidence records across all capabilities.
    pub fn evidence_count(&self) -> usize {
        self.caps.values().map(|v| v.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::evidence::EvidenceVia;

    fn ev(file: &str, line: u32) -> Evidence {
        Evidence::new(file, line, "ctx", EvidenceVia::Import, 0.9)
    }

    #[test]
    fn test_score_is_sum_of_distinct_weights() {
        let mut s = CapabilitySet::new();
        s.add(Capability::Exec, ev("a.go", 1));
        assert_eq!(s.score(), 20);
        s.add(Capability::Network, ev("a.go", 2));
        assert_eq!(s.score(), 35);
    }

    #[test]
    fn test_double_add_keeps_score() {
        let mut s = CapabilitySet::new();
        s.add(Capability::Exec, ev("a.go", 1));
        let before = s.score();
        s.add(Capability::Exec, ev("a.go", 9));
        assert_eq!(s.score(), before);
        assert_eq!(s.evidence(Capability::Exec).len(), 2);
    }

    #[test]
    fn test_merge_concatenates_evidence_in_order() {
        let mut a = CapabilitySet::new();
        a.add(Capability::Exec, ev("a.go", 1));
        let mut b = CapabilitySet::new();
        b.add(Capability::Exec, ev("b.go", 2));
        b.add(Capability::Env, ev("b.go", 3));

        a.merge(&b);
        let list = a.evidence(Capability::Exec);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].file, "a.go");
        assert_eq!(list[1].file, "b.go");
        assert!(a.contains(Capability::Env));
    }

    #[test]
    fn test_avg_confidence() {
        let mut s = CapabilitySet::new();
        assert_eq!(s.avg_confidence(Capability::Exec), 0.0);
        s.add(
            Capability::Exec,
            Evidence::new("a.go", 1, "c", EvidenceVia::Import, 0.9),
        );
        s.add(
            Capability::Exec,
            Evidence::new("a.go", 2, "c", EvidenceVia::CallSite, 0.6),
        );
        assert!((s.avg_confidence(Capability::Exec) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_risk_level_thresholds() {
        let mut s = CapabilitySet::new();
        s.add(Capability::Crypto, ev("a.go", 1)); // 5
        assert_eq!(s.risk_level(), RiskLevel::Low);
        s.add(Capability::Env, ev("a.go", 2)); // 10
        assert_eq!(s.risk_level(), RiskLevel::Medium);
        s.add(Capability::Exec, ev("a.go", 3)); // 30
        assert_eq!(s.risk_level(), RiskLevel::High);
    }

    #[test]
    fn test_iteration_is_name_sorted() {
        let mut s = CapabilitySet::new();
        s.add(Capability::Unsafe, ev("a.go", 1));
        s.add(Capability::Crypto, ev("a.go", 2));
        s.add(Capability::Network, ev("a.go", 3));
        let names = s.names();
        assert_eq!(names, vec!["crypto", "network", "unsafe"]);
    }
}
