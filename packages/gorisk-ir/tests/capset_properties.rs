//! Property tests for the CapabilitySet invariants.

use gorisk_ir::{Capability, CapabilitySet, Evidence, EvidenceVia};
use proptest::prelude::*;

fn arb_capability() -> impl Strategy<Value = Capability> {
    prop::sample::select(Capability::ALL.to_vec())
}

fn arb_evidence() -> impl Strategy<Value = Evidence> {
    ("[a-z]{1,8}\\.go", 1u32..500, 0.0f64..=1.0).prop_map(|(file, line, confidence)| {
        Evidence::new(file, line, "ctx", EvidenceVia::CallSite, confidence)
    })
}

proptest! {
    /// score == Σ weight(c) over distinct capabilities, whatever the
    /// insertion history.
    #[test]
    fn score_is_sum_of_distinct_weights(
        adds in prop::collection::vec((arb_capability(), arb_evidence()), 0..40)
    ) {
        let mut set = CapabilitySet::new();
        for (cap, ev) in &adds {
            set.add(*cap, ev.clone());
        }
        let expected: u32 = set.capabilities().map(|c| c.weight()).sum();
        prop_assert_eq!(set.score(), expected);

        // re-adding every capability leaves the score unchanged
        let before = set.score();
        for (cap, ev) in &adds {
            set.add(*cap, ev.clone());
        }
        prop_assert_eq!(set.score(), before);
    }

    /// Merge concatenates evidence lists in order, left side first.
    #[test]
    fn merge_concatenates_evidence(
        left in prop::collection::vec((arb_capability(), arb_evidence()), 0..20),
        right in prop::collection::vec((arb_capability(), arb_evidence()), 0..20),
    ) {
        let mut a = CapabilitySet::new();
        for (cap, ev) in &left {
            a.add(*cap, ev.clone());
        }
        let mut b = CapabilitySet::new();
        for (cap, ev) in &right {
            b.add(*cap, ev.clone());
        }

        let merged = a.merged_with(&b);
        for cap in Capability::ALL {
            let mut expected: Vec<Evidence> = a.evidence(cap).to_vec();
            expected.extend(b.evidence(cap).iter().cloned());
            prop_assert_eq!(merged.evidence(cap), expected.as_slice());
        }
    }

    /// Average confidence is the arithmetic mean over the evidence list.
    #[test]
    fn avg_confidence_is_mean(
        evs in prop::collection::vec(arb_evidence(), 1..20)
    ) {
        let mut set = CapabilitySet::new();
        for ev in &evs {
            set.add(Capability::Exec, ev.clone());
        }
        let mean: f64 = evs.iter().map(|e| e.confidence).sum::<f64>() / evs.len() as f64;
        prop_assert!((set.avg_confidence(Capability::Exec) - mean).abs() < 1e-9);
    }
}
