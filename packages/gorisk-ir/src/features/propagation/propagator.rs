//! Capability propagator
//!
//! Forward dataflow over the IR call graph: every function accumulates
//! the capabilities of its callees with hop-decayed confidence.
//!
//! Algorithm:
//! 1. Build context nodes (k-CFA, k ∈ {0,1}) over the propagation edges
//! 2. Tarjan SCC over the context graph; each SCC becomes one node whose
//!    direct set is the union of its member functions'
//! 3. Bounded delta fixpoint (default 3 passes): facts added in pass p-1
//!    flow across condensed edges in pass p, decayed by `multiplier(p+1)`
//! 4. Project SCC results back to functions and per-context summaries
//!
//! Direct capability sets are never modified; every transitive fact is a
//! freshly-emitted evidence record decayed from its origin confidence.
//!
//! Termination: the pass bound caps iteration; the delta scheme makes
//! each pass monotone, so a typical module converges in 2-3 passes.
//! Work per pass is O(edges × caps).

use super::context::{Context, ContextNode};
use super::summary::FunctionSummary;
use crate::config::AnalysisConfig;
use crate::features::ir_builder::IrGraph;
use crate::shared::models::{
    CallEdge, Capability, CapabilitySet, Evidence, FunctionCaps, Symbol,
};
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Hop-decay multipliers: direct 1.00, then 0.70 / 0.55 / 0.40 for hop 3+.
pub fn multiplier(hop: u32) -> f64 {
    match hop {
        0 => 1.00,
        1 => 0.70,
        2 => 0.55,
        _ => 0.40,
    }
}

/// Per-function propagation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropagationState {
    Unvisited,
    Propagating,
    Converged,
}

/// Propagation output: new `FunctionCaps` values (inputs untouched),
/// per-context summaries, and fixpoint bookkeeping.
#[derive(Debug, Clone)]
pub struct PropagationResult {
    pub functions: BTreeMap<Symbol, FunctionCaps>,
    /// Keyed by the context node's canonical string.
    pub summaries: BTreeMap<String, FunctionSummary>,
    pub passes: u32,
    pub converged: bool,
    pub states: BTreeMap<Symbol, PropagationState>,
}

struct SccNode {
    /// Indexes into the context-node list.
    members: Vec<usize>,
    /// Union of the member functions' direct sets.
    direct: CapabilitySet,
    transitive: CapabilitySet,
    /// Facts added in the previous pass, in insertion order.
    delta: Vec<(Capability, Evidence)>,
    /// Edges that delivered facts here.
    call_stack: Vec<CallEdge>,
    last_changed: Option<u32>,
    state: PropagationState,
}

struct CondensedEdge {
    caller: usize,
    callee: usize,
    /// Canonical string of the callee function (for evidence context).
    via: String,
    origin: CallEdge,
}

pub fn propagate(ir: &IrGraph, config: &AnalysisConfig) -> PropagationResult {
    let k = config.context_k as usize;

    // ── 1. Context nodes ────────────────────────────────────────────────
    let mut callers_of: FxHashMap<&Symbol, BTreeSet<&Symbol>> = FxHashMap::default();
    for edge in ir.propagation_edges() {
        callers_of.entry(&edge.callee).or_default().insert(&edge.caller);
    }

    let mut nodes: Vec<ContextNode> = Vec::new();
    let mut node_index: FxHashMap<ContextNode, usize> = FxHashMap::default();
    let mut push_node = |nodes: &mut Vec<ContextNode>,
                         node_index: &mut FxHashMap<ContextNode, usize>,
                         node: ContextNode| {
        *node_index.entry(node.clone()).or_insert_with(|| {
            nodes.push(node);
            nodes.len() - 1
        })
    };

    for symbol in ir.functions.keys() {
        let contexts: Vec<Context> = if k == 0 {
            vec![Context::empty()]
        } else {
            match callers_of.get(symbol) {
                Some(callers) if !callers.is_empty() => callers
                    .iter()
                    .map(|c| Context::of_caller((*c).clone()))
                    .collect(),
                _ => vec![Context::empty()],
            }
        };
        for context in contexts {
            push_node(
                &mut nodes,
                &mut node_index,
                ContextNode {
                    function: symbol.clone(),
                    context,
                },
            );
        }
    }

    // ── 2. Context edges ────────────────────────────────────────────────
    let mut nodes_of_fn: FxHashMap<&Symbol, Vec<usize>> = FxHashMap::default();
    for (idx, node) in nodes.iter().enumerate() {
        nodes_of_fn.entry(&node.function).or_default().push(idx);
    }

    // (caller-node, callee-node, original edge)
    let mut ctx_edges: Vec<(usize, usize, CallEdge)> = Vec::new();
    for edge in ir.propagation_edges() {
        let target = if k == 0 {
            ContextNode::insensitive(edge.callee.clone())
        } else {
            ContextNode::with_caller(edge.callee.clone(), edge.caller.clone())
        };
        let Some(&target_idx) = node_index.get(&target) else {
            continue;
        };
        if let Some(caller_idxs) = nodes_of_fn.get(&edge.caller) {
            for idx in caller_idxs {
                ctx_edges.push((*idx, target_idx, edge.clone()));
            }
        }
    }

    // ── 3. SCC condensation ─────────────────────────────────────────────
    let mut call_graph: DiGraph<usize, ()> = DiGraph::new();
    let pg_nodes: Vec<_> = (0..nodes.len()).map(|i| call_graph.add_node(i)).collect();
    for (from, to, _) in &ctx_edges {
        call_graph.add_edge(pg_nodes[*from], pg_nodes[*to], ());
    }
    let sccs = tarjan_scc(&call_graph);
    let mut scc_of = vec![0usize; nodes.len()];
    for (scc_id, members) in sccs.iter().enumerate() {
        for node_idx in members {
            scc_of[call_graph[*node_idx]] = scc_id;
        }
    }

    let mut scc_nodes: Vec<SccNode> = Vec::with_capacity(sccs.len());
    for members in &sccs {
        let member_idxs: Vec<usize> = members.iter().map(|n| call_graph[*n]).collect();
        // Union member functions' direct sets, each distinct function once.
        let mut seen: BTreeSet<&Symbol> = BTreeSet::new();
        let mut direct = CapabilitySet::new();
        for idx in &member_idxs {
            let function = &nodes[*idx].function;
            if seen.insert(function) {
                if let Some(caps) = ir.functions.get(function) {
                    direct.merge(&caps.direct);
                }
            }
        }
        scc_nodes.push(SccNode {
            members: member_idxs,
            direct,
            transitive: CapabilitySet::new(),
            delta: Vec::new(),
            call_stack: Vec::new(),
            last_changed: None,
            state: PropagationState::Unvisited,
        });
    }

    // Condensed edges, deterministic order, intra-SCC dropped.
    let mut condensed: Vec<CondensedEdge> = Vec::new();
    {
        let mut seen: BTreeSet<(usize, usize, String)> = BTreeSet::new();
        for (from, to, origin) in &ctx_edges {
            let (su, sv) = (scc_of[*from], scc_of[*to]);
            if su == sv {
                continue;
            }
            let via = nodes[*to].function.to_string();
            if seen.insert((su, sv, via.clone())) {
                condensed.push(CondensedEdge {
                    caller: su,
                    callee: sv,
                    via,
                    origin: origin.clone(),
                });
            }
        }
        condensed.sort_by(|a, b| {
            (a.caller, a.callee, &a.via).cmp(&(b.caller, b.callee, &b.via))
        });
    }

    info!(
        functions = ir.functions.len(),
        context_nodes = nodes.len(),
        sccs = scc_nodes.len(),
        edges = condensed.len(),
        k,
        "propagation fixpoint starting"
    );

    // ── 4. Bounded delta fixpoint ───────────────────────────────────────
    let mut passes = 0u32;
    let mut converged = false;
    for pass in 0..config.max_passes {
        if config.cancel.is_cancelled() {
            debug!(pass, "propagation cancelled");
            break;
        }
        passes = pass + 1;
        let hop_multiplier = multiplier(pass + 1);

        // Jacobi step: read from the previous pass only.
        let mut additions: Vec<(usize, Capability, Evidence, CallEdge)> = Vec::new();
        for edge in &condensed {
            let source = &scc_nodes[edge.callee];
            if pass == 0 {
                for (cap, evidence) in source.direct.iter() {
                    for ev in evidence {
                        additions.push((
                            edge.caller,
                            cap,
                            ev.transitive_via(&edge.via, hop_multiplier),
                            edge.origin.clone(),
                        ));
                    }
                }
            } else {
                for (cap, ev) in &source.delta {
                    additions.push((
                        edge.caller,
                        *cap,
                        ev.transitive_via(&edge.via, hop_multiplier),
                        edge.origin.clone(),
                    ));
                }
            }
        }

        let mut next_deltas: Vec<Vec<(Capability, Evidence)>> =
            vec![Vec::new(); scc_nodes.len()];
        let mut changed = false;
        for (target, cap, evidence, origin) in additions {
            let node = &mut scc_nodes[target];
            if node.transitive.evidence(cap).contains(&evidence) {
                continue;
            }
            node.transitive.add(cap, evidence.clone());
            next_deltas[target].push((cap, evidence));
            if !node.call_stack.contains(&origin) {
                node.call_stack.push(origin);
            }
            node.last_changed = Some(pass);
            node.state = PropagationState::Propagating;
            changed = true;
        }
        for (node, delta) in scc_nodes.iter_mut().zip(next_deltas) {
            node.delta = delta;
        }

        if !changed {
            converged = true;
            break;
        }
    }
    if !converged {
        // Pass bound hit (or cancelled) while facts were still moving.
        debug!(passes, "fixpoint stopped at pass bound");
    }

    // Nodes that stopped changing are converged; with a clean fixpoint
    // exit that is everyone that ever propagated.
    for node in &mut scc_nodes {
        let still_moving = !converged && !node.delta.is_empty();
        if !still_moving && node.state == PropagationState::Propagating {
            node.state = PropagationState::Converged;
        }
    }

    project(ir, &nodes, &scc_of, &scc_nodes, passes, converged)
}

/// Transitive set for one member of an SCC: the SCC's inflow plus the
/// other members' direct capabilities at hop 1 (mutual recursion).
fn member_transitive(
    ir: &IrGraph,
    nodes: &[ContextNode],
    scc: &SccNode,
    member_fn: &Symbol,
) -> CapabilitySet {
    let mut out = scc.transitive.clone();
    let mut others: BTreeSet<&Symbol> = BTreeSet::new();
    for idx in &scc.members {
        let function = &nodes[*idx].function;
        if function != member_fn {
            others.insert(function);
        }
    }
    for other in others {
        if let Some(caps) = ir.functions.get(other) {
            let via = other.to_string();
            for (cap, evidence) in caps.direct.iter() {
                for ev in evidence {
                    let derived = ev.transitive_via(&via, multiplier(1));
                    if !out.evidence(cap).contains(&derived) {
                        out.add(cap, derived);
                    }
                }
            }
        }
    }
    out
}

fn project(
    ir: &IrGraph,
    nodes: &[ContextNode],
    scc_of: &[usize],
    scc_nodes: &[SccNode],
    passes: u32,
    converged: bool,
) -> PropagationResult {
    let mut functions: BTreeMap<Symbol, FunctionCaps> = BTreeMap::new();
    let mut summaries: BTreeMap<String, FunctionSummary> = BTreeMap::new();
    let mut states: BTreeMap<Symbol, PropagationState> = BTreeMap::new();

    for (idx, node) in nodes.iter().enumerate() {
        let scc = &scc_nodes[scc_of[idx]];
        let transitive = member_transitive(ir, nodes, scc, &node.function);
        let depth = scc.last_changed.map(|p| p + 1).unwrap_or(0);
        let direct = ir
            .functions
            .get(&node.function)
            .map(|f| f.direct.clone())
            .unwrap_or_default();

        let mut call_stack = scc.call_stack.clone();
        call_stack.sort_by(|a, b| {
            (&a.caller, &a.callee, &a.file, a.line).cmp(&(&b.caller, &b.callee, &b.file, b.line))
        });

        let summary = FunctionSummary::new(
            node.clone(),
            &direct,
            transitive.clone(),
            depth,
            call_stack,
            scc.last_changed.unwrap_or(0),
        );
        summaries.insert(node.to_string(), summary);

        // Function-level projection: union over the function's contexts.
        let entry = functions
            .entry(node.function.clone())
            .or_insert_with(|| FunctionCaps {
                symbol: node.function.clone(),
                direct,
                transitive: CapabilitySet::new(),
                depth: 0,
            });
        for (cap, evidence) in transitive.iter() {
            for ev in evidence {
                if !entry.transitive.evidence(cap).contains(ev) {
                    entry.transitive.add(cap, ev.clone());
                }
            }
        }
        entry.depth = entry.depth.max(depth);

        let state = states
            .entry(node.function.clone())
            .or_insert(PropagationState::Unvisited);
        if scc.state != PropagationState::Unvisited {
            *state = scc.state;
        }
    }

    PropagationResult {
        functions,
        summaries,
        passes,
        converged,
        states,
    }
}
