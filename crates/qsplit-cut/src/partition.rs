//! Applying cuts to a circuit graph.
//!
//! Partitioning is a pure value transformation: the input graph is never
//! mutated. Every cut introduces a fresh synthetic wire that takes over the
//! downstream half of the cut wire, and the operations are then grouped into
//! weakly-connected components. Each component becomes a [`Fragment`] with
//! its own compact wire table, and the [`WirePathMap`] records how every
//! original wire is threaded through the fragments.

use petgraph::unionfind::UnionFind;
use qsplit_ir::{CircuitGraph, OpId, WireId};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::cut::CutPosition;
use crate::error::{CutError, CutResult};

/// A sub-circuit produced by cutting.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Position of this fragment in [`Partition::fragments`].
    pub index: usize,
    /// Local circuit on wires `q0..q{n-1}`.
    pub graph: CircuitGraph,
    /// For each local wire, the extended-circuit wire it was built from.
    pub sources: Vec<WireId>,
}

impl Fragment {
    /// Number of local wires.
    #[inline]
    pub fn num_wires(&self) -> usize {
        self.graph.num_wires()
    }

    /// Number of operations.
    #[inline]
    pub fn num_ops(&self) -> usize {
        self.graph.num_ops()
    }

    /// Whether this fragment holds an idle wire and no operations.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.graph.num_ops() == 0
    }
}

/// One step of an original wire's path: a local wire of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PathHop {
    /// Fragment index.
    pub fragment: usize,
    /// Local wire within the fragment.
    pub local: u32,
}

/// The sequence of fragment-local wires an original wire passes through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WirePath {
    /// The original wire.
    pub wire: WireId,
    /// Hops in circuit order, one more than the number of cuts on the wire.
    pub hops: Vec<PathHop>,
}

impl WirePath {
    /// Number of cuts on this wire.
    #[inline]
    pub fn num_cuts(&self) -> usize {
        self.hops.len().saturating_sub(1)
    }

    /// The hop holding the wire's final value.
    #[inline]
    pub fn last(&self) -> Option<PathHop> {
        self.hops.last().copied()
    }
}

/// A cut seen from the fragments: the hop that is measured and the hop
/// that is re-initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CutLink {
    /// Original wire that was cut.
    pub wire: WireId,
    /// Upstream side, carries an injected measurement.
    pub upstream: PathHop,
    /// Downstream side, carries an injected initialization.
    pub downstream: PathHop,
}

/// Mapping from every original wire to its path through the fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WirePathMap {
    paths: Vec<WirePath>,
}

impl WirePathMap {
    /// Paths in original wire order.
    #[inline]
    pub fn paths(&self) -> &[WirePath] {
        &self.paths
    }

    /// Path of one original wire.
    pub fn path(&self, wire: WireId) -> Option<&WirePath> {
        self.paths.iter().find(|p| p.wire == wire)
    }

    /// Number of original wires.
    #[inline]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Total number of cuts.
    pub fn num_cuts(&self) -> usize {
        self.paths.iter().map(WirePath::num_cuts).sum()
    }

    /// Every cut as a pair of adjacent hops, in wire order then path order.
    pub fn cut_links(&self) -> Vec<CutLink> {
        self.paths
            .iter()
            .flat_map(|path| {
                path.hops.windows(2).map(move |pair| CutLink {
                    wire: path.wire,
                    upstream: pair[0],
                    downstream: pair[1],
                })
            })
            .collect()
    }
}

/// The fragments of a cut circuit together with their wire paths.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Fragments. Operation-bearing fragments come first, ordered by their
    /// first operation; idle-wire fragments follow in wire order.
    pub fragments: Vec<Fragment>,
    /// How each original wire is threaded through the fragments.
    pub paths: WirePathMap,
    /// The applied cuts, sorted by wire and index.
    pub cuts: Vec<CutPosition>,
}

impl Partition {
    /// Number of fragments, idle ones included.
    #[inline]
    pub fn num_fragments(&self) -> usize {
        self.fragments.len()
    }

    /// Number of fragments that carry at least one operation.
    pub fn num_operation_fragments(&self) -> usize {
        self.fragments.iter().filter(|f| !f.is_idle()).count()
    }

    /// Local wire count of every fragment.
    pub fn fragment_wire_counts(&self) -> Vec<usize> {
        self.fragments.iter().map(Fragment::num_wires).collect()
    }

    /// Number of wires of the original circuit.
    #[inline]
    pub fn num_original_wires(&self) -> usize {
        self.paths.len()
    }
}

/// Apply `cuts` to `graph`.
///
/// # Errors
///
/// - [`CutError::InvalidCutPosition`] if a cut names an unknown wire, has no
///   operation after it, or is listed twice.
/// - [`CutError::NotASplit`] if a non-empty cut set leaves fewer than two
///   operation-bearing components.
#[instrument(skip_all, fields(circuit = graph.name(), cuts = cuts.len()))]
#[allow(clippy::cast_possible_truncation)]
pub fn partition(graph: &CircuitGraph, cuts: &[CutPosition]) -> CutResult<Partition> {
    for cut in cuts {
        cut.validate(graph)?;
    }

    let mut sorted = cuts.to_vec();
    sorted.sort_by_key(|c| (graph.wire_position(c.wire), c.index));
    if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(pair[0].invalid("duplicate cut"));
    }

    // Caller graphs may already use synthetic wires.
    let synthetic_base = graph
        .wires()
        .iter()
        .filter(|w| w.is_synthetic())
        .map(|w| w.index + 1)
        .max()
        .unwrap_or(0);

    // Extended wire of every operation slot.
    let mut op_wires: Vec<Vec<WireId>> = graph.ops().iter().map(|op| op.wires.clone()).collect();
    // Upstream extended wire -> downstream extended wire.
    let mut stitches: FxHashMap<WireId, WireId> = FxHashMap::default();

    // Reverse order keeps the indices of the remaining cuts valid.
    for (k, cut) in sorted.iter().rev().enumerate() {
        let fresh = WireId::synthetic(synthetic_base + k as u32);
        let ops = graph
            .ops_on_wire(cut.wire)
            .ok_or_else(|| cut.invalid("wire is not part of the circuit"))?;
        for op in &ops[cut.index + 1..] {
            for slot in &mut op_wires[op.index()] {
                if *slot == cut.wire {
                    *slot = fresh;
                }
            }
        }
        if let Some(next) = stitches.remove(&cut.wire) {
            stitches.insert(fresh, next);
        }
        stitches.insert(cut.wire, fresh);
        debug!("Cut {cut}: downstream segment moved to {fresh}");
    }

    // Operations sharing an extended wire end up in the same component.
    let mut last_on_wire: FxHashMap<WireId, usize> = FxHashMap::default();
    let mut components = UnionFind::<usize>::new(graph.num_ops());
    for (op, wires) in op_wires.iter().enumerate() {
        for wire in wires {
            if let Some(prev) = last_on_wire.insert(*wire, op) {
                components.union(prev, op);
            }
        }
    }

    let mut fragment_of_root: FxHashMap<usize, usize> = FxHashMap::default();
    let mut op_fragment = Vec::with_capacity(graph.num_ops());
    for op in 0..graph.num_ops() {
        let next = fragment_of_root.len();
        let fragment = *fragment_of_root.entry(components.find(op)).or_insert(next);
        op_fragment.push(fragment);
    }
    let num_op_fragments = fragment_of_root.len();

    if !sorted.is_empty() && num_op_fragments < 2 {
        return Err(CutError::NotASplit {
            components: num_op_fragments,
        });
    }

    // Segment chains per original wire, in circuit order.
    let chains: Vec<Vec<WireId>> = graph
        .wires()
        .iter()
        .map(|&wire| {
            let mut chain = vec![wire];
            let mut current = wire;
            while let Some(&next) = stitches.get(&current) {
                chain.push(next);
                current = next;
            }
            chain
        })
        .collect();

    // Local wire tables, ordered by (original wire, segment).
    let mut sources: Vec<Vec<WireId>> = vec![Vec::new(); num_op_fragments];
    let mut local_of: FxHashMap<WireId, PathHop> = FxHashMap::default();
    let mut idle = Vec::new();
    for chain in &chains {
        for &segment in chain {
            match last_on_wire.get(&segment) {
                Some(&op) => {
                    let fragment = op_fragment[op];
                    local_of.insert(
                        segment,
                        PathHop {
                            fragment,
                            local: sources[fragment].len() as u32,
                        },
                    );
                    sources[fragment].push(segment);
                }
                None => idle.push(segment),
            }
        }
    }

    let mut fragments: Vec<Fragment> = sources
        .into_iter()
        .enumerate()
        .map(|(index, sources)| Fragment {
            index,
            graph: CircuitGraph::with_qubits(
                format!("{}_f{index}", graph.name()),
                sources.len() as u32,
            ),
            sources,
        })
        .collect();

    for (id, op) in graph.iter_ops() {
        let fragment = op_fragment[id.index()];
        let wires = op_wires[id.index()]
            .iter()
            .map(|w| WireId::qubit(local_of[w].local));
        fragments[fragment].graph.apply(op.gate.clone(), wires)?;
    }

    for wire in idle {
        let index = fragments.len();
        local_of.insert(wire, PathHop { fragment: index, local: 0 });
        fragments.push(Fragment {
            index,
            graph: CircuitGraph::with_qubits(format!("{}_f{index}", graph.name()), 1),
            sources: vec![wire],
        });
    }

    let paths = WirePathMap {
        paths: graph
            .wires()
            .iter()
            .zip(&chains)
            .map(|(&wire, chain)| WirePath {
                wire,
                hops: chain.iter().map(|segment| local_of[segment]).collect(),
            })
            .collect(),
    };

    for fragment in &fragments {
        debug!(
            "Fragment {}: {} wires, {} ops",
            fragment.index,
            fragment.num_wires(),
            fragment.num_ops()
        );
    }
    info!(
        "Partitioned {} into {} fragment(s) with {} cut(s)",
        graph.name(),
        fragments.len(),
        sorted.len()
    );

    Ok(Partition {
        fragments,
        paths,
        cuts: sorted,
    })
}

/// Operation ids of `graph` grouped by the fragment they land in.
///
/// Useful for inspecting a partition without rebuilding it.
pub fn fragment_of_ops(graph: &CircuitGraph, partition: &Partition) -> Vec<Vec<OpId>> {
    let mut grouped = vec![Vec::new(); partition.num_fragments()];
    for (id, op) in graph.iter_ops() {
        let Some(&wire) = op.wires.first() else {
            continue;
        };
        let Some(position) = graph.position_on_wire(id, wire) else {
            continue;
        };
        let Some(path) = partition.paths.path(wire) else {
            continue;
        };
        let segment = partition
            .cuts
            .iter()
            .filter(|c| c.wire == wire && c.index < position)
            .count();
        if let Some(hop) = path.hops.get(segment) {
            grouped[hop.fragment].push(id);
        }
    }
    grouped
}
