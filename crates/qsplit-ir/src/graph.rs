//! Arena-based circuit graph.

use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{IrError, IrResult};
use crate::gate::{Gate, OperationNode};
use crate::wire::WireId;

/// Stable index of an operation in the circuit arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OpId(pub u32);

impl OpId {
    /// Position of this operation in the arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node of the terminal-augmented DAG view returned by [`CircuitGraph::to_dag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DagNode {
    /// Input terminal of a wire.
    In(WireId),
    /// Output terminal of a wire.
    Out(WireId),
    /// Operation node.
    Op(OpId),
}

/// Circuit graph: an ordered wire table plus an arena of operations.
///
/// The graph is a DAG by construction:
/// - operations can only be appended, so arena order is a topological order
/// - every wire's operations are totally ordered by arena position
/// - every operation's wires exist in the wire table
///
/// Cutting never mutates a graph in place; it builds new graphs for the
/// fragments.
#[derive(Debug, Clone, Default)]
pub struct CircuitGraph {
    /// Name of the circuit.
    name: String,
    /// Ordered wire table.
    wires: Vec<WireId>,
    /// Wire to wire-table position.
    wire_index: FxHashMap<WireId, usize>,
    /// Operation arena.
    ops: Vec<OperationNode>,
    /// Per wire-table position, the operations on that wire in order.
    wire_ops: Vec<Vec<OpId>>,
}

impl CircuitGraph {
    /// Create an empty circuit graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create a graph with qubit wires `q0..q{n-1}`.
    pub fn with_qubits(name: impl Into<String>, num_qubits: u32) -> Self {
        let mut graph = Self::new(name);
        for i in 0..num_qubits {
            graph.wires.push(WireId::qubit(i));
            graph.wire_index.insert(WireId::qubit(i), i as usize);
            graph.wire_ops.push(Vec::new());
        }
        graph
    }

    /// Append a wire to the wire table.
    pub fn add_wire(&mut self, wire: WireId) -> IrResult<usize> {
        if self.wire_index.contains_key(&wire) {
            return Err(IrError::DuplicateWire(wire));
        }
        let position = self.wires.len();
        self.wires.push(wire);
        self.wire_index.insert(wire, position);
        self.wire_ops.push(Vec::new());
        Ok(position)
    }

    /// Append an operation to the circuit.
    #[allow(clippy::cast_possible_truncation)]
    pub fn apply(&mut self, gate: Gate, wires: impl IntoIterator<Item = WireId>) -> IrResult<OpId> {
        let wires: Vec<WireId> = wires.into_iter().collect();

        let expected = gate.num_wires();
        if expected as usize != wires.len() {
            return Err(IrError::WireCountMismatch {
                gate_name: gate.name().to_string(),
                expected,
                got: wires.len() as u32,
            });
        }

        let mut seen = FxHashSet::default();
        for &wire in &wires {
            if !self.wire_index.contains_key(&wire) {
                return Err(IrError::WireNotFound {
                    wire,
                    gate_name: Some(gate.name().to_string()),
                });
            }
            if !seen.insert(wire) {
                return Err(IrError::DuplicateWireInOperation {
                    wire,
                    gate_name: Some(gate.name().to_string()),
                });
            }
        }

        let id = OpId(u32::try_from(self.ops.len()).map_err(|_| {
            IrError::InvalidGraph("operation arena exceeds u32::MAX entries".into())
        })?);
        for wire in &wires {
            let position = self.wire_index[wire];
            self.wire_ops[position].push(id);
        }
        self.ops.push(OperationNode { gate, wires });
        Ok(id)
    }

    /// Get the circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of wires.
    #[inline]
    pub fn num_wires(&self) -> usize {
        self.wires.len()
    }

    /// Get the number of operations.
    #[inline]
    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    /// The wire table, in order.
    #[inline]
    pub fn wires(&self) -> &[WireId] {
        &self.wires
    }

    /// Position of a wire in the wire table.
    #[inline]
    pub fn wire_position(&self, wire: WireId) -> Option<usize> {
        self.wire_index.get(&wire).copied()
    }

    /// All operations in arena (topological) order.
    #[inline]
    pub fn ops(&self) -> &[OperationNode] {
        &self.ops
    }

    /// Iterate over operations with their ids.
    pub fn iter_ops(&self) -> impl Iterator<Item = (OpId, &OperationNode)> {
        self.ops
            .iter()
            .enumerate()
            .map(|(i, op)| (OpId(i as u32), op))
    }

    /// Get an operation by id.
    #[inline]
    pub fn op(&self, id: OpId) -> Option<&OperationNode> {
        self.ops.get(id.index())
    }

    /// The ordered operations on a wire.
    pub fn ops_on_wire(&self, wire: WireId) -> Option<&[OpId]> {
        self.wire_position(wire)
            .map(|position| self.wire_ops[position].as_slice())
    }

    /// The ordered operations on the wire at a wire-table position.
    #[inline]
    pub fn ops_at_position(&self, position: usize) -> &[OpId] {
        &self.wire_ops[position]
    }

    /// Index of `op` within the operation list of `wire`.
    pub fn position_on_wire(&self, op: OpId, wire: WireId) -> Option<usize> {
        self.ops_on_wire(wire)?.binary_search(&op).ok()
    }

    /// Wires with no operations.
    pub fn idle_wires(&self) -> impl Iterator<Item = WireId> + '_ {
        self.wires
            .iter()
            .zip(&self.wire_ops)
            .filter(|(_, ops)| ops.is_empty())
            .map(|(wire, _)| *wire)
    }

    /// Calculate the circuit depth.
    pub fn depth(&self) -> usize {
        let mut wire_depth = vec![0usize; self.wires.len()];
        let mut max_depth = 0;
        for op in &self.ops {
            let positions: Vec<usize> = op.wires.iter().map(|w| self.wire_index[w]).collect();
            let depth = positions.iter().map(|&p| wire_depth[p]).max().unwrap_or(0) + 1;
            for p in positions {
                wire_depth[p] = depth;
            }
            max_depth = max_depth.max(depth);
        }
        max_depth
    }

    /// Build the terminal-augmented DAG view.
    ///
    /// Each wire gets an input and an output terminal, and one edge per
    /// consecutive pair of nodes on the wire, weighted by the wire.
    pub fn to_dag(&self) -> DiGraph<DagNode, WireId, u32> {
        let mut dag = DiGraph::with_capacity(
            self.ops.len() + 2 * self.wires.len(),
            self.ops.len() * 2 + self.wires.len(),
        );
        let op_nodes: Vec<NodeIndex<u32>> = (0..self.ops.len())
            .map(|i| dag.add_node(DagNode::Op(OpId(i as u32))))
            .collect();

        for (position, &wire) in self.wires.iter().enumerate() {
            let input = dag.add_node(DagNode::In(wire));
            let output = dag.add_node(DagNode::Out(wire));
            let mut prev = input;
            for op in &self.wire_ops[position] {
                let node = op_nodes[op.index()];
                dag.add_edge(prev, node, wire);
                prev = node;
            }
            dag.add_edge(prev, output, wire);
        }
        dag
    }

    /// Verify the structural integrity of the graph.
    ///
    /// Checks that:
    /// - Every operation's wires exist in the wire table
    /// - Every wire's operation list is strictly increasing and consistent
    ///   with the operations' wire lists
    /// - The terminal-augmented DAG is acyclic
    pub fn verify_integrity(&self) -> IrResult<()> {
        for (id, op) in self.iter_ops() {
            for &wire in &op.wires {
                let Some(ops) = self.ops_on_wire(wire) else {
                    return Err(IrError::WireNotFound {
                        wire,
                        gate_name: Some(op.gate.name().to_string()),
                    });
                };
                if ops.binary_search(&id).is_err() {
                    return Err(IrError::InvalidGraph(format!(
                        "Operation {} is missing from the operation list of wire {wire}",
                        id.0
                    )));
                }
            }
        }

        for (position, ops) in self.wire_ops.iter().enumerate() {
            let wire = self.wires[position];
            if ops.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(IrError::InvalidGraph(format!(
                    "Operations on wire {wire} are not totally ordered"
                )));
            }
            for op in ops {
                let touches = self.op(*op).is_some_and(|node| node.touches(wire));
                if !touches {
                    return Err(IrError::InvalidGraph(format!(
                        "Wire {wire} lists operation {} that does not act on it",
                        op.0
                    )));
                }
            }
        }

        if petgraph::algo::is_cyclic_directed(&self.to_dag()) {
            return Err(IrError::InvalidGraph("Graph contains a cycle".into()));
        }

        Ok(())
    }

    /// Parse a circuit from its JSON representation.
    pub fn from_json(source: &str) -> IrResult<Self> {
        let file: CircuitFile = serde_json::from_str(source)?;
        let mut graph = Self::with_qubits(file.name, file.num_qubits);
        for entry in file.ops {
            let wires = entry.wires.into_iter().map(WireId::qubit);
            graph.apply(entry.gate, wires)?;
        }
        Ok(graph)
    }

    /// Serialize the circuit to JSON.
    ///
    /// Wires are written as wire-table positions, so any graph (including
    /// fragments) round-trips onto qubit wires `q0..q{n-1}`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_json(&self) -> IrResult<String> {
        let file = CircuitFile {
            name: self.name.clone(),
            num_qubits: self.wires.len() as u32,
            ops: self
                .ops
                .iter()
                .map(|op| OpEntry {
                    gate: op.gate.clone(),
                    wires: op
                        .wires
                        .iter()
                        .map(|w| self.wire_index[w] as u32)
                        .collect(),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    // =========================================================================
    // Gate helpers
    // =========================================================================

    /// Apply Hadamard gate.
    pub fn h(&mut self, wire: WireId) -> IrResult<&mut Self> {
        self.apply(Gate::H, [wire])?;
        Ok(self)
    }

    /// Apply Pauli-X gate.
    pub fn x(&mut self, wire: WireId) -> IrResult<&mut Self> {
        self.apply(Gate::X, [wire])?;
        Ok(self)
    }

    /// Apply Pauli-Y gate.
    pub fn y(&mut self, wire: WireId) -> IrResult<&mut Self> {
        self.apply(Gate::Y, [wire])?;
        Ok(self)
    }

    /// Apply Pauli-Z gate.
    pub fn z(&mut self, wire: WireId) -> IrResult<&mut Self> {
        self.apply(Gate::Z, [wire])?;
        Ok(self)
    }

    /// Apply S gate.
    pub fn s(&mut self, wire: WireId) -> IrResult<&mut Self> {
        self.apply(Gate::S, [wire])?;
        Ok(self)
    }

    /// Apply T gate.
    pub fn t(&mut self, wire: WireId) -> IrResult<&mut Self> {
        self.apply(Gate::T, [wire])?;
        Ok(self)
    }

    /// Apply RX rotation.
    pub fn rx(&mut self, theta: f64, wire: WireId) -> IrResult<&mut Self> {
        self.apply(Gate::Rx(theta), [wire])?;
        Ok(self)
    }

    /// Apply RY rotation.
    pub fn ry(&mut self, theta: f64, wire: WireId) -> IrResult<&mut Self> {
        self.apply(Gate::Ry(theta), [wire])?;
        Ok(self)
    }

    /// Apply RZ rotation.
    pub fn rz(&mut self, theta: f64, wire: WireId) -> IrResult<&mut Self> {
        self.apply(Gate::Rz(theta), [wire])?;
        Ok(self)
    }

    /// Apply CNOT gate.
    pub fn cx(&mut self, control: WireId, target: WireId) -> IrResult<&mut Self> {
        self.apply(Gate::CX, [control, target])?;
        Ok(self)
    }

    /// Apply CZ gate.
    pub fn cz(&mut self, control: WireId, target: WireId) -> IrResult<&mut Self> {
        self.apply(Gate::CZ, [control, target])?;
        Ok(self)
    }

    /// Apply ZZ rotation.
    pub fn rzz(&mut self, theta: f64, q1: WireId, q2: WireId) -> IrResult<&mut Self> {
        self.apply(Gate::RZZ(theta), [q1, q2])?;
        Ok(self)
    }

    /// Apply SWAP gate.
    pub fn swap(&mut self, q1: WireId, q2: WireId) -> IrResult<&mut Self> {
        self.apply(Gate::Swap, [q1, q2])?;
        Ok(self)
    }

    /// Apply Toffoli gate.
    pub fn ccx(&mut self, c1: WireId, c2: WireId, target: WireId) -> IrResult<&mut Self> {
        self.apply(Gate::CCX, [c1, c2, target])?;
        Ok(self)
    }

    // =========================================================================
    // Circuit families
    // =========================================================================

    /// A GHZ preparation chain on `n` qubits.
    pub fn ghz(n: u32) -> IrResult<Self> {
        let mut graph = Self::with_qubits(format!("ghz_{n}"), n);
        if n == 0 {
            return Ok(graph);
        }
        graph.h(WireId::qubit(0))?;
        for i in 0..n - 1 {
            graph.cx(WireId::qubit(i), WireId::qubit(i + 1))?;
        }
        Ok(graph)
    }

    /// A hardware-efficient layered ansatz on a line of `n` qubits.
    ///
    /// Each layer applies `Ry`/`Rz` on every qubit followed by a ladder of
    /// CNOTs. Angles are deterministic functions of the qubit and layer so
    /// that the distribution is non-trivial.
    #[allow(clippy::cast_precision_loss)]
    pub fn layered_ansatz(n: u32, layers: u32) -> IrResult<Self> {
        let mut graph = Self::with_qubits(format!("hwea_{n}x{layers}"), n);
        for layer in 0..layers {
            for q in 0..n {
                let angle = PI * f64::from(q + 1) / f64::from(n + 2) + 0.37 * f64::from(layer);
                graph.ry(angle, WireId::qubit(q))?;
                graph.rz(0.5 * angle, WireId::qubit(q))?;
            }
            for q in 0..n.saturating_sub(1) {
                graph.cx(WireId::qubit(q), WireId::qubit(q + 1))?;
            }
        }
        Ok(graph)
    }
}

#[derive(Serialize, Deserialize)]
struct CircuitFile {
    #[serde(default)]
    name: String,
    num_qubits: u32,
    #[serde(default)]
    ops: Vec<OpEntry>,
}

#[derive(Serialize, Deserialize)]
struct OpEntry {
    gate: Gate,
    wires: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(i: u32) -> WireId {
        WireId::qubit(i)
    }

    #[test]
    fn test_empty_graph() {
        let graph = CircuitGraph::new("empty");
        assert_eq!(graph.num_wires(), 0);
        assert_eq!(graph.num_ops(), 0);
        assert_eq!(graph.depth(), 0);
        graph.verify_integrity().unwrap();
    }

    #[test]
    fn test_wire_op_lists() {
        let mut graph = CircuitGraph::with_qubits("chain", 3);
        graph.h(q(0)).unwrap();
        graph.cx(q(0), q(1)).unwrap();
        graph.cx(q(1), q(2)).unwrap();
        graph.h(q(1)).unwrap();

        assert_eq!(graph.ops_on_wire(q(0)).unwrap(), &[OpId(0), OpId(1)]);
        assert_eq!(
            graph.ops_on_wire(q(1)).unwrap(),
            &[OpId(1), OpId(2), OpId(3)]
        );
        assert_eq!(graph.position_on_wire(OpId(3), q(1)), Some(2));
        assert_eq!(graph.position_on_wire(OpId(0), q(2)), None);
        assert_eq!(graph.depth(), 4);
        graph.verify_integrity().unwrap();
    }

    #[test]
    fn test_parallel_gates_depth() {
        let mut graph = CircuitGraph::with_qubits("parallel", 2);
        graph.h(q(0)).unwrap();
        graph.h(q(1)).unwrap();
        assert_eq!(graph.depth(), 1);
    }

    #[test]
    fn test_arity_mismatch() {
        let mut graph = CircuitGraph::with_qubits("bad", 2);
        let result = graph.apply(Gate::CX, [q(0)]);
        match result {
            Err(IrError::WireCountMismatch {
                gate_name,
                expected,
                got,
            }) => {
                assert_eq!(gate_name, "cx");
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
            }
            _ => panic!("Expected WireCountMismatch error"),
        }
    }

    #[test]
    fn test_unknown_wire() {
        let mut graph = CircuitGraph::with_qubits("bad", 1);
        let result = graph.cx(q(0), q(7));
        assert!(matches!(
            result,
            Err(IrError::WireNotFound { wire, .. }) if wire == q(7)
        ));
    }

    #[test]
    fn test_duplicate_wire_in_operation() {
        let mut graph = CircuitGraph::with_qubits("bad", 2);
        let result = graph.cx(q(1), q(1));
        assert!(matches!(
            result,
            Err(IrError::DuplicateWireInOperation { .. })
        ));
        assert_eq!(graph.num_ops(), 0);
    }

    #[test]
    fn test_duplicate_wire() {
        let mut graph = CircuitGraph::with_qubits("dup", 2);
        assert!(matches!(
            graph.add_wire(q(1)),
            Err(IrError::DuplicateWire(_))
        ));
        assert_eq!(graph.add_wire(WireId::synthetic(0)).unwrap(), 2);
    }

    #[test]
    fn test_dag_view() {
        let graph = CircuitGraph::ghz(3).unwrap();
        let dag = graph.to_dag();
        // 3 ops + 2 terminals per wire
        assert_eq!(dag.node_count(), 9);
        // one edge per (node, next node) pair on each wire
        assert_eq!(dag.edge_count(), 3 + 3 + 2);
        assert!(!petgraph::algo::is_cyclic_directed(&dag));
    }

    #[test]
    fn test_idle_wires() {
        let mut graph = CircuitGraph::with_qubits("idle", 3);
        graph.cx(q(0), q(2)).unwrap();
        let idle: Vec<_> = graph.idle_wires().collect();
        assert_eq!(idle, vec![q(1)]);
    }

    #[test]
    fn test_json_round_trip() {
        let source = r#"{
            "name": "bell",
            "num_qubits": 2,
            "ops": [
                { "gate": "H", "wires": [0] },
                { "gate": "CX", "wires": [0, 1] },
                { "gate": { "Rz": 0.25 }, "wires": [1] }
            ]
        }"#;
        let graph = CircuitGraph::from_json(source).unwrap();
        assert_eq!(graph.name(), "bell");
        assert_eq!(graph.num_ops(), 3);
        assert_eq!(graph.ops()[2].gate, Gate::Rz(0.25));

        let again = CircuitGraph::from_json(&graph.to_json().unwrap()).unwrap();
        assert_eq!(again.ops(), graph.ops());
    }

    #[test]
    fn test_json_rejects_bad_operation() {
        let source = r#"{ "num_qubits": 1, "ops": [ { "gate": "CX", "wires": [0, 1] } ] }"#;
        assert!(CircuitGraph::from_json(source).is_err());
    }

    #[test]
    fn test_layered_ansatz_shape() {
        let graph = CircuitGraph::layered_ansatz(4, 2).unwrap();
        assert_eq!(graph.num_wires(), 4);
        assert_eq!(graph.num_ops(), 2 * (4 * 2 + 3));
        graph.verify_integrity().unwrap();
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn random_circuits_stay_consistent(
                pairs in proptest::collection::vec((0u32..5, 0u32..5), 0..40)
            ) {
                let mut graph = CircuitGraph::with_qubits("random", 5);
                for (a, b) in pairs {
                    if a == b {
                        graph.h(q(a)).unwrap();
                    } else {
                        graph.cx(q(a), q(b)).unwrap();
                    }
                }
                prop_assert!(graph.verify_integrity().is_ok());
                let total: usize = graph.wires().iter()
                    .map(|w| graph.ops_on_wire(*w).unwrap().len())
                    .sum();
                let expected: usize = graph.ops().iter().map(|op| op.wires.len()).sum();
                prop_assert_eq!(total, expected);
            }
        }
    }
}
