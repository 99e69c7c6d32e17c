//! Cut selection.
//!
//! Selection is modeled as labeling: every operation gets a fragment label,
//! and a cut is placed wherever two consecutive operations on a wire carry
//! different labels. A label's wire count is its number of wire segments
//! (maximal same-label runs on one wire), which is exactly the width of the
//! fragment it becomes.
//!
//! Only multi-wire operations are searched over. A single-wire operation
//! takes the label of its predecessor on the wire (or of its successor when
//! it opens the wire), which never costs a cut or a segment. When that
//! leaves fewer fragments than the range asks for, single-wire operations
//! are split off into fragments of their own, cheapest first.

use std::cmp::Ordering;

use petgraph::unionfind::UnionFind;
use qsplit_ir::CircuitGraph;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::{CutConfig, SelectionStrategy};
use crate::cut::CutPosition;
use crate::error::{CutError, CutResult};

/// Search nodes the exact solver may visit before settling for the best
/// labeling found so far.
const EXACT_NODE_CAP: u64 = 2_000_000;

/// Local-improvement rounds per greedy start.
const MAX_IMPROVE_ROUNDS: usize = 64;

/// A chosen cut set with its figures of merit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutSolution {
    /// Cuts, sorted by wire position and index.
    pub cuts: Vec<CutPosition>,
    /// Operation-bearing fragments the cuts produce.
    pub num_fragments: usize,
    /// Width of the widest fragment.
    pub max_fragment_wires: usize,
    /// Solver that produced the solution.
    pub strategy: SelectionStrategy,
}

/// Chooses cut positions that respect a per-fragment wire budget.
#[derive(Debug, Clone)]
pub struct CutSelector {
    max_wires: usize,
    min_fragments: usize,
    max_fragments: usize,
    cut_cost_weight: Option<f64>,
    strategy: SelectionStrategy,
    exact_node_limit: usize,
}

impl CutSelector {
    /// Create a selector with a wire budget and a fragment range of `1..=4`.
    pub fn new(max_wires: usize) -> Self {
        Self {
            max_wires,
            min_fragments: 1,
            max_fragments: 4,
            cut_cost_weight: None,
            strategy: SelectionStrategy::Auto,
            exact_node_limit: 18,
        }
    }

    /// Create a selector from the pipeline configuration.
    pub fn from_config(config: &CutConfig) -> Self {
        Self {
            max_wires: config.max_wires_per_fragment,
            min_fragments: config.min_fragments,
            max_fragments: config.max_fragments,
            cut_cost_weight: config.cut_cost_weight,
            strategy: config.strategy,
            exact_node_limit: config.exact_node_limit,
        }
    }

    /// Set the allowed range of operation-bearing fragments.
    pub fn with_fragment_range(mut self, min: usize, max: usize) -> Self {
        self.min_fragments = min;
        self.max_fragments = max;
        self
    }

    /// Set the cut cost weight.
    pub fn with_cut_cost_weight(mut self, weight: f64) -> Self {
        self.cut_cost_weight = Some(weight);
        self
    }

    /// Set the solver.
    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the largest multi-wire operation count solved exactly under
    /// [`SelectionStrategy::Auto`].
    pub fn with_exact_node_limit(mut self, limit: usize) -> Self {
        self.exact_node_limit = limit;
        self
    }

    /// Select cuts for `graph`.
    ///
    /// # Errors
    ///
    /// [`CutError::Infeasible`] if no labeling keeps every fragment within
    /// the budget with an operation-bearing fragment count inside the range.
    #[instrument(skip_all, fields(circuit = graph.name(), budget = self.max_wires))]
    pub fn select(&self, graph: &CircuitGraph) -> CutResult<CutSolution> {
        if self.max_wires == 0 || self.min_fragments > self.max_fragments {
            return Err(CutError::Infeasible {
                reason: format!(
                    "budget {} with fragment range {}..={} admits nothing",
                    self.max_wires, self.min_fragments, self.max_fragments
                ),
            });
        }

        if graph.num_ops() == 0 {
            if self.min_fragments > 0 {
                return Err(CutError::Infeasible {
                    reason: format!(
                        "circuit has no operations, at least {} fragment(s) required",
                        self.min_fragments
                    ),
                });
            }
            return Ok(CutSolution {
                cuts: Vec::new(),
                num_fragments: 0,
                max_fragment_wires: 0,
                strategy: self.strategy,
            });
        }

        if let Some(op) = graph.ops().iter().find(|op| op.wires.len() > self.max_wires) {
            return Err(CutError::Infeasible {
                reason: format!(
                    "gate '{}' acts on {} wires, more than the budget of {}",
                    op.gate.name(),
                    op.wires.len(),
                    self.max_wires
                ),
            });
        }

        let problem = Problem::new(graph, self);
        if problem.isolated > self.max_fragments {
            return Err(CutError::Infeasible {
                reason: format!(
                    "{} wires never interact with others, more than {} fragments",
                    problem.isolated, self.max_fragments
                ),
            });
        }

        let use_exact = match self.strategy {
            SelectionStrategy::Exact => true,
            SelectionStrategy::Greedy => false,
            SelectionStrategy::Auto => problem.skeleton.len() <= self.exact_node_limit,
        };

        let found = if use_exact {
            match problem.exact() {
                ExactOutcome::Optimal(best) => {
                    best.map(|labels| (labels, SelectionStrategy::Exact))
                }
                ExactOutcome::Truncated(best) => {
                    warn!(
                        "Exact search stopped after {EXACT_NODE_CAP} nodes; comparing with greedy"
                    );
                    let greedy = problem.greedy();
                    match (best, greedy) {
                        (Some(exact), Some(greedy)) => {
                            if problem.cost_of(&greedy).compare(&problem.cost_of(&exact))
                                == Ordering::Less
                            {
                                Some((greedy, SelectionStrategy::Greedy))
                            } else {
                                Some((exact, SelectionStrategy::Exact))
                            }
                        }
                        (Some(exact), None) => Some((exact, SelectionStrategy::Exact)),
                        (None, greedy) => greedy.map(|l| (l, SelectionStrategy::Greedy)),
                    }
                }
            }
        } else {
            problem.greedy().map(|labels| (labels, SelectionStrategy::Greedy))
        };

        let Some((skeleton_labels, strategy)) = found else {
            return Err(CutError::Infeasible {
                reason: format!(
                    "no cut set yields {}..={} fragments of at most {} wires",
                    self.min_fragments, self.max_fragments, self.max_wires
                ),
            });
        };

        let Some((labels, evaluation)) = problem.settle(&skeleton_labels) else {
            return Err(CutError::Infeasible {
                reason: "selected labeling failed final validation".into(),
            });
        };
        let cuts = problem.cuts(&labels);

        info!(
            "Selected {} cut(s) -> {} fragment(s), widest {} wires ({strategy})",
            cuts.len(),
            evaluation.fragments,
            evaluation.max_wires
        );

        Ok(CutSolution {
            cuts,
            num_fragments: evaluation.fragments,
            max_fragment_wires: evaluation.max_wires,
            strategy,
        })
    }
}

/// Objective value, compared lexicographically.
#[derive(Debug, Clone, Copy)]
struct Cost {
    primary: f64,
    fragments: usize,
    secondary: usize,
}

impl Cost {
    fn compare(&self, other: &Cost) -> Ordering {
        self.primary
            .total_cmp(&other.primary)
            .then(self.fragments.cmp(&other.fragments))
            .then(self.secondary.cmp(&other.secondary))
    }
}

#[derive(Debug, Clone, Copy)]
struct Evaluation {
    cuts: usize,
    fragments: usize,
    max_wires: usize,
}

/// A maximal run of single-wire operations on one wire.
#[derive(Debug)]
struct Run {
    /// Operations in wire order.
    ops: Vec<usize>,
    /// Multi-wire operation right before the run.
    before: Option<usize>,
    /// Multi-wire operation right after the run.
    after: Option<usize>,
}

enum ExactOutcome {
    Optimal(Option<Vec<usize>>),
    Truncated(Option<Vec<usize>>),
}

/// Precomputed adjacency for one selection run.
struct Problem<'g> {
    graph: &'g CircuitGraph,
    max_wires: usize,
    min_fragments: usize,
    max_fragments: usize,
    weight: Option<f64>,
    /// Previous operation on the same wire, per operation and slot.
    prev_op: Vec<Vec<Option<usize>>>,
    /// Multi-wire operations, in arena order.
    skeleton: Vec<usize>,
    /// Previous skeleton operation (as skeleton index) on each slot's wire.
    skeleton_prev: Vec<Vec<Option<usize>>>,
    /// Next skeleton operation (as skeleton index) on each slot's wire.
    skeleton_next: Vec<Vec<Option<usize>>>,
    /// For every operation, the first skeleton operation after it on its
    /// first wire.
    next_skeleton: Vec<Option<usize>>,
    /// Wires with operations but no multi-wire operation.
    isolated: usize,
    /// Single-wire runs, in wire order.
    runs: Vec<Run>,
}

impl<'g> Problem<'g> {
    fn new(graph: &'g CircuitGraph, selector: &CutSelector) -> Self {
        let num_ops = graph.num_ops();
        let mut skeleton_index = vec![None; num_ops];
        let mut skeleton = Vec::new();
        for (id, op) in graph.iter_ops() {
            if op.wires.len() > 1 {
                skeleton_index[id.index()] = Some(skeleton.len());
                skeleton.push(id.index());
            }
        }

        let mut prev_op = vec![Vec::new(); num_ops];
        let mut skeleton_prev = vec![Vec::new(); skeleton.len()];
        let mut skeleton_next = vec![Vec::new(); skeleton.len()];
        let mut next_skeleton = vec![None; num_ops];
        let mut isolated = 0;

        let mut runs = Vec::new();
        for position in 0..graph.num_wires() {
            let ops = graph.ops_at_position(position);
            if !ops.is_empty() && ops.iter().all(|op| skeleton_index[op.index()].is_none()) {
                isolated += 1;
            }

            let mut current: Option<Run> = None;
            let mut before = None;
            for op in ops {
                let i = op.index();
                if skeleton_index[i].is_some() {
                    if let Some(mut run) = current.take() {
                        run.after = Some(i);
                        runs.push(run);
                    }
                    before = Some(i);
                } else {
                    current
                        .get_or_insert_with(|| Run {
                            ops: Vec::new(),
                            before,
                            after: None,
                        })
                        .ops
                        .push(i);
                }
            }
            runs.extend(current);
        }

        for (id, op) in graph.iter_ops() {
            let i = id.index();
            for &wire in &op.wires {
                let ops = graph.ops_on_wire(wire).unwrap_or_default();
                let at = graph.position_on_wire(id, wire).unwrap_or(0);
                prev_op[i].push(at.checked_sub(1).map(|p| ops[p].index()));

                let before = ops[..at]
                    .iter()
                    .rev()
                    .find_map(|o| skeleton_index[o.index()]);
                let after = ops[at + 1..]
                    .iter()
                    .find_map(|o| skeleton_index[o.index()]);
                if let Some(s) = skeleton_index[i] {
                    skeleton_prev[s].push(before);
                    skeleton_next[s].push(after);
                } else if next_skeleton[i].is_none() {
                    next_skeleton[i] = after;
                }
            }
        }

        Self {
            graph,
            max_wires: selector.max_wires,
            min_fragments: selector.min_fragments,
            max_fragments: selector.max_fragments,
            weight: selector.cut_cost_weight,
            prev_op,
            skeleton,
            skeleton_prev,
            skeleton_next,
            next_skeleton,
            isolated,
            runs,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn objective(&self, cuts: usize, fragments: usize, max_wires: usize) -> Cost {
        match self.weight {
            None => Cost {
                primary: cuts as f64,
                fragments,
                secondary: max_wires,
            },
            Some(w) => Cost {
                primary: w * cuts as f64 + max_wires as f64,
                fragments,
                secondary: cuts,
            },
        }
    }

    fn cost_of(&self, skeleton_labels: &[usize]) -> Cost {
        match self.settle(skeleton_labels) {
            Some((_, e)) => self.objective(e.cuts, e.fragments, e.max_wires),
            None => Cost {
                primary: f64::INFINITY,
                fragments: usize::MAX,
                secondary: usize::MAX,
            },
        }
    }

    /// Extend a skeleton labeling to every operation.
    fn expand(&self, skeleton_labels: &[usize]) -> Vec<usize> {
        let mut labels = vec![0; self.graph.num_ops()];
        let mut next_skeleton_slot = 0;
        for op in 0..self.graph.num_ops() {
            if self.skeleton.get(next_skeleton_slot) == Some(&op) {
                labels[op] = skeleton_labels[next_skeleton_slot];
                next_skeleton_slot += 1;
            } else if let Some(prev) = self.prev_op[op].first().copied().flatten() {
                labels[op] = labels[prev];
            } else if let Some(next) = self.next_skeleton[op] {
                labels[op] = skeleton_labels[next];
            }
        }
        labels
    }

    /// Full labeling for a skeleton labeling with its evaluation, or `None`
    /// if no completion meets the budget and the fragment range.
    ///
    /// Short of `min_fragments`, single-wire operations get fresh labels in
    /// [`Problem::split_order`] until the count is reached.
    fn settle(&self, skeleton_labels: &[usize]) -> Option<(Vec<usize>, Evaluation)> {
        let mut labels = self.expand(skeleton_labels);
        let mut evaluation = self.evaluate(&labels)?;
        if evaluation.fragments < self.min_fragments {
            let mut fresh = labels.iter().copied().max().map_or(0, |l| l + 1);
            for op in self.split_order(&labels) {
                let previous = labels[op];
                labels[op] = fresh;
                // A split between two connected operations widens their
                // fragment by a segment and may overflow the budget. One that
                // disconnects them is left to the skeleton labeling that
                // separates them.
                let Some(split) = self
                    .evaluate(&labels)
                    .filter(|split| split.fragments == evaluation.fragments + 1)
                else {
                    labels[op] = previous;
                    continue;
                };
                fresh += 1;
                evaluation = split;
                if evaluation.fragments >= self.min_fragments {
                    break;
                }
            }
        }

        let in_range = (self.min_fragments..=self.max_fragments).contains(&evaluation.fragments);
        in_range.then_some((labels, evaluation))
    }

    /// Single-wire operations in the order they are split off.
    ///
    /// A run at a wire end, between two differently labeled operations, or
    /// on a wire without multi-wire operations yields one cut per split.
    /// Those go first. A run between two equally labeled operations pays
    /// one extra cut for its first split, so the longest of those go next.
    fn split_order(&self, labels: &[usize]) -> Vec<usize> {
        let mut order = Vec::new();
        let mut closed: Vec<&Run> = Vec::new();
        for run in &self.runs {
            match (run.before, run.after) {
                (Some(b), Some(a)) if labels[b] == labels[a] => closed.push(run),
                (None, Some(_)) => order.extend(run.ops.iter().copied()),
                (None, None) => order.extend(run.ops.iter().skip(1).rev().copied()),
                _ => order.extend(run.ops.iter().rev().copied()),
            }
        }
        closed.sort_by_key(|run| std::cmp::Reverse(run.ops.len()));
        for run in closed {
            order.extend(run.ops.iter().rev().copied());
        }
        order
    }

    /// Cut count, component count and widest component of a full labeling,
    /// or `None` if a component exceeds the budget.
    fn evaluate(&self, labels: &[usize]) -> Option<Evaluation> {
        let num_ops = self.graph.num_ops();
        let mut components = UnionFind::<usize>::new(num_ops);
        let mut cuts = 0;
        for op in 0..num_ops {
            for prev in self.prev_op[op].iter().flatten() {
                if labels[*prev] == labels[op] {
                    components.union(*prev, op);
                } else {
                    cuts += 1;
                }
            }
        }

        let mut segments = vec![0usize; num_ops];
        for op in 0..num_ops {
            for prev in &self.prev_op[op] {
                let opens = match prev {
                    None => true,
                    Some(p) => labels[*p] != labels[op],
                };
                if opens {
                    segments[components.find(op)] += 1;
                }
            }
        }

        let fragments = (0..num_ops).filter(|&op| components.find(op) == op).count();
        let max_wires = segments.iter().copied().max().unwrap_or(0);
        if max_wires > self.max_wires {
            return None;
        }
        Some(Evaluation {
            cuts,
            fragments,
            max_wires,
        })
    }

    /// Cut positions implied by a full labeling.
    fn cuts(&self, labels: &[usize]) -> Vec<CutPosition> {
        let mut cuts = Vec::new();
        for (position, &wire) in self.graph.wires().iter().enumerate() {
            let ops = self.graph.ops_at_position(position);
            for (index, pair) in ops.windows(2).enumerate() {
                if labels[pair[0].index()] != labels[pair[1].index()] {
                    cuts.push(CutPosition::new(wire, index));
                }
            }
        }
        cuts
    }

    // =========================================================================
    // Exact search
    // =========================================================================

    fn exact(&self) -> ExactOutcome {
        let max_labels = self.max_fragments - self.isolated;
        if self.skeleton.is_empty() {
            let labels: Vec<usize> = Vec::new();
            let feasible = self.settle(&labels).is_some();
            return ExactOutcome::Optimal(feasible.then_some(labels));
        }
        if max_labels == 0 {
            return ExactOutcome::Optimal(None);
        }

        let mut search = Search {
            problem: self,
            max_labels,
            labels: vec![0; self.skeleton.len()],
            segments: vec![0; max_labels],
            cuts: 0,
            used: 0,
            best: None,
            nodes: 0,
        };
        search.descend(0);
        debug!("Exact search visited {} nodes", search.nodes);

        let best = search.best.map(|(_, labels)| labels);
        if search.nodes > EXACT_NODE_CAP {
            ExactOutcome::Truncated(best)
        } else {
            ExactOutcome::Optimal(best)
        }
    }

    // =========================================================================
    // Greedy search
    // =========================================================================

    fn greedy(&self) -> Option<Vec<usize>> {
        if self.skeleton.is_empty() {
            return self.settle(&[]).map(|_| Vec::new());
        }

        // Fewer labels than the range asks for can still be completed by
        // splitting off single-wire operations.
        let mut best: Option<(Cost, Vec<usize>)> = None;
        let high = (self.max_fragments - self.isolated).min(self.skeleton.len());

        for target in 1..=high {
            let Some(start) = self.sweep(target) else {
                continue;
            };
            let labels = self.improve(start);
            let cost = self.cost_of(&labels);
            if !cost.primary.is_finite() {
                continue;
            }
            debug!("Greedy target {target}: cost {cost:?}");
            if best.as_ref().is_none_or(|(b, _)| cost.compare(b) == Ordering::Less) {
                best = Some((cost, labels));
            }
        }
        best.map(|(_, labels)| labels)
    }

    /// Balanced sweep in arena order: open a new label when the current one
    /// would exceed the budget or has reached its share of the skeleton.
    fn sweep(&self, target: usize) -> Option<Vec<usize>> {
        let n = self.skeleton.len();
        let block = n.div_ceil(target.max(1));
        let mut labels = vec![0; n];
        let mut label = 0;
        let mut size = 0;
        let mut segments = 0;

        for s in 0..n {
            let opened = |label: usize, labels: &[usize]| {
                self.skeleton_prev[s]
                    .iter()
                    .filter(|prev| prev.is_none_or(|p| labels[p] != label))
                    .count()
            };
            let mut added = opened(label, &labels);
            if size > 0
                && (segments + added > self.max_wires || (size >= block && label + 1 < target))
            {
                label += 1;
                size = 0;
                segments = 0;
                added = opened(label, &labels);
            }
            if segments + added > self.max_wires {
                return None;
            }
            labels[s] = label;
            segments += added;
            size += 1;
        }
        Some(labels)
    }

    /// Single-operation moves to a neighbor's label, kept while they
    /// strictly improve the objective.
    fn improve(&self, mut labels: Vec<usize>) -> Vec<usize> {
        let mut current = self.cost_of(&labels);
        for _ in 0..MAX_IMPROVE_ROUNDS {
            let mut improved = false;
            for s in 0..labels.len() {
                let original = labels[s];
                let mut candidates: Vec<usize> = self.skeleton_prev[s]
                    .iter()
                    .chain(&self.skeleton_next[s])
                    .flatten()
                    .map(|&n| labels[n])
                    .filter(|&l| l != original)
                    .collect();
                candidates.sort_unstable();
                candidates.dedup();

                for candidate in candidates {
                    labels[s] = candidate;
                    let cost = self.cost_of(&labels);
                    if cost.compare(&current) == Ordering::Less {
                        current = cost;
                        improved = true;
                        break;
                    }
                    labels[s] = original;
                }
            }
            if !improved {
                break;
            }
        }
        labels
    }
}

/// Branch-and-bound state over skeleton labelings.
struct Search<'p, 'g> {
    problem: &'p Problem<'g>,
    max_labels: usize,
    labels: Vec<usize>,
    /// Segments opened per label so far.
    segments: Vec<usize>,
    cuts: usize,
    used: usize,
    best: Option<(Cost, Vec<usize>)>,
    nodes: u64,
}

impl Search<'_, '_> {
    fn descend(&mut self, s: usize) {
        self.nodes += 1;
        if self.nodes > EXACT_NODE_CAP {
            return;
        }

        if s == self.labels.len() {
            let cost = self.problem.cost_of(&self.labels);
            if cost.primary.is_finite()
                && self
                    .best
                    .as_ref()
                    .is_none_or(|(best, _)| cost.compare(best) == Ordering::Less)
            {
                self.best = Some((cost, self.labels.clone()));
            }
            return;
        }

        // Predecessor labels first, then other open labels, then a new one.
        let mut order: Vec<usize> = Vec::with_capacity(self.used + 1);
        for &l in self.problem.skeleton_prev[s].iter().flatten() {
            let label = self.labels[l];
            if !order.contains(&label) {
                order.push(label);
            }
        }
        for label in 0..self.used {
            if !order.contains(&label) {
                order.push(label);
            }
        }
        if self.used < self.max_labels {
            order.push(self.used);
        }

        for label in order {
            let mut opened = 0;
            let mut cut = 0;
            for prev in &self.problem.skeleton_prev[s] {
                match prev {
                    None => opened += 1,
                    Some(p) if self.labels[*p] != label => {
                        opened += 1;
                        cut += 1;
                    }
                    Some(_) => {}
                }
            }
            if self.segments[label] + opened > self.problem.max_wires {
                continue;
            }

            let is_new = label == self.used;
            self.labels[s] = label;
            self.segments[label] += opened;
            self.cuts += cut;
            if is_new {
                self.used += 1;
            }

            let max_segments = self.segments[..self.used].iter().copied().max().unwrap_or(0);
            let bound = self.problem.objective(
                self.cuts,
                self.used + self.problem.isolated,
                max_segments,
            );
            let promising = self
                .best
                .as_ref()
                .is_none_or(|(best, _)| bound.compare(best) == Ordering::Less);
            if promising {
                self.descend(s + 1);
            }

            if is_new {
                self.used -= 1;
            }
            self.cuts -= cut;
            self.segments[label] -= opened;
        }
    }
}
