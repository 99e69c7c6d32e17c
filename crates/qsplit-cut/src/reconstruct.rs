//! Reconstruction of the full distribution from fragment distributions.
//!
//! With `K` cuts the full distribution is
//!
//! ```text
//!   p = 2^-K  Σ_{P_1..P_K ∈ {I,X,Y,Z}}  ⊗_f  collapsed_f(P)
//! ```
//!
//! where `collapsed_f(P)` folds fragment `f`'s distributions for the
//! assignments implied by `P` into a vector over its effective wires (the
//! local wires that are not measured into a cut).
//!
//! Fragments are multiplied in "smart order", narrowest first. Combinations
//! are visited so that the cuts touching early fragments change slowest, and
//! running Kronecker prefixes are cached, so most combinations only pay for
//! the last product.

use std::ops::Range;
use std::rc::Rc;

use qsplit_ir::WireId;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::distribution::{FragmentResults, ReconstructedDistribution};
use crate::error::{CutError, CutResult};
use crate::instance::{BasisAssignment, MeasBasis, Pauli, qubit_roles};
use crate::partition::Partition;

/// Largest number of cuts whose combinations can be counted in a `u64`.
const MAX_CUTS: usize = 31;

/// Counters describing the work done by one reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconstructionStats {
    /// Number of cuts.
    pub num_cuts: usize,
    /// `4^cuts`.
    pub theoretical_combinations: u64,
    /// Combinations whose Kronecker product was accumulated.
    pub combinations_evaluated: u64,
    /// Combinations dropped because a collapsed term vanished.
    pub combinations_skipped: u64,
    /// Collapsed terms requested.
    pub collapse_calls: u64,
    /// Collapsed terms served from the cache.
    pub collapse_hits: u64,
    /// Pairwise Kronecker products computed.
    pub kron_calls: u64,
    /// Combinations that started from a cached prefix.
    pub prefix_hits: u64,
    /// Prefixes held in the cache at the end. Parallel workers keep private
    /// caches, so a prefix cached by several workers counts once per worker.
    pub cached_prefixes: u64,
}

impl ReconstructionStats {
    fn merge(&mut self, other: &ReconstructionStats) {
        self.combinations_evaluated += other.combinations_evaluated;
        self.combinations_skipped += other.combinations_skipped;
        self.collapse_calls += other.collapse_calls;
        self.collapse_hits += other.collapse_hits;
        self.kron_calls += other.kron_calls;
        self.prefix_hits += other.prefix_hits;
        self.cached_prefixes += other.cached_prefixes;
    }
}

/// Output of [`Reconstructor::reconstruct`].
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// The reconstructed distribution.
    pub distribution: ReconstructedDistribution,
    /// Work counters.
    pub stats: ReconstructionStats,
}

/// Precomputed per-fragment data, in smart order.
#[derive(Debug)]
struct FragmentPlan {
    fragment: usize,
    num_local: usize,
    /// Rho wires as (local wire, cut).
    rho: Vec<(u32, usize)>,
    /// O wires as (local wire, cut).
    o: Vec<(u32, usize)>,
    /// Number of effective wires.
    num_effective: usize,
    /// Local outcome index -> effective outcome index.
    effective_index: Vec<usize>,
    /// Cuts touching this fragment, one base-4 digit each in the
    /// assignment id.
    endpoints: Vec<usize>,
}

impl FragmentPlan {
    #[allow(clippy::cast_possible_truncation)]
    fn assignment_id(&self, paulis: &[Pauli]) -> u64 {
        self.endpoints
            .iter()
            .fold(0u64, |id, &cut| id * 4 + paulis[cut] as u64)
    }
}

/// Recombines fragment distributions into the full-circuit distribution.
#[derive(Debug)]
pub struct Reconstructor<'a> {
    partition: &'a Partition,
    fragments: Vec<FragmentPlan>,
    /// Cuts from most to least significant combination digit.
    cut_order: Vec<usize>,
    num_cuts: usize,
    /// Kronecker index bit -> original wire position.
    kron_to_original: Vec<usize>,
    memoize: bool,
    parallel: bool,
    normalization_tolerance: f64,
}

impl<'a> Reconstructor<'a> {
    /// Prepare a reconstruction for `partition`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(partition: &'a Partition) -> CutResult<Self> {
        let links = partition.paths.cut_links();
        let num_cuts = links.len();
        if num_cuts > MAX_CUTS {
            return Err(CutError::TooManyCuts {
                cuts: num_cuts,
                max: MAX_CUTS,
            });
        }

        let mut plans = Vec::with_capacity(partition.num_fragments());
        for fragment in &partition.fragments {
            let roles = qubit_roles(fragment, &partition.paths);
            let mut rho = Vec::new();
            let mut o = Vec::new();
            for (cut, link) in links.iter().enumerate() {
                if link.downstream.fragment == fragment.index {
                    rho.push((link.downstream.local, cut));
                }
                if link.upstream.fragment == fragment.index {
                    o.push((link.upstream.local, cut));
                }
            }
            rho.sort_unstable();
            o.sort_unstable();

            let mut endpoints: Vec<usize> =
                rho.iter().chain(&o).map(|&(_, cut)| cut).collect();
            endpoints.sort_unstable();
            endpoints.dedup();

            let effective: Vec<usize> = (0..fragment.num_wires())
                .filter(|&w| !roles[w].needs_measurement())
                .collect();
            let effective_index = (0..1usize << fragment.num_wires())
                .map(|x| {
                    effective
                        .iter()
                        .enumerate()
                        .fold(0, |acc, (bit, &w)| acc | (((x >> w) & 1) << bit))
                })
                .collect();

            plans.push(FragmentPlan {
                fragment: fragment.index,
                num_local: fragment.num_wires(),
                rho,
                o,
                num_effective: effective.len(),
                effective_index,
                endpoints,
            });
        }

        // Smart order: narrowest effective width first.
        plans.sort_by_key(|p| (p.num_effective, p.fragment));

        let mut rank = vec![0usize; partition.num_fragments()];
        for (position, plan) in plans.iter().enumerate() {
            rank[plan.fragment] = position;
        }
        let mut cut_order: Vec<usize> = (0..num_cuts).collect();
        cut_order.sort_by_key(|&cut| {
            let link = &links[cut];
            (rank[link.upstream.fragment].min(rank[link.downstream.fragment]), cut)
        });

        // Effective wires are exactly the final hops of the original wires.
        let mut final_hop = FxHashMap::default();
        for (position, path) in partition.paths.paths().iter().enumerate() {
            if let Some(hop) = path.last() {
                final_hop.insert((hop.fragment, hop.local), position);
            }
        }
        let mut kron_to_original = Vec::new();
        for plan in plans.iter().rev() {
            let roles = qubit_roles(&partition.fragments[plan.fragment], &partition.paths);
            for local in (0..plan.num_local).filter(|&w| !roles[w].needs_measurement()) {
                let position = final_hop
                    .get(&(plan.fragment, local as u32))
                    .copied()
                    .ok_or_else(|| {
                        CutError::InvalidDistribution(format!(
                            "local wire {local} of fragment {} is not the end of any wire",
                            plan.fragment
                        ))
                    })?;
                kron_to_original.push(position);
            }
        }
        if kron_to_original.len() != partition.num_original_wires() {
            return Err(CutError::InvalidDistribution(format!(
                "fragments expose {} output wires, circuit has {}",
                kron_to_original.len(),
                partition.num_original_wires()
            )));
        }

        debug!(
            "Smart order {:?}, cut order {:?}",
            plans.iter().map(|p| p.fragment).collect::<Vec<_>>(),
            cut_order
        );

        Ok(Self {
            partition,
            fragments: plans,
            cut_order,
            num_cuts,
            kron_to_original,
            memoize: true,
            parallel: false,
            normalization_tolerance: 1e-6,
        })
    }

    /// Enable or disable the collapse and prefix caches.
    pub fn with_memoization(mut self, memoize: bool) -> Self {
        self.memoize = memoize;
        self
    }

    /// Enable or disable rayon-parallel reconstruction.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Allowed deviation of the total mass from 1 before a warning is logged.
    pub fn with_normalization_tolerance(mut self, tolerance: f64) -> Self {
        self.normalization_tolerance = tolerance;
        self
    }

    /// Fragment indices in multiplication order.
    pub fn smart_order(&self) -> Vec<usize> {
        self.fragments.iter().map(|p| p.fragment).collect()
    }

    /// Number of cuts.
    #[inline]
    pub fn num_cuts(&self) -> usize {
        self.num_cuts
    }

    /// Run the reconstruction.
    ///
    /// # Errors
    ///
    /// [`CutError::ReconstructionMismatch`] if a needed distribution is
    /// missing, [`CutError::InvalidDistribution`] if one has the wrong
    /// length.
    #[instrument(skip_all, fields(fragments = self.fragments.len(), cuts = self.num_cuts))]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn reconstruct(&self, results: &FragmentResults) -> CutResult<Reconstruction> {
        if results.num_fragments() != self.partition.num_fragments() {
            return Err(CutError::InvalidDistribution(format!(
                "results cover {} fragments, partition has {}",
                results.num_fragments(),
                self.partition.num_fragments()
            )));
        }

        let num_wires = self.kron_to_original.len();
        if num_wires >= usize::BITS as usize {
            return Err(CutError::InvalidDistribution(format!(
                "{num_wires} wires do not fit a dense distribution"
            )));
        }
        let total_combinations = 1u64 << (2 * self.num_cuts);

        let lead = self.parallel_lead_digits();
        let (accumulator, mut stats) = if lead == 0 {
            let mut worker = Worker::new(self, results);
            worker.run(0..total_combinations)?;
            worker.finish()
        } else {
            let chunks = 1u64 << (2 * lead);
            let stride = total_combinations / chunks;
            debug!("Reconstructing in {chunks} parallel chunks of {stride} combinations");
            let partials = (0..chunks)
                .into_par_iter()
                .map(|chunk| {
                    let mut worker = Worker::new(self, results);
                    worker.run(chunk * stride..(chunk + 1) * stride)?;
                    Ok(worker.finish())
                })
                .collect::<CutResult<Vec<_>>>()?;

            let mut accumulator = vec![0.0; 1usize << num_wires];
            let mut stats = ReconstructionStats::default();
            for (partial, partial_stats) in &partials {
                for (acc, v) in accumulator.iter_mut().zip(partial) {
                    *acc += v;
                }
                stats.merge(partial_stats);
            }
            (accumulator, stats)
        };
        stats.num_cuts = self.num_cuts;
        stats.theoretical_combinations = total_combinations;

        let scale = 0.5f64.powi(self.num_cuts as i32);
        let mut probs = vec![0.0; accumulator.len()];
        for (index, value) in accumulator.into_iter().enumerate() {
            let original = self
                .kron_to_original
                .iter()
                .enumerate()
                .filter(|(bit, _)| (index >> bit) & 1 == 1)
                .fold(0usize, |acc, (_, &position)| acc | (1 << position));
            probs[original] = value * scale;
        }

        let wires: Vec<WireId> = self.partition.paths.paths().iter().map(|p| p.wire).collect();
        let distribution = ReconstructedDistribution::new(wires, probs)?;

        let total = distribution.total();
        if (total - 1.0).abs() > self.normalization_tolerance {
            warn!(
                "Reconstructed distribution sums to {total:.9}, outside tolerance {:e}",
                self.normalization_tolerance
            );
        }
        info!(
            "Reconstructed {} combinations ({} skipped, {} Kronecker products, {} prefix hits)",
            stats.combinations_evaluated,
            stats.combinations_skipped,
            stats.kron_calls,
            stats.prefix_hits
        );

        Ok(Reconstruction {
            distribution,
            stats,
        })
    }

    /// Number of leading combination digits used to split the work.
    fn parallel_lead_digits(&self) -> usize {
        if !self.parallel || self.num_cuts == 0 {
            return 0;
        }
        let threads = rayon::current_num_threads().max(1);
        let mut lead = 1;
        while lead < self.num_cuts && (1usize << (2 * lead)) < threads {
            lead += 1;
        }
        lead
    }

    fn decode(&self, combination: u64, paulis: &mut [Pauli]) {
        for (digit, &cut) in self.cut_order.iter().enumerate() {
            let shift = 2 * (self.num_cuts - 1 - digit);
            paulis[cut] = Pauli::from_digit(((combination >> shift) & 3) as usize);
        }
    }

    fn collapse(
        &self,
        plan: &FragmentPlan,
        paulis: &[Pauli],
        results: &FragmentResults,
    ) -> CutResult<Option<Vec<f64>>> {
        let meas: Vec<(u32, MeasBasis)> = plan
            .o
            .iter()
            .map(|&(local, cut)| (local, paulis[cut].measurement_basis()))
            .collect();
        let parity_mask = plan
            .o
            .iter()
            .filter(|(_, cut)| paulis[*cut].is_parity())
            .fold(0usize, |mask, (local, _)| mask | (1 << local));

        let mut term = vec![0.0; 1usize << plan.num_effective];
        for expansion in 0..1usize << plan.rho.len() {
            let mut sign = 1.0;
            let mut inits = Vec::with_capacity(plan.rho.len());
            for (t, &(local, cut)) in plan.rho.iter().enumerate() {
                let (state, s) = paulis[cut].eigenstates()[(expansion >> t) & 1];
                sign *= s;
                inits.push((local, state));
            }
            let assignment = BasisAssignment::new(inits, meas.clone());
            let distribution = results.get(plan.fragment, &assignment).ok_or_else(|| {
                CutError::ReconstructionMismatch {
                    fragment: plan.fragment,
                    assignment: assignment.clone(),
                }
            })?;
            if distribution.probs().len() != plan.effective_index.len() {
                return Err(CutError::InvalidDistribution(format!(
                    "fragment {} has {} local wires but its distribution under {assignment} has {} entries",
                    plan.fragment,
                    plan.num_local,
                    distribution.probs().len()
                )));
            }

            for (x, &p) in distribution.probs().iter().enumerate() {
                if p == 0.0 {
                    continue;
                }
                let parity = if (x & parity_mask).count_ones() % 2 == 1 {
                    -1.0
                } else {
                    1.0
                };
                term[plan.effective_index[x]] += sign * parity * p;
            }
        }

        if term.iter().all(|v| *v == 0.0) {
            return Ok(None);
        }
        Ok(Some(term))
    }
}

/// Per-thread reconstruction state. Caches are never shared.
struct Worker<'r, 'a> {
    reconstructor: &'r Reconstructor<'a>,
    results: &'r FragmentResults,
    /// Per smart-order position: assignment id -> collapsed term.
    collapsed: Vec<FxHashMap<u64, Option<Rc<Vec<f64>>>>>,
    /// Assignment ids of the first `n` fragments -> their Kronecker product.
    prefixes: FxHashMap<Vec<u64>, Rc<Vec<f64>>>,
    accumulator: Vec<f64>,
    stats: ReconstructionStats,
}

impl<'r, 'a> Worker<'r, 'a> {
    fn new(reconstructor: &'r Reconstructor<'a>, results: &'r FragmentResults) -> Self {
        Self {
            reconstructor,
            results,
            collapsed: vec![FxHashMap::default(); reconstructor.fragments.len()],
            prefixes: FxHashMap::default(),
            accumulator: vec![0.0; 1usize << reconstructor.kron_to_original.len()],
            stats: ReconstructionStats::default(),
        }
    }

    fn run(&mut self, combinations: Range<u64>) -> CutResult<()> {
        let reconstructor = self.reconstructor;
        let mut paulis = vec![Pauli::I; reconstructor.num_cuts];
        let mut ids = vec![0u64; reconstructor.fragments.len()];
        let mut terms = Vec::with_capacity(reconstructor.fragments.len());

        'combinations: for combination in combinations {
            reconstructor.decode(combination, &mut paulis);
            terms.clear();
            for (position, plan) in reconstructor.fragments.iter().enumerate() {
                ids[position] = plan.assignment_id(&paulis);
                match self.collapsed_term(position, ids[position], &paulis)? {
                    Some(term) => terms.push(term),
                    None => {
                        self.stats.combinations_skipped += 1;
                        continue 'combinations;
                    }
                }
            }
            self.stats.combinations_evaluated += 1;
            self.accumulate(&ids, &terms);
        }
        Ok(())
    }

    fn collapsed_term(
        &mut self,
        position: usize,
        id: u64,
        paulis: &[Pauli],
    ) -> CutResult<Option<Rc<Vec<f64>>>> {
        self.stats.collapse_calls += 1;
        if self.reconstructor.memoize {
            if let Some(term) = self.collapsed[position].get(&id) {
                self.stats.collapse_hits += 1;
                return Ok(term.clone());
            }
        }
        let plan = &self.reconstructor.fragments[position];
        let term = self
            .reconstructor
            .collapse(plan, paulis, self.results)?
            .map(Rc::new);
        if self.reconstructor.memoize {
            self.collapsed[position].insert(id, term.clone());
        }
        Ok(term)
    }

    fn accumulate(&mut self, ids: &[u64], terms: &[Rc<Vec<f64>>]) {
        let len = terms.len();
        let Some(first) = terms.first() else {
            // no fragments: the empty circuit
            self.accumulator[0] += 1.0;
            return;
        };
        let mut product = Rc::clone(first);
        let mut done = 1;

        if self.reconstructor.memoize {
            for prefix in (2..len).rev() {
                if let Some(cached) = self.prefixes.get(&ids[..prefix]) {
                    product = Rc::clone(cached);
                    done = prefix;
                    self.stats.prefix_hits += 1;
                    break;
                }
            }
        }

        while done < len {
            let next = Rc::new(kron(&product, &terms[done]));
            self.stats.kron_calls += 1;
            done += 1;
            if self.reconstructor.memoize && done < len {
                self.prefixes.insert(ids[..done].to_vec(), Rc::clone(&next));
            }
            product = next;
        }

        for (acc, v) in self.accumulator.iter_mut().zip(product.iter()) {
            *acc += v;
        }
    }

    fn finish(self) -> (Vec<f64>, ReconstructionStats) {
        let mut stats = self.stats;
        stats.cached_prefixes = self.prefixes.len() as u64;
        (self.accumulator, stats)
    }
}

/// Kronecker product with `a` as the more significant factor.
fn kron(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(a.len() * b.len());
    for &x in a {
        if x == 0.0 {
            out.resize(out.len() + b.len(), 0.0);
        } else {
            out.extend(b.iter().map(|y| x * y));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cut::CutPosition;
    use crate::distribution::FragmentDistribution;
    use crate::instance::{InitState, enumerate_all};
    use crate::partition::partition;
    use qsplit_ir::CircuitGraph;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn q(i: u32) -> WireId {
        WireId::qubit(i)
    }

    /// Fill every instance with a random normalized distribution.
    fn random_results(partition: &Partition, seed: u64) -> FragmentResults {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut results = FragmentResults::new(partition.num_fragments());
        for instance in enumerate_all(partition) {
            let n = partition.fragments[instance.fragment].num_wires();
            let raw: Vec<f64> = (0..1usize << n).map(|_| rng.r#gen::<f64>()).collect();
            let total: f64 = raw.iter().sum();
            let probs = raw.into_iter().map(|p| p / total).collect();
            let dist = FragmentDistribution::from_probabilities(n, probs).unwrap();
            results
                .insert(instance.fragment, instance.assignment, dist)
                .unwrap();
        }
        results
    }

    fn assert_close(a: &[f64], b: &[f64], tolerance: f64) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            assert!((x - y).abs() <= tolerance, "entry {i}: {x} vs {y}");
        }
    }

    /// q1: [cx01, ry, cx12], q2: [cx12, ry, cx23]. Cutting both wires after
    /// their `ry` gives a three-fragment chain.
    fn chain_circuit() -> CircuitGraph {
        let mut graph = CircuitGraph::with_qubits("chain", 4);
        graph.h(q(0)).unwrap();
        graph.cx(q(0), q(1)).unwrap();
        graph.ry(0.4, q(1)).unwrap();
        graph.cx(q(1), q(2)).unwrap();
        graph.ry(0.9, q(2)).unwrap();
        graph.cx(q(2), q(3)).unwrap();
        graph
    }

    fn chain_cuts() -> [CutPosition; 2] {
        [CutPosition::new(q(1), 1), CutPosition::new(q(2), 1)]
    }

    #[test]
    fn test_kron_order() {
        assert_eq!(kron(&[1.0, 2.0], &[3.0, 4.0]), vec![3.0, 4.0, 6.0, 8.0]);
        assert_eq!(kron(&[0.0, 1.0], &[5.0]), vec![0.0, 5.0]);
    }

    #[test]
    fn test_hadamard_pair_across_cut() {
        // H then H on one wire, cut between them: the result is |0>.
        let mut graph = CircuitGraph::with_qubits("hh", 1);
        graph.h(q(0)).unwrap();
        graph.h(q(0)).unwrap();
        let partition = partition(&graph, &[CutPosition::new(q(0), 0)]).unwrap();

        let half = |n| FragmentDistribution::from_probabilities(n, vec![0.5, 0.5]).unwrap();
        let point = |bit: usize| {
            let mut probs = vec![0.0, 0.0];
            probs[bit] = 1.0;
            FragmentDistribution::from_probabilities(1, probs).unwrap()
        };

        let mut results = FragmentResults::new(2);
        // upstream: H|0> = |+>
        results
            .insert(0, BasisAssignment::new(vec![], vec![(0, MeasBasis::I)]), half(1))
            .unwrap();
        results
            .insert(0, BasisAssignment::new(vec![], vec![(0, MeasBasis::X)]), point(0))
            .unwrap();
        results
            .insert(0, BasisAssignment::new(vec![], vec![(0, MeasBasis::Y)]), half(1))
            .unwrap();
        // downstream: H applied to each injected state
        for (state, dist) in [
            (InitState::Zero, half(1)),
            (InitState::One, half(1)),
            (InitState::Plus, point(0)),
            (InitState::Minus, point(1)),
            (InitState::PlusI, half(1)),
            (InitState::MinusI, half(1)),
        ] {
            results
                .insert(1, BasisAssignment::new(vec![(0, state)], vec![]), dist)
                .unwrap();
        }

        let reconstruction = Reconstructor::new(&partition)
            .unwrap()
            .reconstruct(&results)
            .unwrap();
        assert_close(reconstruction.distribution.probs(), &[1.0, 0.0], 1e-12);
        assert_eq!(reconstruction.stats.theoretical_combinations, 4);
        // Y and Z terms vanish on the upstream side
        assert_eq!(reconstruction.stats.combinations_evaluated, 2);
        assert_eq!(reconstruction.stats.combinations_skipped, 2);
    }

    #[test]
    fn test_missing_distribution() {
        let graph = chain_circuit();
        let partition = partition(&graph, &[CutPosition::new(q(1), 1)]).unwrap();
        let results = FragmentResults::new(partition.num_fragments());
        let result = Reconstructor::new(&partition).unwrap().reconstruct(&results);
        assert!(matches!(
            result,
            Err(CutError::ReconstructionMismatch { .. })
        ));
    }

    #[test]
    fn test_memoization_equivalence() {
        let graph = chain_circuit();
        let partition = partition(&graph, &chain_cuts()).unwrap();
        let results = random_results(&partition, 7);

        let plain = Reconstructor::new(&partition)
            .unwrap()
            .with_memoization(false)
            .reconstruct(&results)
            .unwrap();
        let memo = Reconstructor::new(&partition)
            .unwrap()
            .reconstruct(&results)
            .unwrap();

        assert_close(
            plain.distribution.probs(),
            memo.distribution.probs(),
            1e-12,
        );
        assert_eq!(plain.stats.collapse_hits, 0);
        assert_eq!(plain.stats.prefix_hits, 0);
        assert!(memo.stats.collapse_hits > 0);
        assert!(memo.stats.kron_calls <= plain.stats.kron_calls);
        assert_eq!(memo.stats.theoretical_combinations, 16);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let graph = chain_circuit();
        let partition = partition(&graph, &chain_cuts()).unwrap();
        let results = random_results(&partition, 11);

        let serial = Reconstructor::new(&partition)
            .unwrap()
            .reconstruct(&results)
            .unwrap();
        let parallel = Reconstructor::new(&partition)
            .unwrap()
            .with_parallel(true)
            .reconstruct(&results)
            .unwrap();
        assert_close(
            serial.distribution.probs(),
            parallel.distribution.probs(),
            1e-12,
        );
        assert_eq!(
            serial.stats.combinations_evaluated + serial.stats.combinations_skipped,
            parallel.stats.combinations_evaluated + parallel.stats.combinations_skipped
        );
    }

    #[test]
    fn test_cached_prefixes_counted_per_worker() {
        let graph = chain_circuit();
        let partition = partition(&graph, &chain_cuts()).unwrap();
        let results = random_results(&partition, 5);

        let plain = Reconstructor::new(&partition)
            .unwrap()
            .with_memoization(false)
            .reconstruct(&results)
            .unwrap();
        let serial = Reconstructor::new(&partition)
            .unwrap()
            .reconstruct(&results)
            .unwrap();
        let parallel = Reconstructor::new(&partition)
            .unwrap()
            .with_parallel(true)
            .reconstruct(&results)
            .unwrap();

        assert_eq!(plain.stats.cached_prefixes, 0);
        assert!(serial.stats.cached_prefixes > 0);
        assert!(parallel.stats.cached_prefixes >= serial.stats.cached_prefixes);
    }

    #[test]
    fn test_too_many_cuts() {
        let mut graph = CircuitGraph::with_qubits("long", 1);
        for _ in 0..=MAX_CUTS + 1 {
            graph.h(q(0)).unwrap();
        }
        let cuts: Vec<CutPosition> = (0..=MAX_CUTS).map(|i| CutPosition::new(q(0), i)).collect();
        let partition = partition(&graph, &cuts).unwrap();
        assert_eq!(partition.num_fragments(), MAX_CUTS + 2);

        match Reconstructor::new(&partition) {
            Err(CutError::TooManyCuts { cuts, max }) => {
                assert_eq!(cuts, MAX_CUTS + 1);
                assert_eq!(max, MAX_CUTS);
            }
            other => panic!("expected TooManyCuts, got {other:?}"),
        }
    }

    #[test]
    fn test_normalized_inputs_give_unit_mass() {
        let graph = chain_circuit();
        let partition = partition(&graph, &chain_cuts()).unwrap();
        assert_eq!(partition.num_fragments(), 3);
        let results = random_results(&partition, 3);
        let reconstruction = Reconstructor::new(&partition)
            .unwrap()
            .reconstruct(&results)
            .unwrap();
        assert!((reconstruction.distribution.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_smart_order_puts_narrow_fragments_first() {
        let mut graph = CircuitGraph::with_qubits("wide", 4);
        graph.cx(q(0), q(1)).unwrap();
        graph.cx(q(1), q(2)).unwrap();
        graph.cx(q(2), q(3)).unwrap();
        graph.h(q(3)).unwrap();
        // q3: [cx23, h]; cutting after cx23 leaves a 1-wire tail fragment
        let partition = partition(&graph, &[CutPosition::new(q(3), 0)]).unwrap();
        let reconstructor = Reconstructor::new(&partition).unwrap();
        assert_eq!(reconstructor.smart_order(), vec![1, 0]);
        assert_eq!(reconstructor.num_cuts(), 1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(24))]

            #[test]
            fn memoized_equals_plain(seed in 0u64..1000, cut_a in 0usize..2, cut_b in 0usize..2) {
                let mut graph = CircuitGraph::with_qubits("ladder", 3);
                graph.h(q(0)).unwrap();
                graph.cx(q(0), q(1)).unwrap();
                graph.cx(q(1), q(2)).unwrap();
                graph.cx(q(0), q(1)).unwrap();
                graph.cx(q(1), q(2)).unwrap();
                graph.h(q(2)).unwrap();

                // q1: [cx01, cx12, cx01, cx12]
                let mut cuts = vec![CutPosition::new(q(1), cut_a), CutPosition::new(q(1), 2)];
                if cut_b == 1 {
                    cuts.push(CutPosition::new(q(2), 0));
                }
                let Ok(partition) = partition(&graph, &cuts) else {
                    return Ok(());
                };
                let results = random_results(&partition, seed);

                let plain = Reconstructor::new(&partition).unwrap()
                    .with_memoization(false)
                    .reconstruct(&results)
                    .unwrap();
                let memo = Reconstructor::new(&partition).unwrap()
                    .reconstruct(&results)
                    .unwrap();
                for (a, b) in plain.distribution.probs().iter().zip(memo.distribution.probs()) {
                    prop_assert!((a - b).abs() < 1e-12);
                }
            }
        }
    }
}
