//! Benchmarks for distribution reconstruction
//!
//! Run with: cargo bench -p qsplit-cut

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use qsplit_cut::{
    CutPosition, FragmentDistribution, FragmentResults, Partition, Reconstructor, enumerate_all,
    partition,
};
use qsplit_ir::{CircuitGraph, WireId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A ladder of `segments` blocks joined by one cut each.
fn chain(segments: u32, width: u32) -> (CircuitGraph, Vec<CutPosition>) {
    let n = segments * (width - 1) + 1;
    let mut graph = CircuitGraph::with_qubits("chain", n);
    let mut cuts = Vec::new();
    for s in 0..segments {
        let base = s * (width - 1);
        for w in base..base + width {
            graph.ry(0.3 + f64::from(w) * 0.1, WireId::qubit(w)).unwrap();
        }
        for w in base..base + width - 1 {
            graph.cx(WireId::qubit(w), WireId::qubit(w + 1)).unwrap();
        }
        if s > 0 {
            // the shared wire was last touched by the previous block's ladder
            cuts.push(CutPosition::new(WireId::qubit(base), 1));
        }
    }
    (graph, cuts)
}

fn random_results(partition: &Partition, seed: u64) -> FragmentResults {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut results = FragmentResults::new(partition.num_fragments());
    for instance in enumerate_all(partition) {
        let n = partition.fragments[instance.fragment].num_wires();
        let raw: Vec<f64> = (0..1usize << n).map(|_| rng.r#gen::<f64>()).collect();
        let total: f64 = raw.iter().sum();
        let probs = raw.into_iter().map(|p| p / total).collect();
        let distribution = FragmentDistribution::from_probabilities(n, probs).unwrap();
        results
            .insert(instance.fragment, instance.assignment, distribution)
            .unwrap();
    }
    results
}

/// Compare memoized and plain evaluation as the cut count grows
fn bench_reconstruct(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconstruct");

    for segments in &[2u32, 3, 4, 5] {
        let (graph, cuts) = chain(*segments, 3);
        let partition = partition(&graph, &cuts).unwrap();
        let results = random_results(&partition, 7);

        group.bench_with_input(BenchmarkId::new("memoized", segments), segments, |b, _| {
            let reconstructor = Reconstructor::new(&partition).unwrap();
            b.iter(|| reconstructor.reconstruct(black_box(&results)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("plain", segments), segments, |b, _| {
            let reconstructor = Reconstructor::new(&partition)
                .unwrap()
                .with_memoization(false);
            b.iter(|| reconstructor.reconstruct(black_box(&results)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("parallel", segments), segments, |b, _| {
            let reconstructor = Reconstructor::new(&partition).unwrap().with_parallel(true);
            b.iter(|| reconstructor.reconstruct(black_box(&results)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark instance enumeration
fn bench_enumerate(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumerate");

    for segments in &[2u32, 4, 6] {
        let (graph, cuts) = chain(*segments, 3);
        let partition = partition(&graph, &cuts).unwrap();
        group.bench_with_input(BenchmarkId::new("all", segments), segments, |b, _| {
            b.iter(|| enumerate_all(black_box(&partition)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reconstruct, bench_enumerate);
criterion_main!(benches);
