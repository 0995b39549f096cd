use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use vessel::domain::models::{EmbeddingVector, FatigueConfig, SubspaceMethod};
use vessel::FatigueDetector;

fn trajectory(turns: usize, dim: usize) -> Vec<EmbeddingVector> {
    (0..turns)
        .map(|t| {
            EmbeddingVector::new(
                (0..dim)
                    .map(|d| ((t * 31 + d * 17) % 97) as f64 / 97.0 - 0.5)
                    .collect(),
            )
        })
        .collect()
}

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("fatigue_detect");
    for dim in [64usize, 384, 768] {
        let points = trajectory(32, dim);
        for (label, method) in [
            ("variance_ratio", SubspaceMethod::VarianceRatio),
            ("singular_values", SubspaceMethod::SingularValues),
        ] {
            group.bench_with_input(BenchmarkId::new(label, dim), &points, |b, points| {
                b.iter_batched(
                    || {
                        FatigueDetector::new(FatigueConfig {
                            subspace_method: method,
                            ..FatigueConfig::default()
                        })
                    },
                    |mut detector| {
                        for p in points {
                            black_box(detector.detect(p, None, None));
                        }
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_detect);
criterion_main!(benches);
