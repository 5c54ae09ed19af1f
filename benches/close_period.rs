use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pioneer::{EngineConfig, PioneerEngine};

/// Deterministic estimate for `expert` at `period`: everyone drifts toward
/// expert 0, which holds still.
fn estimate(expert: usize, period: u64, dimension: usize) -> Vec<f64> {
    (0..dimension)
        .map(|d| {
            if expert == 0 {
                10.0
            } else {
                let start = 10.0 + (expert * 7 + d * 3) as f64 % 40.0;
                10.0 + (start - 10.0) * 0.8_f64.powi(period as i32)
            }
        })
        .collect()
}

/// Engine with `warmup` closed periods for `experts` experts.
fn warmed_engine(experts: usize, dimension: usize, warmup: u64) -> PioneerEngine {
    let mut engine = PioneerEngine::new(EngineConfig::default()).expect("default config is valid");
    for period in 1..=warmup {
        for expert in 0..experts {
            engine
                .submit_estimate(format!("expert-{expert:04}"), period, estimate(expert, period, dimension))
                .expect("valid observation");
        }
        engine.close_period(period).expect("period closes");
    }
    engine
}

fn bench_close_period(c: &mut Criterion) {
    let mut group = c.benchmark_group("close_period");
    for &experts in &[10_usize, 100, 500] {
        group.bench_with_input(BenchmarkId::new("experts", experts), &experts, |b, &experts| {
            b.iter_batched(
                || {
                    let mut engine = warmed_engine(experts, 4, 8);
                    for expert in 0..experts {
                        engine
                            .submit_estimate(format!("expert-{expert:04}"), 9, estimate(expert, 9, 4))
                            .expect("valid observation");
                    }
                    engine
                },
                |mut engine| {
                    black_box(engine.close_period(9).expect("period closes").reporters());
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_close_period);
criterion_main!(benches);
