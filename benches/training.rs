//! Training benchmark: batch fit of scaler + three models.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use evml_processor::config::{FeaturesConfig, TrainingConfig};
use evml_processor::record::RawRecord;
use evml_processor::train::Trainer;
use serde_json::json;

fn make_batch(n: usize) -> Vec<RawRecord> {
    (0..n)
        .map(|i| {
            let group = i % 4;
            let energy = [5.0, 20.0, 45.0, 80.0][group] + (i / 4) as f64 * 0.01;
            RawRecord::Mapping {
                fields: [
                    ("energy_consumed_kwh".to_string(), json!(energy)),
                    ("duration_h".to_string(), json!(0.5 + group as f64 * 2.0)),
                    ("charging_cost_eur".to_string(), json!(energy * 0.3)),
                ]
                .into_iter()
                .collect(),
            }
        })
        .collect()
}

fn bench_fit(c: &mut Criterion) {
    let config = TrainingConfig {
        trees: 50,
        sample_size: 64,
        ..TrainingConfig::default()
    };
    let trainer = Trainer::new(config, &FeaturesConfig::default());
    let batch = make_batch(200);

    c.bench_function("fit_200_sessions", |b| {
        b.iter(|| black_box(trainer.fit(black_box(&batch))).unwrap())
    });
}

criterion_group!(benches, bench_fit);
criterion_main!(benches);
