use criterion::{black_box, criterion_group, criterion_main, Criterion};
use traj_core::pipeline::{Pipeline, PipelineConfig};
use traj_core::types::{Track, TrackCollection, TrackId};

fn make_tracks(n: u32, samples: usize) -> TrackCollection {
    (0..n)
        .map(|id| {
            let phase = id as f64 * 0.1;
            let positions: Vec<(f64, f64)> = (0..samples)
                .map(|i| {
                    let x = i as f64 * 0.8;
                    (x, 15.0 * (x / 25.0 + phase).sin())
                })
                .collect();
            (TrackId(id), Track::from_positions(TrackId(id), &positions))
        })
        .collect()
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let pipeline = Pipeline::new(PipelineConfig::default()).expect("worker pool");

    for n in [50, 200, 1000] {
        let tracks = make_tracks(n, 300);
        group.bench_function(format!("{n}_tracks"), |b| {
            b.iter(|| black_box(pipeline.process_batch(&tracks).expect("batch")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
