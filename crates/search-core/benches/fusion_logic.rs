use criterion::{Criterion, criterion_group, criterion_main};
use search_core::{SourceScore, fuse};

fn bench_fusion(c: &mut Criterion) {
    let bm25: Vec<SourceScore> = (0..100)
        .map(|i| SourceScore {
            source: format!("l{i}.rs:1"),
            text: format!("text {i}"),
            score: 100.0 - i as f32,
        })
        .collect();
    let vector: Vec<SourceScore> = (0..100)
        .rev()
        .map(|i| SourceScore {
            source: format!("l{i}.rs:1"),
            text: format!("text {i}"),
            score: i as f32,
        })
        .collect();

    c.bench_function("fuse_100", |b| {
        b.iter(|| {
            let _ = fuse(&bm25, &vector, 0.5, 0.5);
        })
    });
}

criterion_group!(benches, bench_fusion);
criterion_main!(benches);
