use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use clustergroup::core::{diff, ClusterRef, MemberSet};

fn member_set(range: std::ops::Range<usize>) -> MemberSet {
    range
        .map(|i| ClusterRef::named(&format!("cluster-{i:05}"), &format!("name-{i}")))
        .collect()
}

/// Half of the desired set overlaps the observed one.
fn diff_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");
    for size in [10usize, 100, 1_000, 10_000] {
        let observed = member_set(0..size);
        let desired = member_set(size / 2..size + size / 2);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| diff(black_box(&observed), black_box(&desired)))
        });
    }
    group.finish();
}

fn from_refs_benchmark(c: &mut Criterion) {
    let refs: Vec<ClusterRef> = (0..10_000)
        .map(|i| ClusterRef::new(&format!("cluster-{}", i % 5_000)))
        .collect();
    c.bench_function("member_set_from_refs_with_duplicates", |b| {
        b.iter(|| MemberSet::from_refs(black_box(&refs)))
    });
}

criterion_group!(benches, diff_benchmark, from_refs_benchmark);
criterion_main!(benches);
