use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strie::{Strie, U64};

/// Deterministic pseudo-random 8-byte keys, sorted and deduplicated.
fn make_keys(n: usize) -> Vec<[u8; 8]> {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    let mut keys: Vec<[u8; 8]> = (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            state.to_be_bytes()
        })
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

fn bench_queries(c: &mut Criterion) {
    let keys = make_keys(10_000);
    let values: Vec<u64> = (0..keys.len() as u64).collect();
    let st = Strie::new(U64, &keys, &values).unwrap();

    let mut group = c.benchmark_group("strie");
    group.bench_function("get", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(st.get(key));
            }
        })
    });

    group.bench_function("position", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(st.position(key));
            }
        })
    });

    group.bench_function("neighbors", |b| {
        b.iter(|| {
            for key in &keys {
                black_box(st.neighbors(key));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_queries);
criterion_main!(benches);
