use context_slots::{Context, ContextLocal, InheritPolicy, SlotKey, SlotTable};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn keys(seed: u64, n: usize) -> Vec<SlotKey> {
    lcg(seed)
        .take(n)
        .map(|x| SlotKey::with_hash((x >> 32) as u32))
        .collect()
}

fn filled(keys: &[SlotKey]) -> SlotTable<u64> {
    let mut t = SlotTable::new(&keys[0], 0);
    for (i, k) in keys.iter().enumerate().skip(1) {
        t.set(k, i as u64).unwrap();
    }
    t
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("slot_table_insert_10k", |b| {
        let ks = keys(1, 10_000);
        b.iter_batched(
            || SlotTable::new(&ks[0], 0u64),
            |mut t| {
                for (i, k) in ks.iter().enumerate().skip(1) {
                    t.set(k, i as u64).unwrap();
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("slot_table_get_hit", |b| {
        let ks = keys(7, 20_000);
        let mut t = filled(&ks);
        let mut it = ks.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(t.get(k));
        })
    });
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("slot_table_get_miss", |b| {
        let ks = keys(11, 10_000);
        let mut t = filled(&ks);
        let absent = keys(0xdead_beef, 1024);
        let mut it = absent.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(t.get(k));
        })
    });
}

fn bench_stale_churn(c: &mut Criterion) {
    // Steady state where every insert's key is dropped soon after, so the
    // table lives off stale-slot reuse instead of growth.
    c.bench_function("slot_table_stale_churn", |b| {
        let anchor = SlotKey::with_hash(0);
        let mut t = SlotTable::new(&anchor, 0u64);
        let mut seeds = lcg(42);
        let mut window: Vec<SlotKey> = Vec::with_capacity(64);
        b.iter(|| {
            let k = SlotKey::with_hash((seeds.next().unwrap() >> 32) as u32);
            t.set(&k, 1).unwrap();
            if window.len() == 64 {
                window.swap_remove(0);
            }
            window.push(k);
            black_box(t.len());
        })
    });
}

fn bench_inherit(c: &mut Criterion) {
    c.bench_function("slot_table_inherit_1k", |b| {
        let ks = keys(3, 1_000);
        let t = filled(&ks);
        b.iter(|| black_box(t.inherit(|_, v| Some(*v))))
    });
}

fn bench_context_local(c: &mut Criterion) {
    c.bench_function("context_local_get_with_supplier", |b| {
        let vars: Vec<ContextLocal<u64>> = (0..256)
            .map(|i| ContextLocal::with_initial(move || i))
            .collect();
        b.iter_batched(
            Context::new,
            |mut cx| {
                for v in &vars {
                    black_box(v.get(&mut cx).unwrap());
                }
                cx
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("context_inherit_256", |b| {
        let vars: Vec<ContextLocal<u64>> = (0..256)
            .map(|_| ContextLocal::new().inherit(InheritPolicy::clone_value()))
            .collect();
        let mut parent = Context::new();
        for (i, v) in vars.iter().enumerate() {
            v.set(&mut parent, i as u64).unwrap();
        }
        b.iter(|| black_box(Context::inherit_from(&parent)))
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_get_hit, bench_get_miss, bench_stale_churn,
        bench_inherit, bench_context_local
}
criterion_main!(benches);
