#![forbid(unsafe_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sombra_consistency::options::{ChainCheckMode, CheckOptions};
use sombra_consistency::primitives::bytes::bits::SlotLayout;
use sombra_consistency::report::CollectingReporter;
use sombra_consistency::schema::AllOnline;
use sombra_consistency::store::{InMemoryStore, PropertyOwner, PropertyValue, StoreKind};
use sombra_consistency::check_consistency;

const NODE_COUNT: i64 = 20_000;
const RELS_PER_NODE: i64 = 6;
const SLOTS: usize = 1_024;

fn slot_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("micro/slot_layout");
    let layout = SlotLayout::new(&[40, 40, 1, 1]).expect("layout");
    let mut blocks = vec![0u8; layout.block_bytes() * SLOTS];
    let mut rng = ChaCha8Rng::seed_from_u64(0xB17_5EED);
    let values: Vec<i64> = (0..SLOTS).map(|_| rng.gen_range(0..1 << 40)).collect();

    group.throughput(Throughput::Elements(SLOTS as u64));
    group.bench_function("set", |b| {
        b.iter(|| {
            for (block, value) in blocks.chunks_mut(layout.block_bytes()).zip(&values) {
                layout.set(block, 0, *value);
                layout.set(block, 1, *value >> 3);
                layout.set_bool(block, 2, value & 1 == 1);
            }
        });
    });
    group.bench_function("get", |b| {
        b.iter(|| {
            let mut sum = 0i64;
            for block in blocks.chunks(layout.block_bytes()) {
                sum = sum.wrapping_add(layout.get(block, 0) ^ layout.get(block, 1));
                sum += layout.get_bool(block, 2) as i64;
            }
            black_box(sum)
        });
    });
    group.finish();
}

fn generate_store(rng: &mut ChaCha8Rng) -> InMemoryStore {
    let mut store = InMemoryStore::new();
    store.add_token(StoreKind::RelationshipTypeToken, "LINK");
    store.add_token(StoreKind::PropertyKeyToken, "weight");
    for _ in 0..NODE_COUNT {
        let node = store.add_node();
        store.add_properties(PropertyOwner::Node(node), &[(0, PropertyValue::Int(node))]);
    }
    for _ in 0..NODE_COUNT * RELS_PER_NODE {
        // Skewed sources give a few long chains.
        let source = if rng.gen_bool(0.1) {
            rng.gen_range(0..64)
        } else {
            rng.gen_range(0..NODE_COUNT)
        };
        store.add_relationship(source, rng.gen_range(0..NODE_COUNT), 0);
    }
    store
}

fn full_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("consistency/full");
    group.sample_size(10);
    let mut rng = ChaCha8Rng::seed_from_u64(0xC0FFEE);
    let store = generate_store(&mut rng);
    group.throughput(Throughput::Elements((NODE_COUNT * RELS_PER_NODE) as u64));

    let configs = [
        ("direct", CheckOptions::default().chain_mode(ChainCheckMode::Direct)),
        ("cached_one_pass", CheckOptions::default()),
        (
            "cached_four_passes",
            CheckOptions::default().nodes_per_pass((NODE_COUNT / 4) as u64),
        ),
    ];
    for (name, options) in configs {
        group.bench_with_input(BenchmarkId::from_parameter(name), &options, |b, options| {
            b.iter(|| {
                let reporter = CollectingReporter::new();
                let summary =
                    check_consistency(&store, &AllOnline, &reporter, options).expect("check");
                black_box(summary.errors)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, slot_codec, full_check);
criterion_main!(benches);
