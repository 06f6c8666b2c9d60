#![allow(missing_docs)]

use proptest::prelude::*;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sombra_consistency::{
    check_consistency,
    options::{ChainCheckMode, CheckOptions},
    report::{ChainField, CollectingReporter, Finding, Inconsistency},
    schema::AllOnline,
    store::{InMemoryStore, Link, RecordAccess, RecordKey, RelationshipRecord, Side, StoreKind, NO_ID},
};

const SEED: u64 = 0x5EED_C4A1;

#[derive(Debug, Clone)]
enum Corruption {
    Pointer { rel: usize, side: Side, link: Link, value: i64 },
    Unused { rel: usize },
    FirstFlag { rel: usize, side: Side },
    Endpoint { rel: usize, side: Side, node: i64 },
}

fn build(nodes: i64, edges: &[(i64, i64)]) -> InMemoryStore {
    let mut store = InMemoryStore::new();
    store.add_token(StoreKind::RelationshipTypeToken, "LINK");
    for _ in 0..nodes {
        store.add_node();
    }
    for &(source, target) in edges {
        store.add_relationship(source % nodes, target % nodes, 0);
    }
    store
}

fn corrupt(store: &mut InMemoryStore, corruptions: &[Corruption]) {
    let high = store.high_id(StoreKind::Relationship) as usize;
    for corruption in corruptions {
        match *corruption {
            Corruption::Pointer {
                rel,
                side,
                link,
                value,
            } => {
                if let Some(record) = store.relationship_mut((rel % high) as i64) {
                    record.set_pointer(side, link, value);
                }
            }
            Corruption::Unused { rel } => {
                if let Some(record) = store.relationship_mut((rel % high) as i64) {
                    record.in_use = false;
                }
            }
            Corruption::FirstFlag { rel, side } => {
                if let Some(record) = store.relationship_mut((rel % high) as i64) {
                    let first = record.is_first(side);
                    record.set_first(side, !first);
                }
            }
            Corruption::Endpoint { rel, side, node } => {
                if let Some(record) = store.relationship_mut((rel % high) as i64) {
                    match side {
                        Side::Source => record.source = node,
                        Side::Target => record.target = node,
                    }
                }
            }
        }
    }
}

fn findings(store: &InMemoryStore, options: &CheckOptions) -> Vec<Finding> {
    let reporter = CollectingReporter::new();
    check_consistency(store, &AllOnline, &reporter, &options.clone().check_schema(false))
        .expect("check runs");
    reporter.sorted()
}

fn direct() -> CheckOptions {
    CheckOptions::default()
        .workers(1)
        .chain_mode(ChainCheckMode::Direct)
}

/// Chain pointer as stored, with the head's `prev` (its chain length)
/// read as no pointer.
fn chain_pointer(record: &RelationshipRecord, side: Side, link: Link) -> i64 {
    let (first, prev, next) = match side {
        Side::Source => (
            record.first_in_source_chain,
            record.source_prev,
            record.source_next,
        ),
        Side::Target => (
            record.first_in_target_chain,
            record.target_prev,
            record.target_next,
        ),
    };
    match link {
        Link::Prev if first => NO_ID,
        Link::Prev => prev,
        Link::Next => next,
    }
}

/// Chain findings worked out record by record: every set pointer of an
/// in-use relationship whose endpoint is a node id is read and compared
/// against the record it names.
fn chain_oracle(store: &InMemoryStore) -> Vec<Finding> {
    let nodes = store.high_id(StoreKind::Node);
    let mut expected = Vec::new();
    for id in 0..store.high_id(StoreKind::Relationship) {
        let record = store.relationship(id).unwrap();
        if !record.in_use {
            continue;
        }
        for side in [Side::Source, Side::Target] {
            let node = match side {
                Side::Source => record.source,
                Side::Target => record.target,
            };
            if node < 0 || node >= nodes {
                continue;
            }
            for (link, back) in [(Link::Prev, Link::Next), (Link::Next, Link::Prev)] {
                let value = chain_pointer(&record, side, link);
                if value == NO_ID {
                    continue;
                }
                let field = ChainField::new(side, link);
                let other = store.relationship(value).unwrap();
                let shared: Vec<Side> = [Side::Source, Side::Target]
                    .into_iter()
                    .filter(|&other_side| match other_side {
                        Side::Source => other.source == node,
                        Side::Target => other.target == node,
                    })
                    .collect();
                let inconsistency = if !other.in_use {
                    Inconsistency::ChainReferenceNotInUse {
                        field,
                        relationship: other.id,
                    }
                } else if shared.is_empty() {
                    Inconsistency::ChainReferencesOtherNodes {
                        field,
                        relationship: other.id,
                    }
                } else if shared
                    .iter()
                    .all(|&other_side| chain_pointer(&other, other_side, back) != id)
                {
                    Inconsistency::ChainDoesNotReferenceBack {
                        field,
                        relationship: other.id,
                    }
                } else {
                    continue;
                };
                expected.push(Finding::new(
                    RecordKey::new(StoreKind::Relationship, id),
                    inconsistency,
                ));
            }
        }
    }
    expected.sort();
    expected
}

fn chain_findings(findings: &[Finding]) -> Vec<Finding> {
    findings
        .iter()
        .filter(|finding| {
            matches!(
                finding.inconsistency,
                Inconsistency::ChainReferenceNotInUse { .. }
                    | Inconsistency::ChainReferencesOtherNodes { .. }
                    | Inconsistency::ChainDoesNotReferenceBack { .. }
            )
        })
        .cloned()
        .collect()
}

fn assert_equivalent(store: &InMemoryStore) -> Result<(), TestCaseError> {
    let expected = findings(store, &direct());
    prop_assert_eq!(chain_findings(&expected), chain_oracle(store));
    let nodes = store.high_id(StoreKind::Node).max(1) as u64;
    for (workers, window) in [(1, nodes), (2, nodes / 2 + 1), (3, 2), (4, 1)] {
        let options = CheckOptions::default().workers(workers).nodes_per_pass(window);
        prop_assert_eq!(
            &findings(store, &options),
            &expected,
            "workers={} nodes_per_pass={}",
            workers,
            window
        );
    }
    Ok(())
}

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Source), Just(Side::Target)]
}

fn arb_link() -> impl Strategy<Value = Link> {
    prop_oneof![Just(Link::Prev), Just(Link::Next)]
}

fn arb_corruption() -> impl Strategy<Value = Corruption> {
    prop_oneof![
        4 => (any::<usize>(), arb_side(), arb_link(), -3i64..40).prop_map(
            |(rel, side, link, value)| Corruption::Pointer {
                rel,
                side,
                link,
                value
            }
        ),
        1 => any::<usize>().prop_map(|rel| Corruption::Unused { rel }),
        1 => (any::<usize>(), arb_side()).prop_map(|(rel, side)| Corruption::FirstFlag { rel, side }),
        1 => (any::<usize>(), arb_side(), -2i64..20)
            .prop_map(|(rel, side, node)| Corruption::Endpoint { rel, side, node }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn consistent_chains_are_clean_in_every_configuration(
        nodes in 1i64..12,
        edges in prop::collection::vec((0i64..64, 0i64..64), 0..40),
    ) {
        let store = build(nodes, &edges);
        prop_assert!(findings(&store, &direct()).is_empty());
        assert_equivalent(&store)?;
    }

    #[test]
    fn cached_and_direct_report_the_same_findings(
        nodes in 1i64..12,
        edges in prop::collection::vec((0i64..64, 0i64..64), 1..40),
        corruptions in prop::collection::vec(arb_corruption(), 1..6),
    ) {
        let mut store = build(nodes, &edges);
        corrupt(&mut store, &corruptions);
        assert_equivalent(&store)?;
    }
}

#[test]
fn seeded_random_store_agrees_across_modes() {
    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let nodes = 200;
    let edges: Vec<(i64, i64)> = (0..1_500)
        .map(|_| {
            // A few hubs so some chains get long.
            let source = if rng.gen_bool(0.2) {
                rng.gen_range(0..5)
            } else {
                rng.gen_range(0..nodes)
            };
            (source, rng.gen_range(0..nodes))
        })
        .collect();
    let mut store = build(nodes, &edges);

    let mut ids: Vec<i64> = (0..edges.len() as i64).collect();
    ids.shuffle(&mut rng);
    for &id in ids.iter().take(30) {
        let record = store.relationship_mut(id).unwrap();
        match rng.gen_range(0..3) {
            0 => record.in_use = false,
            1 => record.source_next = rng.gen_range(NO_ID..edges.len() as i64),
            _ => record.target_prev = rng.gen_range(0..edges.len() as i64 + 10),
        }
    }

    let expected = findings(&store, &direct().workers(4));
    assert!(!expected.is_empty());
    assert_eq!(chain_findings(&expected), chain_oracle(&store));
    for (workers, window) in [(1, 200), (4, 64), (8, 7)] {
        let options = CheckOptions::default().workers(workers).nodes_per_pass(window);
        assert_eq!(findings(&store, &options), expected);
    }
}

#[test]
fn hand_built_chain_faults_match_the_record_walk() {
    // Node 0 holds 1 -> 0, node 1 holds 2 -> 0, node 2 holds 2 -> 1.
    let mut store = build(3, &[(0, 1), (0, 2), (1, 2)]);
    store.relationship_mut(1).unwrap().source_next = 2;
    store.relationship_mut(2).unwrap().target_next = 7;

    let on = |rel: i64, side: Side, link: Link, inconsistency: fn(ChainField) -> Inconsistency| {
        Finding::new(
            RecordKey::new(StoreKind::Relationship, rel),
            inconsistency(ChainField::new(side, link)),
        )
    };
    let mut wanted = vec![
        on(0, Side::Source, Link::Prev, |field| {
            Inconsistency::ChainDoesNotReferenceBack {
                field,
                relationship: 1,
            }
        }),
        on(1, Side::Source, Link::Next, |field| {
            Inconsistency::ChainReferencesOtherNodes {
                field,
                relationship: 2,
            }
        }),
        on(1, Side::Target, Link::Prev, |field| {
            Inconsistency::ChainDoesNotReferenceBack {
                field,
                relationship: 2,
            }
        }),
        on(2, Side::Target, Link::Next, |field| {
            Inconsistency::ChainReferenceNotInUse {
                field,
                relationship: 7,
            }
        }),
    ];
    wanted.sort();
    assert_eq!(chain_oracle(&store), wanted);
    for options in [direct(), CheckOptions::default().workers(2).nodes_per_pass(1)] {
        assert_eq!(chain_findings(&findings(&store, &options)), wanted);
    }
}

#[test]
fn sides_outside_the_window_are_skipped_not_reported() {
    let store = build(6, &[(0, 5), (1, 4), (2, 3), (0, 3), (5, 5)]);
    let reporter = CollectingReporter::new();
    let options = CheckOptions::default().workers(2).nodes_per_pass(2);
    let summary = check_consistency(&store, &AllOnline, &reporter, &options).unwrap();
    assert!(reporter.is_empty(), "{:?}", reporter.findings());
    assert_eq!(summary.passes, 3);
    assert!(summary.cache.window_skips > 0);

    let reporter = CollectingReporter::new();
    let options = CheckOptions::default().workers(1).nodes_per_pass(6);
    let summary = check_consistency(&store, &AllOnline, &reporter, &options).unwrap();
    assert_eq!(summary.passes, 1);
    assert_eq!(summary.cache.window_skips, 0);
}
